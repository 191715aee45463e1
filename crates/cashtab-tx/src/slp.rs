//! SLP v1 token scripts.
//!
//! Every SLP message is an OP_RETURN at output 0. Amounts are 8-byte
//! big-endian, token ids are pushed in display byte order, and empty fields
//! are encoded as `OP_PUSHDATA1 0x00`.

use cashtab_types::constants::{lokad, MAX_OP_RETURN_BYTES, MAX_SLP_DECIMALS};

use crate::script::{decode_token_id, opcodes::*, Script};
use crate::TxError;

/// Maximum number of token outputs a SEND may assign.
pub const MAX_SEND_OUTPUTS: usize = 19;

/// Output index of the mint baton in GENESIS transactions built by the wallet.
pub const GENESIS_BATON_VOUT: u8 = 2;

/// SLP token type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlpTokenType {
    #[default]
    Fungible,
    NftCollection,
    NftChild,
}

impl SlpTokenType {
    pub fn byte(&self) -> u8 {
        match self {
            SlpTokenType::Fungible => 0x01,
            SlpTokenType::NftCollection => 0x81,
            SlpTokenType::NftChild => 0x41,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(SlpTokenType::Fungible),
            0x81 => Some(SlpTokenType::NftCollection),
            0x41 => Some(SlpTokenType::NftChild),
            _ => None,
        }
    }
}

/// Metadata declared in a GENESIS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesisInfo {
    pub ticker: String,
    pub name: String,
    pub url: String,
    pub hash: Option<[u8; 32]>,
    pub decimals: u32,
}

struct SlpScript(Vec<u8>);

impl SlpScript {
    fn new(token_type: SlpTokenType, kind: &[u8]) -> Self {
        let mut s = SlpScript(vec![OP_RETURN]);
        s.push(&lokad::SLP);
        s.push(&[token_type.byte()]);
        s.push(kind);
        s
    }

    fn push(&mut self, data: &[u8]) {
        match data.len() {
            0 => self.0.extend_from_slice(&[OP_PUSHDATA1, 0x00]),
            n @ 1..=0x4b => self.0.push(n as u8),
            n @ 0x4c..=0xff => self.0.extend_from_slice(&[OP_PUSHDATA1, n as u8]),
            n => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
    }

    fn push_amount(&mut self, atoms: u64) {
        self.push(&atoms.to_be_bytes());
    }

    fn finish(self) -> Result<Script, TxError> {
        if self.0.len() > MAX_OP_RETURN_BYTES {
            return Err(TxError::OpReturnTooLarge {
                size: self.0.len(),
                max: MAX_OP_RETURN_BYTES,
            });
        }
        Ok(Script::new(self.0))
    }
}

/// GENESIS script minting `initial_atoms` to output 1.
pub fn genesis_script(
    token_type: SlpTokenType,
    info: &GenesisInfo,
    mint_baton_vout: Option<u8>,
    initial_atoms: u64,
) -> Result<Script, TxError> {
    if info.decimals > MAX_SLP_DECIMALS {
        return Err(TxError::InvalidInput(format!(
            "token decimals {} exceed the maximum of {}",
            info.decimals, MAX_SLP_DECIMALS
        )));
    }
    if let Some(vout) = mint_baton_vout {
        if vout < 2 {
            return Err(TxError::InvalidInput(format!("mint baton vout {} must be >= 2", vout)));
        }
    }
    let mut s = SlpScript::new(token_type, b"GENESIS");
    s.push(info.ticker.as_bytes());
    s.push(info.name.as_bytes());
    s.push(info.url.as_bytes());
    s.push(info.hash.as_ref().map(|h| &h[..]).unwrap_or(&[]));
    s.push(&[info.decimals as u8]);
    match mint_baton_vout {
        Some(vout) => s.push(&[vout]),
        None => s.push(&[]),
    }
    s.push_amount(initial_atoms);
    s.finish()
}

/// SEND script assigning `amounts[i]` to output `i + 1`.
pub fn send_script(
    token_type: SlpTokenType,
    token_id: &str,
    amounts: &[u64],
) -> Result<Script, TxError> {
    if amounts.is_empty() || amounts.len() > MAX_SEND_OUTPUTS {
        return Err(TxError::InvalidInput(format!(
            "SEND must assign between 1 and {} outputs, got {}",
            MAX_SEND_OUTPUTS,
            amounts.len()
        )));
    }
    let id = decode_token_id(token_id)?;
    let mut s = SlpScript::new(token_type, b"SEND");
    s.push(&id);
    for &atoms in amounts {
        s.push_amount(atoms);
    }
    s.finish()
}

/// BURN script destroying `atoms` of `token_id`.
pub fn burn_script(token_type: SlpTokenType, token_id: &str, atoms: u64) -> Result<Script, TxError> {
    let id = decode_token_id(token_id)?;
    let mut s = SlpScript::new(token_type, b"BURN");
    s.push(&id);
    s.push_amount(atoms);
    s.finish()
}
