//! Transaction signing.
//!
//! Inputs are signed with the BIP143 digest used by eCash (`SIGHASH_ALL |
//! SIGHASH_FORKID`). [`KeySigner`] signs the wallet's own P2PKH inputs and
//! hands any input with a registered [`Signatory`] (for example a marketplace
//! offer input) to that signatory instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use crate::script::{push_data, Script};
use crate::types::{sha256d, write_compact_size, OutPoint, SignData, SpendInput, Transaction};
use crate::TxError;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_FORKID: u32 = 0x40;

/// Signs one input, producing its scriptSig.
pub trait Signatory: Send + Sync {
    fn sign_input(&self, tx: &Transaction, index: usize, sign_data: &SignData) -> Result<Script, TxError>;
}

/// Signs a whole transaction, returning it with every scriptSig filled in.
pub trait Signer: Send + Sync {
    fn sign_tx(&self, tx: &Transaction, inputs: &[SpendInput]) -> Result<Transaction, TxError>;
}

/// BIP143 signature digest with the fork id flag.
pub fn sighash(
    tx: &Transaction,
    index: usize,
    script_code: &Script,
    value: u64,
    sighash_type: u32,
) -> Result<[u8; 32], TxError> {
    let input = tx.inputs.get(index).ok_or_else(|| {
        TxError::Signing(format!("input {} out of range ({} inputs)", index, tx.inputs.len()))
    })?;

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for i in &tx.inputs {
        prevouts.extend_from_slice(&i.prev_out.txid.0);
        prevouts.extend_from_slice(&i.prev_out.vout.to_le_bytes());
        sequences.extend_from_slice(&i.sequence.to_le_bytes());
    }
    let mut outputs = Vec::new();
    for o in &tx.outputs {
        o.write(&mut outputs);
    }

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&sha256d(&prevouts));
    preimage.extend_from_slice(&sha256d(&sequences));
    preimage.extend_from_slice(&input.prev_out.txid.0);
    preimage.extend_from_slice(&input.prev_out.vout.to_le_bytes());
    write_compact_size(&mut preimage, script_code.len());
    preimage.extend_from_slice(script_code.as_bytes());
    preimage.extend_from_slice(&value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&sha256d(&outputs));
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&sighash_type.to_le_bytes());
    Ok(sha256d(&preimage))
}

/// A P2PKH key pair.
///
/// The pubkey hash comes from the wallet's derivation path record, which is
/// what the wallet's output scripts pay to.
#[derive(Clone)]
pub struct P2pkhKey {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
    hash: [u8; 20],
}

impl P2pkhKey {
    pub fn new(secret: &[u8; 32], hash: [u8; 20]) -> Result<Self, TxError> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(secret)
            .map_err(|e| TxError::Signing(format!("invalid secret key: {}", e)))?;
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secp, secret, public, hash })
    }

    pub fn hash(&self) -> [u8; 20] {
        self.hash
    }

    /// Compressed public key.
    pub fn public_key(&self) -> [u8; 33] {
        self.public.serialize()
    }

    pub fn output_script(&self) -> Script {
        Script::p2pkh(&self.hash)
    }
}

impl fmt::Debug for P2pkhKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P2pkhKey")
            .field("public", &hex::encode(self.public_key()))
            .field("hash", &hex::encode(self.hash))
            .finish_non_exhaustive()
    }
}

impl Signatory for P2pkhKey {
    fn sign_input(&self, tx: &Transaction, index: usize, sign_data: &SignData) -> Result<Script, TxError> {
        let sighash_type = SIGHASH_ALL | SIGHASH_FORKID;
        let digest = sighash(tx, index, &sign_data.output_script, sign_data.value, sighash_type)?;
        let sig = self.secp.sign_ecdsa(&Message::from_digest(digest), &self.secret);

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(sighash_type as u8);

        let mut script = Vec::with_capacity(107);
        push_data(&mut script, &sig_bytes);
        push_data(&mut script, &self.public_key());
        Ok(Script::new(script))
    }
}

/// Signs P2PKH inputs by pubkey hash, with per-outpoint overrides.
#[derive(Default)]
pub struct KeySigner {
    keys: HashMap<[u8; 20], P2pkhKey>,
    overrides: HashMap<OutPoint, Arc<dyn Signatory>>,
}

impl KeySigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, key: P2pkhKey) {
        self.keys.insert(key.hash, key);
    }

    /// Sign the input spending `outpoint` with `signatory` instead of a wallet key.
    pub fn add_signatory(&mut self, outpoint: OutPoint, signatory: Arc<dyn Signatory>) {
        self.overrides.insert(outpoint, signatory);
    }

    pub fn has_key(&self, hash: &[u8; 20]) -> bool {
        self.keys.contains_key(hash)
    }
}

impl Signer for KeySigner {
    fn sign_tx(&self, tx: &Transaction, inputs: &[SpendInput]) -> Result<Transaction, TxError> {
        if inputs.len() != tx.inputs.len() {
            return Err(TxError::Signing(format!(
                "{} spend records for {} inputs",
                inputs.len(),
                tx.inputs.len()
            )));
        }
        let mut signed = tx.clone();
        for (index, input) in inputs.iter().enumerate() {
            if tx.inputs[index].prev_out != input.prev_out {
                return Err(TxError::Signing(format!("input {} does not match its spend record", index)));
            }
            let script_sig = match self.overrides.get(&input.prev_out) {
                Some(signatory) => signatory.sign_input(tx, index, &input.sign_data)?,
                None => {
                    let key = input
                        .sign_data
                        .output_script
                        .p2pkh_hash()
                        .and_then(|hash| self.keys.get(&hash))
                        .ok_or_else(|| {
                            TxError::Signing(format!("no key for input {} ({})", index, input.prev_out))
                        })?;
                    key.sign_input(tx, index, &input.sign_data)?
                }
            };
            signed.inputs[index].script_sig = script_sig;
        }
        Ok(signed)
    }
}
