//! Typed transaction structures.
//!
//! Provides the eCash transaction layout (version, inputs, outputs, locktime)
//! with consensus serialization, txid computation, and the spend metadata the
//! builder and signer carry alongside each input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::fee::InputType;
use crate::script::Script;
use crate::TxError;

// ─── Transaction Constants ──────────────────────────────────────────────────

/// Transaction version used for all wallet transactions.
pub const TX_VERSION: i32 = 2;

/// Sequence number for final inputs.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

// ─── Hashing ────────────────────────────────────────────────────────────────

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

// ─── Compact size ───────────────────────────────────────────────────────────

/// Encoded length of a compact-size integer.
pub fn compact_size_len(n: usize) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn write_compact_size(buf: &mut Vec<u8>, n: usize) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&(n as u64).to_le_bytes());
        }
    }
}

// ─── Txid ───────────────────────────────────────────────────────────────────

/// Transaction id, stored in internal (serialization) byte order.
///
/// The hex form is byte-reversed, matching explorers and indexers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        let bytes = hex::decode(s).map_err(|e| TxError::Parse(format!("txid {}: {}", s, e)))?;
        let mut arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TxError::Parse(format!("txid {} is not 32 bytes", s)))?;
        arr.reverse();
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        let mut display = self.0;
        display.reverse();
        hex::encode(display)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({})", self.to_hex())
    }
}

impl FromStr for Txid {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Txid::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Core Transaction Types ─────────────────────────────────────────────────

/// Reference to a previous transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Txid,
    #[serde(rename = "outIdx")]
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.txid.0);
        buf.extend_from_slice(&self.vout.to_le_bytes());
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub prev_out: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script: Script,
}

impl TxOutput {
    pub fn new(value: u64, script: Script) -> Self {
        Self { value, script }
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        8 + compact_size_len(self.script.len()) + self.script.len()
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_compact_size(buf, self.script.len());
        buf.extend_from_slice(self.script.as_bytes());
    }
}

/// What a signer needs to know about the output an input spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignData {
    pub value: u64,
    pub output_script: Script,
}

/// An input as carried through building and signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendInput {
    pub prev_out: OutPoint,
    pub sign_data: SignData,
    pub input_type: InputType,
    pub sequence: u32,
}

impl SpendInput {
    /// A final P2PKH input.
    pub fn p2pkh(prev_out: OutPoint, value: u64, output_script: Script) -> Self {
        Self {
            prev_out,
            sign_data: SignData { value, output_script },
            input_type: InputType::P2pkh,
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn value(&self) -> u64 {
        self.sign_data.value
    }
}

/// Complete transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Consensus serialization.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size_hint());
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut buf, self.inputs.len());
        for input in &self.inputs {
            input.prev_out.write(&mut buf);
            write_compact_size(&mut buf, input.script_sig.len());
            buf.extend_from_slice(input.script_sig.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len());
        for output in &self.outputs {
            output.write(&mut buf);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse a consensus-serialized transaction.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let mut r = Reader { bytes, pos: 0 };
        let version = i32::from_le_bytes(r.array::<4>()?);
        let n_in = r.compact_size()?;
        let mut inputs = Vec::with_capacity(n_in.min(1024));
        for _ in 0..n_in {
            let txid = Txid(r.array::<32>()?);
            let vout = u32::from_le_bytes(r.array::<4>()?);
            let len = r.compact_size()?;
            let script_sig = Script::new(r.take(len)?.to_vec());
            let sequence = u32::from_le_bytes(r.array::<4>()?);
            inputs.push(TxInput { prev_out: OutPoint { txid, vout }, script_sig, sequence });
        }
        let n_out = r.compact_size()?;
        let mut outputs = Vec::with_capacity(n_out.min(1024));
        for _ in 0..n_out {
            let value = u64::from_le_bytes(r.array::<8>()?);
            let len = r.compact_size()?;
            outputs.push(TxOutput { value, script: Script::new(r.take(len)?.to_vec()) });
        }
        let lock_time = u32::from_le_bytes(r.array::<4>()?);
        if r.pos != bytes.len() {
            return Err(TxError::Parse(format!(
                "{} trailing bytes after transaction",
                bytes.len() - r.pos
            )));
        }
        Ok(Self { version, inputs, outputs, lock_time })
    }

    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TxError::Parse(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.to_bytes()))
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Sum of output values, saturating at `u64::MAX`.
    pub fn output_total(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value))
    }

    fn size_hint(&self) -> usize {
        10 + self.inputs.len() * 148 + self.outputs.iter().map(TxOutput::size).sum::<usize>()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TxError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| TxError::Parse(format!("unexpected end of data at byte {}", self.pos)))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    fn compact_size(&mut self) -> Result<usize, TxError> {
        let n = match self.array::<1>()?[0] {
            0xfd => u16::from_le_bytes(self.array::<2>()?) as u64,
            0xfe => u32::from_le_bytes(self.array::<4>()?) as u64,
            0xff => u64::from_le_bytes(self.array::<8>()?),
            b => b as u64,
        };
        usize::try_from(n).map_err(|_| TxError::Parse(format!("compact size {} too large", n)))
    }
}
