//! Output scripts: P2PKH, P2SH, and OP_RETURN data carriers.

use std::fmt;

use cashtab_types::constants::{lokad, MAX_OP_RETURN_BYTES};
use cashtab_types::{AddressType, CashAddress};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TxError;

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
}

use opcodes::*;

/// Raw script bytes.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| TxError::Parse(format!("script hex: {}", e)))
    }

    pub fn p2pkh(hash: &[u8; 20]) -> Self {
        let mut s = Vec::with_capacity(25);
        s.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
        s.extend_from_slice(hash);
        s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(s)
    }

    pub fn p2sh(hash: &[u8; 20]) -> Self {
        let mut s = Vec::with_capacity(23);
        s.extend_from_slice(&[OP_HASH160, 20]);
        s.extend_from_slice(hash);
        s.push(OP_EQUAL);
        Self(s)
    }

    /// Output script paying to a cashaddr.
    pub fn from_address(address: &str) -> Result<Self, TxError> {
        let addr = CashAddress::decode(address)?;
        Ok(match addr.address_type {
            AddressType::P2pkh => Self::p2pkh(&addr.hash),
            AddressType::P2sh => Self::p2sh(&addr.hash),
        })
    }

    /// OP_RETURN followed by each item as a minimal data push.
    pub fn op_return<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut s = vec![OP_RETURN];
        for item in items {
            push_data(&mut s, item.as_ref());
        }
        Self(s)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn is_op_return(&self) -> bool {
        self.0.first() == Some(&OP_RETURN)
    }

    /// The pubkey hash of a P2PKH script.
    pub fn p2pkh_hash(&self) -> Option<[u8; 20]> {
        match self.0.as_slice() {
            [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                hash.try_into().ok()
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Append a minimal push of `data`. Empty data pushes OP_0.
pub fn push_data(buf: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0 => buf.push(OP_0),
        n @ 1..=0x4b => buf.push(n as u8),
        n @ 0x4c..=0xff => buf.extend_from_slice(&[OP_PUSHDATA1, n as u8]),
        n => {
            buf.push(OP_PUSHDATA2);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
    }
    buf.extend_from_slice(data);
}

// ─── Cashtab OP_RETURN payloads ─────────────────────────────────────────────

/// Data a wallet transaction may carry in its OP_RETURN output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpReturnPayload {
    /// Plaintext Cashtab message.
    Message(String),
    /// Already-encrypted message bytes.
    Encrypted(Vec<u8>),
    /// Airdrop marker naming the token whose holders were paid.
    Airdrop { token_id: String, message: Option<String> },
    /// A complete script supplied by the caller. Must start with OP_RETURN.
    Raw(Script),
}

impl OpReturnPayload {
    pub fn to_script(&self) -> Result<Script, TxError> {
        let script = match self {
            OpReturnPayload::Message(msg) => {
                Script::op_return([&lokad::CASHTAB_MSG[..], msg.as_bytes()])
            }
            OpReturnPayload::Encrypted(data) => {
                Script::op_return([&lokad::CASHTAB_ENCRYPTED[..], data.as_slice()])
            }
            OpReturnPayload::Airdrop { token_id, message } => {
                let id = decode_token_id(token_id)?;
                let mut items: Vec<&[u8]> = vec![&lokad::AIRDROP[..], &id[..]];
                if let Some(msg) = message.as_deref().filter(|m| !m.trim().is_empty()) {
                    items.push(&lokad::CASHTAB_MSG);
                    items.push(msg.as_bytes());
                }
                Script::op_return(items)
            }
            OpReturnPayload::Raw(script) => {
                if !script.is_op_return() {
                    return Err(TxError::InvalidInput(
                        "raw OP_RETURN script must begin with OP_RETURN".into(),
                    ));
                }
                script.clone()
            }
        };
        if script.len() > MAX_OP_RETURN_BYTES {
            return Err(TxError::OpReturnTooLarge {
                size: script.len(),
                max: MAX_OP_RETURN_BYTES,
            });
        }
        Ok(script)
    }
}

/// Decode a 32-byte token id given as hex.
pub fn decode_token_id(token_id: &str) -> Result<[u8; 32], TxError> {
    hex::decode(token_id)
        .ok()
        .and_then(|b| <[u8; 32]>::try_from(b).ok())
        .ok_or_else(|| TxError::InvalidInput(format!("invalid token id: {}", token_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ID: &str = "aed861a31b96934b88c0252ede135cb9700d7649f69191235087a3030e553cb1";

    #[test]
    fn test_p2pkh_script_and_hash() {
        let hash = [0xab; 20];
        let script = Script::p2pkh(&hash);
        assert_eq!(script.len(), 25);
        assert_eq!(script.to_hex(), format!("76a914{}88ac", "ab".repeat(20)));
        assert_eq!(script.p2pkh_hash(), Some(hash));
        assert_eq!(Script::p2sh(&hash).p2pkh_hash(), None);
    }

    #[test]
    fn test_from_address() {
        let script =
            Script::from_address("bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a").unwrap();
        assert_eq!(script.to_hex(), "76a91476a04053bda0a88bda5177b86a15c3b29f55987388ac");
        assert!(Script::from_address("ecash:notanaddress").is_err());
    }

    #[test]
    fn test_push_data_sizes() {
        let mut buf = Vec::new();
        push_data(&mut buf, &[]);
        assert_eq!(buf, vec![OP_0]);

        let mut buf = Vec::new();
        push_data(&mut buf, &[7; 75]);
        assert_eq!(buf[0], 75);

        let mut buf = Vec::new();
        push_data(&mut buf, &[7; 76]);
        assert_eq!(&buf[..2], &[OP_PUSHDATA1, 76]);

        let mut buf = Vec::new();
        push_data(&mut buf, &[7; 300]);
        assert_eq!(&buf[..3], &[OP_PUSHDATA2, 0x2c, 0x01]);
        assert_eq!(buf.len(), 303);
    }

    #[test]
    fn test_message_payload() {
        let script = OpReturnPayload::Message("hello".into()).to_script().unwrap();
        assert_eq!(script.to_hex(), "6a04007461620568656c6c6f");
        assert!(script.is_op_return());
    }

    #[test]
    fn test_airdrop_payload() {
        let bare = OpReturnPayload::Airdrop { token_id: TOKEN_ID.into(), message: None }
            .to_script()
            .unwrap();
        assert_eq!(bare.to_hex(), format!("6a0464726f7020{}", TOKEN_ID));

        let with_msg = OpReturnPayload::Airdrop {
            token_id: TOKEN_ID.into(),
            message: Some("gm".into()),
        }
        .to_script()
        .unwrap();
        assert_eq!(with_msg.to_hex(), format!("6a0464726f7020{}040074616202676d", TOKEN_ID));

        let bad = OpReturnPayload::Airdrop { token_id: "abcd".into(), message: None };
        assert!(matches!(bad.to_script(), Err(TxError::InvalidInput(_))));
    }

    #[test]
    fn test_payload_size_limit() {
        // 1 (OP_RETURN) + 5 (prefix push) + 2 (PUSHDATA1 header) + 215 = 223
        let fits = OpReturnPayload::Message("a".repeat(215)).to_script().unwrap();
        assert_eq!(fits.len(), MAX_OP_RETURN_BYTES);

        let err = OpReturnPayload::Message("a".repeat(216)).to_script().unwrap_err();
        assert!(matches!(err, TxError::OpReturnTooLarge { size: 224, max: 223 }));
    }

    #[test]
    fn test_raw_payload_must_be_op_return() {
        let raw = OpReturnPayload::Raw(Script::new(vec![0x51]));
        assert!(raw.to_script().is_err());
        let raw = OpReturnPayload::Raw(Script::new(vec![OP_RETURN, 0x01, 0x02]));
        assert_eq!(raw.to_script().unwrap().len(), 3);
    }
}
