//! Cashaddr encoding and decoding.
//!
//! A cashaddr is `prefix:payload`, where the payload is base32 of a version
//! byte plus a 20-byte hash, followed by a 40-bit BCH checksum computed over
//! the prefix and payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::Network;

/// Base32 alphabet used by cashaddr.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Number of 5-bit checksum characters.
const CHECKSUM_LEN: usize = 8;

/// Hash length of the only supported size class (160 bits).
pub const HASH_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must be a non-empty string")]
    Empty,

    #[error("address mixes upper and lower case")]
    MixedCase,

    #[error("invalid character '{0}' at position {1}")]
    InvalidCharacter(char, usize),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid payload length ({0})")]
    InvalidLength(usize),

    #[error("unknown address type {0}")]
    UnknownType(u8),

    #[error("unsupported hash size code {0}")]
    UnsupportedSize(u8),

    #[error("expected prefix {expected}, got {actual}")]
    WrongPrefix { expected: String, actual: String },
}

/// Address type encoded in the version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    P2pkh,
    P2sh,
}

impl AddressType {
    fn version_byte(self) -> u8 {
        match self {
            AddressType::P2pkh => 0x00,
            AddressType::P2sh => 0x08,
        }
    }
}

/// A decoded cashaddr.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CashAddress {
    pub prefix: String,
    pub address_type: AddressType,
    pub hash: [u8; HASH_LEN],
}

impl CashAddress {
    pub fn new(network: Network, address_type: AddressType, hash: [u8; HASH_LEN]) -> Self {
        Self {
            prefix: network.cashaddr_prefix().to_string(),
            address_type,
            hash,
        }
    }

    /// Encode as `prefix:payload`.
    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(1 + HASH_LEN);
        payload.push(self.address_type.version_byte());
        payload.extend_from_slice(&self.hash);

        let mut data = convert_bits(&payload, 8, 5, true).unwrap_or_default();
        let checksum = create_checksum(&self.prefix, &data);
        data.extend_from_slice(&checksum);

        let mut out = String::with_capacity(self.prefix.len() + 1 + data.len());
        out.push_str(&self.prefix);
        out.push(':');
        out.extend(data.iter().map(|&d| CHARSET[d as usize] as char));
        out
    }

    /// Decode an address. A missing prefix defaults to the mainnet prefix.
    pub fn decode(address: &str) -> Result<Self, AddressError> {
        Self::decode_with_default(address, Network::Mainnet.cashaddr_prefix())
    }

    /// Decode an address, using `default_prefix` when none is present.
    pub fn decode_with_default(address: &str, default_prefix: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        let has_lower = address.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = address.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }
        let address = address.to_ascii_lowercase();

        let (prefix, payload) = match address.split_once(':') {
            Some((prefix, payload)) => (prefix.to_string(), payload),
            None => (default_prefix.to_ascii_lowercase(), address.as_str()),
        };

        let data = payload
            .chars()
            .enumerate()
            .map(|(i, c)| {
                CHARSET
                    .iter()
                    .position(|&x| x as char == c)
                    .map(|p| p as u8)
                    .ok_or(AddressError::InvalidCharacter(c, i))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        if data.len() <= CHECKSUM_LEN {
            return Err(AddressError::InvalidLength(data.len()));
        }
        if !verify_checksum(&prefix, &data) {
            return Err(AddressError::ChecksumMismatch);
        }

        let bytes = convert_bits(&data[..data.len() - CHECKSUM_LEN], 5, 8, false)
            .ok_or(AddressError::InvalidLength(data.len()))?;
        let (&version, hash) = bytes
            .split_first()
            .ok_or(AddressError::InvalidLength(0))?;

        let address_type = match version >> 3 {
            0 => AddressType::P2pkh,
            1 => AddressType::P2sh,
            other => return Err(AddressError::UnknownType(other)),
        };
        if version & 0x07 != 0 {
            return Err(AddressError::UnsupportedSize(version & 0x07));
        }
        let hash: [u8; HASH_LEN] = hash
            .try_into()
            .map_err(|_| AddressError::InvalidLength(hash.len()))?;

        Ok(Self { prefix, address_type, hash })
    }

    /// Decode an address and require it to belong to `network`.
    pub fn decode_for_network(address: &str, network: Network) -> Result<Self, AddressError> {
        let expected = network.cashaddr_prefix();
        let decoded = Self::decode_with_default(address, expected)?;
        if decoded.prefix != expected {
            return Err(AddressError::WrongPrefix {
                expected: expected.to_string(),
                actual: decoded.prefix,
            });
        }
        Ok(decoded)
    }

    /// Hex of the 20-byte hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Raw output script paying to this address.
    pub fn output_script(&self) -> Vec<u8> {
        match self.address_type {
            AddressType::P2pkh => {
                let mut s = Vec::with_capacity(25);
                s.extend_from_slice(&[0x76, 0xa9, 0x14]); // OP_DUP OP_HASH160 <20>
                s.extend_from_slice(&self.hash);
                s.extend_from_slice(&[0x88, 0xac]); // OP_EQUALVERIFY OP_CHECKSIG
                s
            }
            AddressType::P2sh => {
                let mut s = Vec::with_capacity(23);
                s.extend_from_slice(&[0xa9, 0x14]); // OP_HASH160 <20>
                s.extend_from_slice(&self.hash);
                s.push(0x87); // OP_EQUAL
                s
            }
        }
    }
}

impl fmt::Display for CashAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CashAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Whether `address` is a valid cashaddr for `network`.
pub fn is_valid_address(address: &str, network: Network) -> bool {
    CashAddress::decode_for_network(address, network).is_ok()
}

// ─── Internal helpers ────────────────────────────────────────────────────────

fn polymod(values: &[u8]) -> u64 {
    const GENERATORS: [u64; 5] = [
        0x98_f2bc_8e61,
        0x79_b76d_99e2,
        0xf3_3e5f_b3c4,
        0xae_2eab_e2a8,
        0x1e_4f43_e470,
    ];
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, g) in GENERATORS.iter().enumerate() {
            if (c0 >> i) & 1 != 0 {
                c ^= g;
            }
        }
    }
    c ^ 1
}

fn expand_prefix(prefix: &str) -> Vec<u8> {
    prefix.bytes().map(|b| b & 0x1f).chain(std::iter::once(0)).collect()
}

fn create_checksum(prefix: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = expand_prefix(prefix);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let pm = polymod(&values);
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, v) in out.iter_mut().enumerate() {
        *v = ((pm >> (5 * (7 - i))) & 0x1f) as u8;
    }
    out
}

fn verify_checksum(prefix: &str, data: &[u8]) -> bool {
    let mut values = expand_prefix(prefix);
    values.extend_from_slice(data);
    polymod(&values) == 0
}

/// Regroup a bit stream from `from`-bit to `to`-bit words.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_v: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        let v = value as u32;
        if v >> from != 0 {
            return None;
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_v) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_v) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_v) != 0 {
        return None;
    }
    Some(out)
}
