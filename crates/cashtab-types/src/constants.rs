//! eCash network constants, wallet defaults, and protocol limits.

use serde::{Deserialize, Serialize};

// =============================================================================
// Network Types
// =============================================================================

/// Network type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Human-readable cashaddr prefix for this network.
    pub fn cashaddr_prefix(&self) -> &'static str {
        match self {
            Network::Mainnet => "ecash",
            Network::Testnet => "ectest",
            Network::Regtest => "ecregtest",
        }
    }
}

// =============================================================================
// Units
// =============================================================================

/// Satoshis in one XEC.
pub const SATOSHIS_PER_XEC: u64 = 100;

/// Decimal places of the XEC display unit.
pub const XEC_DECIMALS: usize = 2;

/// Nanosatoshis in one XEC (1e11). Used for sub-satoshi price quotes.
pub const NANOSATS_PER_XEC: u64 = 100_000_000_000;

/// Decimal places of the nanosatoshi price unit relative to XEC.
pub const NANOSAT_DECIMALS: usize = 11;

/// Largest number of decimals accepted by the token amount conversions.
pub const MAX_TOKEN_DECIMALS: u32 = 18;

/// Largest number of decimals an SLP token may declare in its genesis.
pub const MAX_SLP_DECIMALS: u32 = 9;

// =============================================================================
// Transaction Limits
// =============================================================================

/// Total XEC that can ever exist, in satoshis (21 trillion XEC).
pub const MAX_MONEY_SATS: u64 = 21_000_000_000_000 * SATOSHIS_PER_XEC;

/// Smallest output value the network relays.
pub const DUST_SATS: u64 = 546;

/// Value carried by every token-bearing output built by the wallet.
pub const TOKEN_DUST_SATS: u64 = 546;

/// Maximum total size in bytes of an OP_RETURN output script.
pub const MAX_OP_RETURN_BYTES: usize = 223;

/// Default fee rate, in satoshis per 1000 bytes (2.01 sat/byte).
pub const DEFAULT_FEE_SATS_PER_KB: u64 = 2010;

/// Reduced fee rate for wallets holding the VIP token (1 sat/byte).
pub const MIN_FEE_SATS_PER_KB: u64 = 1000;

// =============================================================================
// Wallet Defaults
// =============================================================================

/// Derivation path (abbreviated, `m/44'/1899'/0'/0/0`) used by all new wallets.
pub const DEFAULT_DERIVATION_PATH: u32 = 1899;

/// Paths of wallets created by older releases.
pub const LEGACY_DERIVATION_PATHS: [u32; 2] = [145, 245];

/// Token whose holders are entitled to the minimum fee tier.
pub const VIP_TOKEN_ID: &str = "aed861a31b96934b88c0252ede135cb9700d7649f69191235087a3030e553cb1";

/// Decimalized balance of [`VIP_TOKEN_ID`] required for the minimum fee tier.
pub const VIP_TOKEN_QTY: &str = "1000";

// =============================================================================
// OP_RETURN Protocol Prefixes
// =============================================================================

/// Lokad prefixes pushed as the first item of an OP_RETURN.
pub mod lokad {
    /// Cashtab plaintext message.
    pub const CASHTAB_MSG: [u8; 4] = [0x00, 0x74, 0x61, 0x62];
    /// Cashtab encrypted message.
    pub const CASHTAB_ENCRYPTED: [u8; 4] = [0x65, 0x74, 0x61, 0x62];
    /// Airdrop marker, followed by the airdropped token id.
    pub const AIRDROP: [u8; 4] = [0x64, 0x72, 0x6f, 0x70];
    /// Simple Ledger Protocol.
    pub const SLP: [u8; 4] = [0x53, 0x4c, 0x50, 0x00];
}
