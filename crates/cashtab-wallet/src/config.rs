//! Wallet configuration.

use std::path::Path;

use cashtab_tx::FeeRate;
use cashtab_types::constants::{DEFAULT_DERIVATION_PATH, DUST_SATS, VIP_TOKEN_ID, VIP_TOKEN_QTY};
use cashtab_types::Network;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::wallet::Wallet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    /// Path whose address receives change and minted tokens.
    pub derivation_path: u32,
    pub dust_sats: u64,
    /// Fixed fee rate. When unset the rate follows the VIP token tier.
    pub fee_rate: Option<FeeRate>,
    pub vip_token_id: String,
    /// Decimalized VIP balance needed for the reduced fee tier.
    pub vip_token_qty: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            derivation_path: DEFAULT_DERIVATION_PATH,
            dust_sats: DUST_SATS,
            fee_rate: None,
            vip_token_id: VIP_TOKEN_ID.to_string(),
            vip_token_qty: VIP_TOKEN_QTY.to_string(),
        }
    }
}

impl WalletConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| WalletError::InvalidFile(e.to_string()))
    }

    /// Fee rate for transactions from `wallet`.
    pub fn fee_rate_for(&self, wallet: &Wallet) -> FeeRate {
        if let Some(rate) = self.fee_rate {
            return rate;
        }
        let rate = FeeRate::for_wallet(&wallet.state.tokens, &self.vip_token_id, &self.vip_token_qty);
        if rate == FeeRate::minimum() {
            log::debug!("wallet holds the VIP token, using the minimum fee rate");
        }
        rate
    }
}
