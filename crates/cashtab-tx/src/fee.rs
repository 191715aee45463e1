//! Fee estimation and transaction size calculation.
//!
//! Estimates the serialized size of a transaction from its input kinds and
//! output scripts, and converts sizes to fees with a per-kilobyte rate.

use std::collections::HashMap;

use cashtab_types::constants::{DEFAULT_FEE_SATS_PER_KB, MIN_FEE_SATS_PER_KB};
use cashtab_types::has_enough_token;
use serde::{Deserialize, Serialize};

use crate::types::{compact_size_len, TxOutput};

/// Version (4) + locktime (4) + one-byte input and output counts.
pub const TX_OVERHEAD_BYTES: usize = 10;

/// Outpoint (36) + script length (1) + signature and pubkey pushes (107) + sequence (4).
pub const P2PKH_INPUT_BYTES: usize = 148;

/// Value (8) + script length (1) + 25-byte script.
pub const P2PKH_OUTPUT_BYTES: usize = 34;

/// How an input will be unlocked, which determines its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputType {
    #[default]
    P2pkh,
    /// An input whose scriptSig length is known up front, such as a marketplace offer.
    Custom { script_sig_len: usize },
}

impl InputType {
    pub fn size(&self) -> usize {
        match *self {
            InputType::P2pkh => P2PKH_INPUT_BYTES,
            InputType::Custom { script_sig_len } => {
                36 + compact_size_len(script_sig_len) + script_sig_len + 4
            }
        }
    }
}

/// Fee rate in satoshis per 1000 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate {
    pub sats_per_kb: u64,
}

impl Default for FeeRate {
    fn default() -> Self {
        Self { sats_per_kb: DEFAULT_FEE_SATS_PER_KB }
    }
}

impl FeeRate {
    pub const fn new(sats_per_kb: u64) -> Self {
        Self { sats_per_kb }
    }

    /// The reduced tier.
    pub const fn minimum() -> Self {
        Self { sats_per_kb: MIN_FEE_SATS_PER_KB }
    }

    /// Tier for a wallet with the given decimalized token balances: the
    /// minimum rate when it holds at least `vip_qty` of `vip_token_id`.
    pub fn for_wallet(token_balances: &HashMap<String, String>, vip_token_id: &str, vip_qty: &str) -> Self {
        if has_enough_token(token_balances, vip_token_id, vip_qty) {
            Self::minimum()
        } else {
            Self::default()
        }
    }

    /// Fee for `size` bytes, rounded up. Saturates at `u64::MAX`, which no
    /// wallet can fund.
    pub fn fee(&self, size: usize) -> u64 {
        let fee = (size as u128 * u128::from(self.sats_per_kb)).div_ceil(1000);
        u64::try_from(fee).unwrap_or(u64::MAX)
    }
}

/// Estimate the serialized size of a transaction.
pub fn estimate_tx_size(inputs: &[InputType], outputs: &[TxOutput]) -> usize {
    let mut size = TX_OVERHEAD_BYTES - 2;
    size += compact_size_len(inputs.len()) + compact_size_len(outputs.len());
    size += inputs.iter().map(InputType::size).sum::<usize>();
    size += outputs.iter().map(TxOutput::size).sum::<usize>();
    size
}

/// Estimate the fee for a transaction.
pub fn estimate_fee(inputs: &[InputType], outputs: &[TxOutput], rate: FeeRate) -> u64 {
    rate.fee(estimate_tx_size(inputs, outputs))
}

/// Quick estimate for an all-P2PKH transaction.
pub fn estimate_p2pkh_fee(num_inputs: usize, num_outputs: usize, rate: FeeRate) -> u64 {
    let size = TX_OVERHEAD_BYTES - 2
        + compact_size_len(num_inputs)
        + compact_size_len(num_outputs)
        + num_inputs * P2PKH_INPUT_BYTES
        + num_outputs * P2PKH_OUTPUT_BYTES;
    rate.fee(size)
}
