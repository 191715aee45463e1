//! Wallet error types.

use cashtab_rpc::{BroadcastError, RpcError};
use cashtab_tx::TxError;
use cashtab_types::{AddressError, AmountError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("insufficient funds: need {need} sats, have {have}")]
    InsufficientFunds { need: u64, have: u64 },

    #[error("insufficient {token_id} balance: need {need} atoms, have {have}")]
    InsufficientTokenFunds { token_id: String, need: u64, have: u64 },

    #[error("wallet has no spendable XEC utxos")]
    NoXecUtxos,

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("token {0} is not in the token cache")]
    UnknownToken(String),

    #[error("derivation path {0} is not in this wallet")]
    UnknownPath(u32),

    #[error("derivation path {0} already exists")]
    DuplicatePath(u32),

    #[error("offer for {0} was not listed by this wallet")]
    NotOfferSeller(String),

    #[error("wallet \"{0}\" is not in the wallet list")]
    WalletNotFound(String),

    #[error("invalid wallet file: {0}")]
    InvalidFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("transaction error: {0}")]
    Tx(TxError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("{0}")]
    Broadcast(#[from] BroadcastError),
}

impl From<TxError> for WalletError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::InsufficientFunds { need, have } => WalletError::InsufficientFunds { need, have },
            TxError::Amount(e) => WalletError::Amount(e),
            TxError::Address(e) => WalletError::Address(e),
            e => WalletError::Tx(e),
        }
    }
}

impl WalletError {
    /// Numeric code shown to users for failed sends.
    pub fn code(&self) -> Option<u32> {
        match self {
            WalletError::InsufficientFunds { .. } => Some(0),
            WalletError::Broadcast(e) => e.code(),
            _ => None,
        }
    }
}
