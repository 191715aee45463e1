//! eCash transaction construction, parsing, and signing.
//!
//! Provides typed transaction structures with consensus serialization, script
//! builders for P2PKH/P2SH/OP_RETURN and SLP token messages, a byte-size fee
//! estimator, a draft builder that places change only above the dust limit,
//! and BIP143 (forkid) P2PKH signing.

pub mod types;
pub mod script;
pub mod slp;
pub mod fee;
pub mod builder;
pub mod sign;

pub use types::{OutPoint, SignData, SpendInput, Transaction, TxInput, TxOutput, Txid};
pub use script::{OpReturnPayload, Script};
pub use slp::{GenesisInfo, SlpTokenType};
pub use builder::{SignedTransaction, TransactionBuilder, UnsignedTransaction};
pub use fee::{estimate_fee, estimate_tx_size, FeeRate, InputType};
pub use sign::{KeySigner, P2pkhKey, Signatory, Signer};

use cashtab_types::AmountError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: u64, have: u64 },

    #[error("no outputs specified")]
    NoDestinations,

    #[error("output {index} value {value} is below the dust limit of {dust}")]
    DustOutput { index: usize, value: u64, dust: u64 },

    #[error("OP_RETURN of {size} bytes exceeds the {max}-byte limit")]
    OpReturnTooLarge { size: usize, max: usize },

    #[error("fee {fee} is below the {required} required for {size} bytes")]
    FeeTooLow { fee: u64, required: u64, size: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("address error: {0}")]
    Address(#[from] cashtab_types::AddressError),
}
