//! Core types and constants for the Cashtab eCash wallet.
//!
//! This crate provides the foundational pieces used across all Cashtab crates:
//! network constants, lossless XEC/satoshi/nanosatoshi conversion, decimal
//! token amount handling, and cashaddr encoding/decoding.

pub mod cashaddr;
pub mod constants;
pub mod token_amount;
pub mod units;

pub use cashaddr::{AddressError, AddressType, CashAddress};
pub use constants::Network;
pub use token_amount::{
    decimalize_token_amount, has_enough_token, parse_token_atoms, sci_to_decimal,
    undecimalize_token_amount,
};
pub use units::{to_satoshis, to_xec, AmountError};
