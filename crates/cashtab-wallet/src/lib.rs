//! Cashtab wallet core.
//!
//! Holds the wallet model and its UTXO snapshot, selects inputs for each
//! kind of transaction, and runs the build → sign → broadcast pipeline.
//! Token metadata and marketplace offers come from caller-supplied sources
//! ([`TokenInfoSource`], [`OfferSource`]) and are looked up concurrently.
//!
//! # Example
//!
//! ```ignore
//! use cashtab_rpc::NodeRpc;
//! use cashtab_wallet::{send_transaction, Recipient, TokenCache, TransactionIntent, Wallet, WalletConfig};
//!
//! let mut wallet = Wallet::load("wallet.json")?;
//! let node = NodeRpc::new("http://localhost:8332")?;
//! let intent = TransactionIntent::SendXec {
//!     recipients: vec![Recipient::new("ecash:qq...", 10_000)],
//!     op_return: None,
//! };
//! let sent = send_transaction(&mut wallet, &WalletConfig::default(), &TokenCache::new(), &intent, &node).await?;
//! println!("{}", sent.txid);
//! ```

pub mod error;
pub mod utxo;
pub mod cache;
pub mod offer;
pub mod wallet;
pub mod config;
pub mod send;

pub use cache::{TokenCache, TokenInfo, TokenInfoSource};
pub use config::WalletConfig;
pub use error::WalletError;
pub use offer::{
    list_collection_offers, load_collection_offers, AcceptFeeParams, AgoraOffer, CancelFeeParams,
    OfferListings, OfferSource, OfferVariant,
};
pub use send::{build_transaction, send_transaction, BuiltTransaction, Recipient, TransactionIntent, TxResult};
pub use utxo::{accumulate, SelectionResult, TokenEntry, Utxo};
pub use wallet::{wallets_for_new_active_wallet, PathInfo, ParsedTx, Wallet, WalletState};
