//! eCash node RPC client library.
//!
//! Provides an async JSON-RPC client for an eCash node, typed wrappers for the
//! endpoints a wallet uses, and the [`Broadcaster`] abstraction with its
//! rejection taxonomy.
//!
//! # Example
//!
//! ```ignore
//! use cashtab_rpc::{Broadcaster, NodeRpc};
//!
//! #[tokio::main]
//! async fn main() {
//!     let node = NodeRpc::new("http://localhost:8332").unwrap();
//!     let txid = node.broadcast(&raw_hex).await.unwrap();
//!     println!("Sent: {}", txid);
//! }
//! ```

pub mod error;
pub mod client;
pub mod node;
pub mod broadcast;

pub use broadcast::{BroadcastError, Broadcaster};
pub use client::{RpcClient, RpcConfig};
pub use error::RpcError;
pub use node::NodeRpc;

/// Default node RPC ports.
pub mod ports {
    pub const MAINNET: u16 = 8332;
    pub const TESTNET: u16 = 18332;
    pub const REGTEST: u16 = 18443;
}
