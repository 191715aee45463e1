//! Transaction broadcast and rejection mapping.
//!
//! A rejected broadcast is classified from the node's message into the
//! failures a wallet user can act on. Broadcasts are never retried.

use async_trait::async_trait;
use cashtab_tx::Txid;
use thiserror::Error;

use crate::error::RpcError;
use crate::node::NodeRpc;

/// Why a broadcast failed. Each variant keeps the node's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("insufficient priority, fee too low: {0}")]
    InsufficientPriority(String),

    #[error("double spend, an input is already spent by a mempool transaction: {0}")]
    DoubleSpend(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("too many unconfirmed ancestors: {0}")]
    TooManyUnconfirmedAncestors(String),

    #[error("broadcast failed: {0}")]
    Unmapped(String),
}

impl BroadcastError {
    /// Classify a rejection message.
    pub fn from_message(message: &str) -> Self {
        let msg = message.to_string();
        if message.contains("insufficient priority") {
            BroadcastError::InsufficientPriority(msg)
        } else if message.contains("txn-mempool-conflict") {
            BroadcastError::DoubleSpend(msg)
        } else if message.contains("too-long-mempool-chain") {
            BroadcastError::TooManyUnconfirmedAncestors(msg)
        } else if message.contains("Network Error") {
            BroadcastError::NetworkError(msg)
        } else {
            BroadcastError::Unmapped(msg)
        }
    }

    /// Numeric code shown to users. Unmapped failures have none.
    pub fn code(&self) -> Option<u32> {
        match self {
            BroadcastError::NetworkError(_) => Some(1),
            BroadcastError::DoubleSpend(_) => Some(18),
            BroadcastError::TooManyUnconfirmedAncestors(_) => Some(64),
            BroadcastError::InsufficientPriority(_) => Some(66),
            BroadcastError::Unmapped(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BroadcastError::InsufficientPriority(m)
            | BroadcastError::DoubleSpend(m)
            | BroadcastError::NetworkError(m)
            | BroadcastError::TooManyUnconfirmedAncestors(m)
            | BroadcastError::Unmapped(m) => m,
        }
    }
}

impl From<RpcError> for BroadcastError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Rpc { message, .. } => BroadcastError::from_message(&message),
            e if e.is_transport() => BroadcastError::NetworkError(e.to_string()),
            e => BroadcastError::from_message(&e.to_string()),
        }
    }
}

/// Submits signed transactions to the network.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Broadcast raw transaction hex, returning the accepted txid.
    async fn broadcast(&self, raw_hex: &str) -> Result<Txid, BroadcastError>;
}

#[async_trait]
impl Broadcaster for NodeRpc {
    async fn broadcast(&self, raw_hex: &str) -> Result<Txid, BroadcastError> {
        let txid = self.send_raw_transaction(raw_hex).await?;
        log::info!("broadcast accepted: {}", txid);
        Txid::from_hex(&txid).map_err(|e| BroadcastError::Unmapped(e.to_string()))
    }
}
