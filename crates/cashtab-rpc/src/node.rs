//! Node RPC client.
//!
//! Typed async methods for the node endpoints the wallet needs: chain
//! status, raw transaction lookup, and relay.

use crate::client::{RpcClient, RpcConfig};
use crate::error::RpcError;
use serde::Deserialize;
use serde_json::{json, Value};

/// `getblockchaininfo` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(default)]
    pub headers: u64,
    #[serde(rename = "bestblockhash", default)]
    pub best_block_hash: String,
    #[serde(rename = "initialblockdownload", default)]
    pub initial_block_download: bool,
    /// Catch-all for additional fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Async RPC client for an eCash node.
pub struct NodeRpc {
    client: RpcClient,
}

impl NodeRpc {
    /// Create a node RPC client connected to the given URL.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Ok(Self { client: RpcClient::new(url)? })
    }

    /// Create with full configuration.
    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        Ok(Self { client: RpcClient::with_config(config)? })
    }

    /// Get the underlying RPC client for custom calls.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo, RpcError> {
        let val = self.client.call("getblockchaininfo", json!([])).await?;
        Ok(serde_json::from_value(val)?)
    }

    pub async fn get_block_count(&self) -> Result<u64, RpcError> {
        let val = self.client.call("getblockcount", json!([])).await?;
        val.as_u64().ok_or(RpcError::NoResult { context: "getblockcount".into() })
    }

    /// Raw hex of a transaction the node knows about.
    pub async fn get_raw_transaction(&self, txid: &str) -> Result<String, RpcError> {
        let val = self.client.call("getrawtransaction", json!([txid, false])).await?;
        val.as_str()
            .map(str::to_string)
            .ok_or(RpcError::NoResult { context: "getrawtransaction".into() })
    }

    /// Submit a raw transaction. Sent once; rejections are never retried.
    pub async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        let val = self.client.call_once("sendrawtransaction", json!([tx_hex])).await?;
        val.as_str()
            .map(str::to_string)
            .ok_or(RpcError::NoResult { context: "sendrawtransaction".into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_rpc_creation() {
        let node = NodeRpc::new("http://localhost:8332").unwrap();
        assert_eq!(node.client().url(), "http://localhost:8332");
    }

    #[test]
    fn test_blockchain_info_deserialize() {
        let json = json!({
            "chain": "main",
            "blocks": 800000,
            "headers": 800000,
            "bestblockhash": "00000000000000000c1f9e0b4b8d5a1e3b1d4b5e6f7a8b9c0d1e2f3a4b5c6d7e",
            "initialblockdownload": false,
            "difficulty": 123.45
        });
        let info: BlockchainInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info.chain, "main");
        assert_eq!(info.blocks, 800000);
        assert!(!info.initial_block_download);
        assert!(info.extra.contains_key("difficulty"));
    }
}
