//! RPC error types.

use thiserror::Error;

/// JSON-RPC error codes returned by the node.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Transaction rejected by the mempool.
    pub const VERIFY_REJECTED: i64 = -26;
    /// Transaction already in the chain.
    pub const VERIFY_ALREADY_IN_CHAIN: i64 = -27;
    /// Node is still warming up.
    pub const IN_WARMUP: i64 = -28;
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error calling {method} at {url}: {source}")]
    Http {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} calling {method} at {url}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code} from {method}: {message}")]
    Rpc { code: i64, message: String, method: String },

    #[error("no result in response to {context}")]
    NoResult { context: String },

    #[error("authentication failed for {url}")]
    AuthFailed { url: String },

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            RpcError::HttpStatus { status, .. } => matches!(status, 502..=504),
            RpcError::Rpc { code, .. } => *code == codes::IN_WARMUP,
            _ => false,
        }
    }

    /// Whether the request never got an answer from the node.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Http { .. } | RpcError::HttpStatus { .. })
    }
}
