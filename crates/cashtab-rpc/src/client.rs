//! JSON-RPC transport to an eCash node.
//!
//! Every method is a POST to the node's root URL. `call()` retries
//! transient failures with doubling backoff; `call_once()` sends exactly one
//! request and is what broadcasting uses.

use crate::error::RpcError;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Longest slice of an error body kept in [`RpcError::HttpStatus`].
const MAX_ERROR_BODY: usize = 500;

#[derive(Serialize)]
struct Envelope<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Reply {
    result: Option<Value>,
    error: Option<ReplyError>,
}

#[derive(Deserialize)]
struct ReplyError {
    code: i64,
    message: String,
}

/// Where and how to reach the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Node URL, e.g. `http://localhost:8332`.
    pub url: String,
    /// RPC user; sent as Basic auth together with `password`.
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// Extra attempts made by [`RpcClient::call`] after a transient failure.
    pub retries: u32,
    /// First backoff in milliseconds; doubled for every further attempt.
    pub retry_delay_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: format!("http://localhost:{}", crate::ports::MAINNET),
            username: None,
            password: None,
            timeout_secs: 30,
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay before retry number `n` (1-based).
    fn backoff(&self, n: u32) -> Duration {
        self.retry_delay() * 2u32.saturating_pow(n.saturating_sub(1))
    }

    fn basic_auth(&self) -> Option<HeaderValue> {
        let (user, pass) = (self.username.as_ref()?, self.password.as_ref()?);
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        HeaderValue::from_str(&format!("Basic {token}")).ok()
    }
}

/// Async JSON-RPC client for a single node.
pub struct RpcClient {
    http: reqwest::Client,
    headers: HeaderMap,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_config(RpcConfig { url: url.to_string(), ..Default::default() })
    }

    pub fn with_config(mut config: RpcConfig) -> Result<Self, RpcError> {
        config.url = config.url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = config.basic_auth() {
            headers.insert(AUTHORIZATION, auth);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;

        Ok(Self { http, headers, config, next_id: AtomicU64::new(0) })
    }

    /// Node URL without a trailing slash.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    fn envelope<'a>(&self, method: &'a str, params: Value) -> Envelope<'a> {
        Envelope {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        }
    }

    /// Call `method`, retrying while the failure is transient.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = self.envelope(method, params);
        let mut retry = 0;
        loop {
            match self.post(&request).await {
                Err(e) if e.is_transient() && retry < self.config.retries => {
                    retry += 1;
                    let delay = self.config.backoff(retry);
                    log::warn!("{} failed ({}); retry {} in {:?}", method, e, retry, delay);
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Call `method` with a single request.
    pub async fn call_once(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.post(&self.envelope(method, params)).await
    }

    async fn post(&self, request: &Envelope<'_>) -> Result<Value, RpcError> {
        let url = self.config.url.as_str();
        let method = request.method;
        let transport = |source: reqwest::Error| RpcError::Http {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };

        let response = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        if status == 401 {
            return Err(RpcError::AuthFailed { url: url.to_string() });
        }
        let body = response.text().await.map_err(transport)?;
        let ok = status < 400;

        // Node-side errors arrive with a 4xx/5xx status and a JSON body.
        match serde_json::from_str::<Reply>(&body) {
            Ok(Reply { error: Some(err), .. }) => Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
                method: method.to_string(),
            }),
            Ok(Reply { result: Some(result), .. }) if ok => Ok(result),
            Ok(_) if ok => Err(RpcError::NoResult { context: method.to_string() }),
            Err(e) if ok => Err(RpcError::Json(e)),
            _ => Err(RpcError::HttpStatus {
                method: method.to_string(),
                url: url.to_string(),
                status,
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            }),
        }
    }
}
