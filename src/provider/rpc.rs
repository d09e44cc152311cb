//! Ethereum JSON-RPC client.
//!
//! A thin `reqwest` wrapper that speaks JSON-RPC 2.0, retries transient
//! transport failures, and exposes the two methods the lookup providers
//! need: `eth_call` and `eth_getBlockByNumber`.

use crate::error::ProviderError;
use crate::models::{BlockRef, Observation};
use alloy_primitives::{hex, Address};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub timeout_seconds: u64,
    /// Extra attempts after the first one, for transport failures only.
    pub retries: usize,
    /// Delay before the first retry; grows linearly.
    pub retry_backoff_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8545".to_string(),
            timeout_seconds: 30,
            retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl From<&crate::config::RpcSettings> for RpcConfig {
    fn from(settings: &crate::config::RpcSettings) -> Self {
        Self {
            url: settings.url.clone(),
            timeout_seconds: settings.timeout_seconds,
            retries: settings.retries,
            retry_backoff_ms: settings.retry_backoff_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client shared by the lookup provider and the clock.
pub struct JsonRpcClient {
    config: RpcConfig,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client for `config.url`.
    pub fn new(config: RpcConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Send one request, retrying transport failures.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut attempt = 0;

        loop {
            match self.send_once(method, &params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff_ms * attempt as u64;
                    warn!(
                        "{} failed ({}), retry {}/{} in {}ms",
                        method, e, attempt, self.config.retries, delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!("-> {} #{}", method, id);

        let response = self
            .http_client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    ProviderError::Transport(format!("cannot connect to {}", self.config.url))
                } else {
                    ProviderError::Transport(format!("failed to send request: {}", e))
                }
            })?;

        // 429 and 5xx are retried; other statuses are final.
        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Malformed(format!("HTTP {}: {}", status, body)));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON-RPC response: {}", e)))?;

        into_result(body)
    }

    /// `eth_call` against `to` with raw calldata, returning raw return data.
    pub async fn eth_call(
        &self,
        to: Address,
        data: &[u8],
        at: BlockRef,
    ) -> Result<Vec<u8>, ProviderError> {
        let params = json!([
            {
                "to": to,
                "data": format!("0x{}", hex::encode(data)),
            },
            at.to_tag(),
        ]);

        let value = self.request("eth_call", params).await?;
        decode_call_result(&value)
    }

    /// Timestamp and number of the block at `at`.
    pub async fn block(&self, at: BlockRef) -> Result<Observation, ProviderError> {
        let value = self
            .request("eth_getBlockByNumber", json!([at.to_tag(), false]))
            .await?;
        parse_block_header(&value)
    }
}

fn into_result(body: JsonRpcResponse) -> Result<Value, ProviderError> {
    if let Some(err) = body.error {
        return Err(ProviderError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    Ok(body.result)
}

/// Decode the hex string returned by `eth_call`. An empty `0x` is an
/// error: a missing contract must never read as a zero balance.
pub fn decode_call_result(value: &Value) -> Result<Vec<u8>, ProviderError> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::Malformed(format!("eth_call result is not a string: {}", value)))?;

    let bytes = hex::decode(text)
        .map_err(|e| ProviderError::Malformed(format!("eth_call result is not hex: {}", e)))?;

    if bytes.is_empty() {
        return Err(ProviderError::EmptyResult);
    }

    Ok(bytes)
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &Value, field: &str) -> Result<u64, ProviderError> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::Malformed(format!("{} is missing or not a string", field)))?;

    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::Malformed(format!("{} is not 0x-prefixed: {}", field, text)))?;

    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::Malformed(format!("invalid {} {}: {}", field, text, e)))
}

/// Extract `{timestamp, number}` from an `eth_getBlockByNumber` result.
pub fn parse_block_header(value: &Value) -> Result<Observation, ProviderError> {
    if value.is_null() {
        return Err(ProviderError::Malformed("block not found".to_string()));
    }

    Ok(Observation {
        timestamp: parse_quantity(&value["timestamp"], "timestamp")?,
        sequence: parse_quantity(&value["number"], "number")?,
    })
}
