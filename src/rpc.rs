//! JSON-RPC 2.0 plumbing: request envelopes, id allocation, response
//! interpretation, and the transport boundary.

use crate::error::{PeggyError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

pub const JSONRPC_VERSION: &str = "2.0";
pub const RPC_START_ID: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        RpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Monotonic request ids, unique for the lifetime of the allocator.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicU64,
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::starting_at(RPC_START_ID)
    }
}

impl RequestIds {
    pub fn starting_at(first: u64) -> Self {
        RequestIds {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Checks the envelope of a node response and extracts a typed result.
pub fn interpret_response<T: DeserializeOwned>(expected_id: u64, body: Value) -> Result<T> {
    let response: RpcResponse = serde_json::from_value(body)
        .map_err(|e| PeggyError::RpcFailure(format!("malformed response: {}", e)))?;

    if let Some(err) = response.error {
        return Err(PeggyError::RpcFailure(format!(
            "{} (code {})",
            err.message, err.code
        )));
    }

    match response.id {
        Some(Value::Number(ref n)) if n.as_u64() == Some(expected_id) => {}
        other => {
            return Err(PeggyError::RpcFailure(format!(
                "response id {:?} does not match request id {}",
                other, expected_id
            )))
        }
    }

    let result = response
        .result
        .ok_or_else(|| PeggyError::RpcFailure("response carries no result".to_string()))?;
    serde_json::from_value(result)
        .map_err(|e| PeggyError::RpcFailure(format!("unexpected result shape: {}", e)))
}

/// Carries one request to the node and returns the raw response body.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, request: &RpcRequest) -> Result<Value>;
}

/// HTTP POST transport for a single node endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    url: Url,
    client: Client,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: &str, bearer_token: Option<String>, timeout: Duration) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|e| {
            PeggyError::ConfigError(format!("invalid RPC endpoint {}: {}", endpoint, e))
        })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport {
            url,
            client,
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, request: &RpcRequest) -> Result<Value> {
        debug!("Sending {} (id {}) to {}", request.method, request.id, self.url);
        let mut builder = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(request);
        if let Some(token) = &self.bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let res = builder.send().await?;
        if !res.status().is_success() {
            error!("{} rejected with HTTP {}", request.method, res.status());
            return Err(PeggyError::RpcFailure(format!(
                "{} returned HTTP {}",
                request.method,
                res.status()
            )));
        }

        info!("{} answered", request.method);
        Ok(res.json().await?)
    }
}
