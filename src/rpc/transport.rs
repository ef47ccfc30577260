//! HTTP plumbing shared by the RPC client and the pool indexer client.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Raw HTTP outcome; status classification is left to the caller.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface. Implementations must honour `timeout` and report
/// connection-level failures as [`AppError::TransientNetwork`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<HttpReply>;

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn finish(resp: reqwest::Response) -> Result<HttpReply> {
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_error)?;
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<HttpReply> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;
        Self::finish(resp).await
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;
        Self::finish(resp).await
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::TransientNetwork(format!("timed out: {e}"))
    } else {
        AppError::TransientNetwork(e.to_string())
    }
}
