use crate::errors::{AppError, Result};
use crate::rpc::transport::HttpTransport;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const JSONRPC_VERSION: &str = "2.0";
const REQUEST_ID: &str = "dontcare";

/// Finality used for reads that only decide whether to act.
pub const DEFAULT_FINALITY: &str = "optimistic";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    pub params: Value,
    pub id: &'a str,
    pub jsonrpc: &'a str,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, params: Value) -> Self {
        Self {
            method,
            params,
            id: REQUEST_ID,
            jsonrpc: JSONRPC_VERSION,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<Value>,
}

/// `sync_info` section of a `status` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: u64,
    pub syncing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct CallFunctionResult {
    #[serde(default)]
    result: Option<Vec<u8>>,
    #[serde(default)]
    error: Option<String>,
}

/// JSON-RPC client bound to one endpoint.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn HttpTransport>,
    addr: String,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn HttpTransport>, addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Issue one JSON-RPC call and return its `result` payload.
    ///
    /// Non-2xx replies and error envelopes come back as [`AppError::RpcProtocol`];
    /// transport failures keep their own classification.
    pub async fn json_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = serde_json::to_value(RpcRequest::new(method, params))?;
        debug!(addr = %self.addr, method, "[RPC] request");
        let reply = self.transport.post_json(&self.addr, &request, self.timeout).await?;
        if !reply.is_success() {
            return Err(AppError::RpcProtocol {
                code: Some(i64::from(reply.status)),
                message: format!("HTTP {}: {}", reply.status, truncate(&reply.body, 200)),
            });
        }
        let envelope: RpcEnvelope = serde_json::from_str(&reply.body)
            .map_err(|e| AppError::malformed(format!("{method}: invalid JSON-RPC body: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(protocol_error(error));
        }
        envelope
            .result
            .ok_or_else(|| AppError::malformed(format!("{method}: response has neither result nor error")))
    }

    pub async fn get_status(&self) -> Result<NodeStatus> {
        let value = self.json_rpc("status", json!([null])).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::malformed(format!("status: unexpected payload: {e}")))
    }

    /// Call a read-only contract method and return its raw return bytes.
    pub async fn view_call(
        &self,
        account_id: &str,
        method_name: &str,
        args: &[u8],
        finality: &str,
    ) -> Result<Vec<u8>> {
        let params = json!({
            "request_type": "call_function",
            "account_id": account_id,
            "method_name": method_name,
            "args_base64": STANDARD.encode(args),
            "finality": finality,
        });
        let value = self.json_rpc("query", params).await?;
        let call: CallFunctionResult = serde_json::from_value(value)
            .map_err(|e| AppError::malformed(format!("{method_name}: unexpected payload: {e}")))?;
        if let Some(error) = call.error {
            return Err(AppError::protocol(error));
        }
        call.result
            .ok_or_else(|| AppError::malformed(format!("{method_name}: missing result bytes")))
    }
}

fn protocol_error(error: Value) -> AppError {
    let code = error.get("code").and_then(Value::as_i64);
    let message = error
        .get("data")
        .or_else(|| error.get("message"))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| error.to_string());
    AppError::RpcProtocol { code, message }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
