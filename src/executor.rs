//! Transaction submission.
//!
//! Signing is delegated: the submitter turns a function call into a finalized
//! transaction and hands back whatever receipt it can.

use crate::buyback::types::SwapAction;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// Gas attached to `do_buyback` (300 Tgas).
pub const BUYBACK_GAS: u64 = 300_000_000_000_000;

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub contract_id: String,
    pub method_name: String,
    pub args: Value,
    pub gas: u64,
}

#[derive(Serialize)]
struct SwapMsg<'a> {
    actions: &'a [SwapAction],
}

impl FunctionCall {
    /// `do_buyback` with the actions JSON-encoded into the `swap_msg` string.
    pub fn do_buyback(contract_id: &str, actions: &[SwapAction]) -> Result<Self> {
        let swap_msg = serde_json::to_string(&SwapMsg { actions })?;
        Ok(Self {
            contract_id: contract_id.to_string(),
            method_name: "do_buyback".to_string(),
            args: json!({ "swap_msg": swap_msg }),
            gas: BUYBACK_GAS,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_id: Option<String>,
    pub output: String,
}

#[async_trait]
pub trait TxSubmitter: Send + Sync {
    async fn submit(&self, call: &FunctionCall) -> Result<Receipt>;
}

/// Logs the call instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct DryRunSubmitter;

#[async_trait]
impl TxSubmitter for DryRunSubmitter {
    async fn submit(&self, call: &FunctionCall) -> Result<Receipt> {
        info!(
            contract = %call.contract_id,
            method = %call.method_name,
            gas = call.gas,
            args = %call.args,
            "[SUBMIT] dry run, not sending"
        );
        Ok(Receipt::default())
    }
}

/// Signs and sends through an installed `near` CLI using its local credentials.
#[derive(Debug, Clone)]
pub struct NearCliSubmitter {
    pub bin: String,
    pub signer_account_id: String,
    pub timeout: Duration,
}

impl NearCliSubmitter {
    pub fn new(bin: impl Into<String>, signer_account_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            signer_account_id: signer_account_id.into(),
            timeout,
        }
    }

    pub fn command_args(&self, call: &FunctionCall) -> Vec<String> {
        vec![
            "call".to_string(),
            call.contract_id.clone(),
            call.method_name.clone(),
            call.args.to_string(),
            "--accountId".to_string(),
            self.signer_account_id.clone(),
            "--gas".to_string(),
            call.gas.to_string(),
        ]
    }
}

#[async_trait]
impl TxSubmitter for NearCliSubmitter {
    async fn submit(&self, call: &FunctionCall) -> Result<Receipt> {
        info!(
            contract = %call.contract_id,
            method = %call.method_name,
            signer = %self.signer_account_id,
            "[SUBMIT] sending transaction"
        );
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.bin)
                .args(self.command_args(call))
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AppError::TransientNetwork(format!("submission timed out after {:?}", self.timeout)))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Submission(format!(
                "{} exited with {}: {}",
                self.bin,
                output.status,
                stderr.trim()
            )));
        }
        Ok(Receipt {
            transaction_id: parse_transaction_id(&stdout),
            output: stdout,
        })
    }
}

/// Pull the hash out of a `Transaction Id <hash>` line.
pub fn parse_transaction_id(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("Transaction Id"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}
