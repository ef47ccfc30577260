use crate::errors::{AppError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Immutable snapshot of one two-token pool as published by the indexer.
///
/// Balances stay in the feed's decimal-string form; they are only turned into
/// integers when a swap is sized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    pub id: u64,
    pub token_account_ids: Vec<String>,
    pub amounts: Vec<String>,
    /// Total fee in basis points of 10,000.
    pub total_fee: u32,
}

/// A pool viewed in the direction of one swap leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrientedPool<'a> {
    pub token_in: &'a str,
    pub token_out: &'a str,
    pub balance_in: &'a str,
    pub balance_out: &'a str,
    pub total_fee: u32,
}

impl Pool {
    fn oriented(&self, in_idx: usize) -> Option<OrientedPool<'_>> {
        if self.token_account_ids.len() != 2 || self.amounts.len() != 2 {
            return None;
        }
        let out_idx = 1 - in_idx;
        Some(OrientedPool {
            token_in: &self.token_account_ids[in_idx],
            token_out: &self.token_account_ids[out_idx],
            balance_in: &self.amounts[in_idx],
            balance_out: &self.amounts[out_idx],
            total_fee: self.total_fee,
        })
    }

    /// Orientation that consumes `token_in`, whatever slot it occupies in the feed.
    pub fn selling(&self, token_in: &str) -> Option<OrientedPool<'_>> {
        let idx = self.token_account_ids.iter().position(|t| t == token_in)?;
        self.oriented(idx)
    }

    /// Orientation that produces `token_out`.
    pub fn buying(&self, token_out: &str) -> Option<OrientedPool<'_>> {
        let idx = self.token_account_ids.iter().position(|t| t == token_out)?;
        self.oriented(1usize.checked_sub(idx)?)
    }
}

#[derive(Deserialize)]
struct RawPool {
    token_account_ids: Vec<String>,
    amounts: Vec<Value>,
    total_fee: Value,
}

/// The full pool list fetched for one attempt.
#[derive(Clone, Debug)]
pub struct PoolSnapshot {
    entries: Vec<Value>,
}

impl PoolSnapshot {
    /// Wrap an indexer payload; anything but a JSON array is malformed.
    pub fn from_feed(feed: Value) -> Result<Self> {
        match feed {
            Value::Array(entries) => Ok(Self { entries }),
            other => Err(AppError::malformed(format!(
                "pool feed is not an array: {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look a pool up by id. Only the matched entry has to be well formed.
    pub fn find(&self, id: u64) -> Result<Option<Pool>> {
        let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.get("id").and_then(pool_id) == Some(id))
        else {
            return Ok(None);
        };
        let raw: RawPool = serde_json::from_value(entry.clone())
            .map_err(|e| AppError::malformed(format!("pool {id}: {e}")))?;
        let amounts = raw
            .amounts
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(AppError::malformed(format!(
                    "pool {id}: amount is {}",
                    json_kind(other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        let total_fee = raw
            .total_fee
            .as_u64()
            .or_else(|| raw.total_fee.as_str().and_then(|s| s.parse().ok()))
            .and_then(|fee| u32::try_from(fee).ok())
            .ok_or_else(|| AppError::malformed(format!("pool {id}: bad total_fee {}", raw.total_fee)))?;
        Ok(Some(Pool {
            id,
            token_account_ids: raw.token_account_ids,
            amounts,
            total_fee,
        }))
    }
}

/// The feed publishes ids as strings or numbers.
fn pool_id(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
