//! Configuration loader and application settings.

use crate::errors::{AppError, Result};
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Target network, selected through `NEAR_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(AppError::Config(format!("Invalid NEAR_ENV: {other}"))),
        }
    }
}

/// Deployment defaults for a network. Every field can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct NetworkPreset {
    pub rpc_urls: &'static [&'static str],
    pub buyback_contract: &'static str,
    pub token_in: &'static str,
    pub token_out: &'static str,
    pub pool_one: u64,
    pub pool_two: u64,
    pub indexer_url: &'static str,
    pub signer_account_id: &'static str,
}

impl Network {
    pub fn preset(self) -> NetworkPreset {
        match self {
            Network::Mainnet => NetworkPreset {
                rpc_urls: &["https://rpc.mainnet.near.org"],
                buyback_contract: "buyback.juaner.near",
                token_in: "a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48.factory.bridge.near",
                token_out: "token.burrow.near",
                pool_one: 3,
                pool_two: 3474,
                indexer_url: "https://indexer.ref.finance/list-top-pools",
                signer_account_id: "juaner.near",
            },
            Network::Testnet => NetworkPreset {
                rpc_urls: &["https://rpc.testnet.near.org"],
                buyback_contract: "dev-1702289480516-51259361492553",
                token_in: "usdt.fakes.testnet",
                token_out: "token.1689937928.burrow.testnet",
                pool_one: 465,
                pool_two: 714,
                indexer_url: "https://dev-indexer.ref-finance.com/list-pools",
                signer_account_id: "juaner.testnet",
            },
        }
    }
}

/// Timing and bounding of the buyback loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Hard cap on passes through check-funds → submit.
    pub max_attempts: u32,
    pub initial_jitter_secs: u64,
    pub retry_jitter_secs: u64,
    pub verify_delay: Duration,
    pub rpc_timeout: Duration,
    pub indexer_timeout: Duration,
    pub submit_timeout: Duration,
    /// Fraction of the quoted output accepted as `min_amount_out`.
    pub slippage: BigDecimal,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_jitter_secs: 3600,
            retry_jitter_secs: 600,
            verify_delay: Duration::from_secs(60),
            rpc_timeout: Duration::from_secs(2),
            indexer_timeout: Duration::from_secs(20),
            submit_timeout: Duration::from_secs(120),
            slippage: BigDecimal::from_str("0.997").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    NearCli,
    DryRun,
}

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: Network,
    /// Candidate RPC endpoints, probed in order.
    pub rpc_urls: Vec<String>,
    pub buyback_contract: String,
    pub token_in: String,
    pub token_out: String,
    pub pool_one: u64,
    pub pool_two: u64,
    pub indexer_url: String,
    pub signer_account_id: String,
    pub submit_mode: SubmitMode,
    pub near_cli_bin: String,
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let network: Network = get("NEAR_ENV")
            .ok_or_else(|| AppError::Config("Missing NEAR_ENV".into()))?
            .parse()?;
        let preset = network.preset();
        let or_preset = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let rpc_urls: Vec<String> = match get("RPC_URLS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => preset.rpc_urls.iter().map(|s| s.to_string()).collect(),
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&get, "MAX_ATTEMPTS", defaults.max_attempts)?,
            initial_jitter_secs: parse_or(&get, "INITIAL_JITTER_SECS", defaults.initial_jitter_secs)?,
            retry_jitter_secs: parse_or(&get, "RETRY_JITTER_SECS", defaults.retry_jitter_secs)?,
            verify_delay: secs_or(&get, "VERIFY_DELAY_SECS", defaults.verify_delay)?,
            rpc_timeout: secs_or(&get, "RPC_TIMEOUT_SECS", defaults.rpc_timeout)?,
            indexer_timeout: secs_or(&get, "INDEXER_TIMEOUT_SECS", defaults.indexer_timeout)?,
            submit_timeout: secs_or(&get, "SUBMIT_TIMEOUT_SECS", defaults.submit_timeout)?,
            slippage: parse_or(&get, "SLIPPAGE", defaults.slippage)?,
        };

        let submit_mode = match get("SUBMIT_MODE").as_deref() {
            None | Some("near-cli") => SubmitMode::NearCli,
            Some("dry-run") => SubmitMode::DryRun,
            Some(other) => {
                return Err(AppError::Config(format!("Invalid SUBMIT_MODE: {other}")));
            }
        };

        let config = Self {
            network,
            rpc_urls,
            buyback_contract: or_preset("BUYBACK_CONTRACT", preset.buyback_contract),
            token_in: or_preset("BUYBACK_TOKEN_IN", preset.token_in),
            token_out: or_preset("BUYBACK_TOKEN_OUT", preset.token_out),
            pool_one: parse_or(&get, "BUYBACK_POOL_ONE", preset.pool_one)?,
            pool_two: parse_or(&get, "BUYBACK_POOL_TWO", preset.pool_two)?,
            indexer_url: or_preset("INDEXER_URL", preset.indexer_url),
            signer_account_id: or_preset("SIGNER_ACCOUNT_ID", preset.signer_account_id),
            submit_mode,
            near_cli_bin: or_preset("NEAR_CLI_BIN", "near"),
            retry,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rpc_urls.is_empty() {
            return Err(AppError::Config("RPC_URLS must list at least one endpoint".into()));
        }
        for raw in self.rpc_urls.iter().chain(std::iter::once(&self.indexer_url)) {
            let url = Url::parse(raw)
                .map_err(|e| AppError::Config(format!("Invalid URL {raw}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::Config(format!("Unsupported URL scheme: {raw}")));
            }
        }
        if self.pool_one == self.pool_two {
            return Err(AppError::Config("Buyback pools must differ".into()));
        }
        if self.token_in == self.token_out {
            return Err(AppError::Config("Token in and token out must differ".into()));
        }
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(AppError::Config("MAX_ATTEMPTS must be at least 1".into()));
        }
        if retry.initial_jitter_secs == 0 || retry.retry_jitter_secs == 0 {
            return Err(AppError::Config("Jitter bounds must be at least 1 second".into()));
        }
        if retry.slippage <= BigDecimal::from(0) || retry.slippage > BigDecimal::from(1) {
            return Err(AppError::Config("SLIPPAGE must be within (0, 1]".into()));
        }
        Ok(())
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_secs()).map(Duration::from_secs)
}
