//! The buyback state machine.
//!
//! One attempt walks check-funds → jitter → build → submit → verify. A generic
//! failure anywhere in the attempt buys exactly one wait-and-recheck; protocol,
//! selection and cancellation errors end the run. Retries are iterative and
//! capped by `RetryPolicy::max_attempts`.

use crate::buyback::planner::{Route, build_actions};
use crate::buyback::types::{AttemptOutcome, BuybackAttempt, BuybackOutcome, BuybackReport};
use crate::config::AppConfig;
use crate::dex::client::PoolSource;
use crate::errors::{AppError, ErrorClass, Result};
use crate::executor::{FunctionCall, TxSubmitter};
use crate::rpc::client::DEFAULT_FINALITY;
use crate::rpc::selector::select_best_node;
use crate::rpc::transport::HttpTransport;
use crate::utils::{cancellable, sleep_cancellable};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// View method exposing the spendable fund.
pub const FUND_METHOD: &str = "get_available_fund_amount";

enum Step {
    Finish(BuybackOutcome),
    Retry { remaining: u128 },
}

pub struct Orchestrator {
    config: AppConfig,
    route: Route,
    transport: Arc<dyn HttpTransport>,
    pools: Arc<dyn PoolSource>,
    submitter: Arc<dyn TxSubmitter>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn HttpTransport>,
        pools: Arc<dyn PoolSource>,
        submitter: Arc<dyn TxSubmitter>,
        cancel: CancellationToken,
    ) -> Self {
        let route = Route::from_config(&config);
        Self {
            config,
            route,
            transport,
            pools,
            submitter,
            cancel,
        }
    }

    /// Select a node and read the fund amount. Read-only.
    pub async fn check_funds(&self) -> Result<u128> {
        let node = cancellable(
            &self.cancel,
            select_best_node(
                self.transport.clone(),
                &self.config.rpc_urls,
                self.config.retry.rpc_timeout,
            ),
        )
        .await?;
        let bytes = cancellable(
            &self.cancel,
            node.client.view_call(
                &self.config.buyback_contract,
                FUND_METHOD,
                b"",
                DEFAULT_FINALITY,
            ),
        )
        .await?;
        parse_fund_amount(&bytes)
    }

    /// Drive attempts until a terminal outcome or the attempt cap.
    pub async fn run(&self) -> Result<BuybackReport> {
        let policy = &self.config.retry;
        let mut attempts = Vec::new();
        let mut number = 1u32;
        let mut jitter_bound = policy.initial_jitter_secs;

        loop {
            let mut attempt = BuybackAttempt::new(number, jitter_bound);
            let step = match self.attempt(&mut attempt).await {
                Ok(step) => step,
                Err(e) if e.class() == ErrorClass::Generic => {
                    attempt.outcome = AttemptOutcome::Failed;
                    warn!(attempt = number, error = %e, "[BUYBACK] attempt failed");
                    self.recover().await?
                }
                Err(e) => {
                    error!(attempt = number, error = %e, "[BUYBACK] aborting run");
                    return Err(e);
                }
            };

            match step {
                Step::Finish(outcome) => {
                    attempts.push(attempt);
                    info!(?outcome, attempts = number, "[BUYBACK] run finished");
                    return Ok(BuybackReport { outcome, attempts });
                }
                Step::Retry { remaining } if number >= policy.max_attempts => {
                    attempt.outcome = AttemptOutcome::Exhausted;
                    attempts.push(attempt);
                    warn!(attempts = number, remaining = %remaining, "[BUYBACK] attempts exhausted with funds left");
                    return Ok(BuybackReport {
                        outcome: BuybackOutcome::AttemptsExhausted {
                            attempts: number,
                            remaining,
                        },
                        attempts,
                    });
                }
                Step::Retry { remaining } => {
                    attempts.push(attempt);
                    number += 1;
                    jitter_bound = policy.retry_jitter_secs;
                    info!(remaining = %remaining, next_attempt = number, jitter_bound, "[BUYBACK] funds remain, retrying");
                }
            }
        }
    }

    async fn attempt(&self, attempt: &mut BuybackAttempt) -> Result<Step> {
        let amount = self.check_funds().await?;
        info!(attempt = attempt.number, fund_amount = %amount, "[BUYBACK] checked funds");
        let Some(amount) = positive(amount) else {
            attempt.outcome = AttemptOutcome::NotFunded;
            info!(attempt = attempt.number, "[BUYBACK] not funded");
            return Ok(Step::Finish(BuybackOutcome::NotFunded));
        };
        attempt.fund_amount = Some(amount);

        self.jitter(attempt.jitter_bound_secs).await?;
        let snapshot = cancellable(&self.cancel, self.pools.fetch_pools()).await?;
        let actions = build_actions(&self.route, amount, &snapshot)?;
        attempt.actions = actions.clone();
        info!(actions = %serde_json::to_string(&actions)?, "[BUYBACK] built actions");
        if actions.is_empty() {
            attempt.outcome = AttemptOutcome::NoViableRoute;
            info!("[BUYBACK] no viable route, skipping submission");
            return Ok(Step::Finish(BuybackOutcome::NoViableRoute));
        }

        let call = FunctionCall::do_buyback(&self.config.buyback_contract, &actions)?;
        let receipt = cancellable(&self.cancel, self.submitter.submit(&call)).await?;
        attempt.submitted = true;
        info!(tx = ?receipt.transaction_id, "[BUYBACK] submitted");

        let delay = self.config.retry.verify_delay;
        info!(secs = delay.as_secs(), "[BUYBACK] waiting before verification");
        sleep_cancellable(&self.cancel, delay).await?;
        let remaining = self.check_funds().await?;
        info!(attempt = attempt.number, fund_amount = %remaining, "[BUYBACK] verification read");
        match positive(remaining) {
            None => {
                attempt.outcome = AttemptOutcome::Verified;
                Ok(Step::Finish(BuybackOutcome::Verified))
            }
            Some(remaining) => {
                attempt.outcome = AttemptOutcome::Executed;
                Ok(Step::Retry { remaining })
            }
        }
    }

    /// The single wait-and-recheck after a generic failure.
    async fn recover(&self) -> Result<Step> {
        let delay = self.config.retry.verify_delay;
        info!(secs = delay.as_secs(), "[BUYBACK] waiting before re-checking funds");
        sleep_cancellable(&self.cancel, delay).await?;
        match self.check_funds().await {
            Ok(amount) => match positive(amount) {
                Some(remaining) => Ok(Step::Retry { remaining }),
                None => {
                    info!("[BUYBACK] not funded after recovery");
                    Ok(Step::Finish(BuybackOutcome::NotFunded))
                }
            },
            Err(e) if e.class() == ErrorClass::Generic => {
                warn!(error = %e, "[BUYBACK] recovery check failed, giving up this cycle");
                Ok(Step::Finish(BuybackOutcome::NotFunded))
            }
            Err(e) => Err(e),
        }
    }

    async fn jitter(&self, bound_secs: u64) -> Result<()> {
        let secs = rand::thread_rng().gen_range(1..=bound_secs.max(1));
        info!(bound_secs, secs, "[BUYBACK] jitter before building actions");
        sleep_cancellable(&self.cancel, Duration::from_secs(secs)).await
    }
}

fn positive(amount: u128) -> Option<u128> {
    Some(amount).filter(|a| *a > 0)
}

/// Decode view-call bytes as UTF-8 JSON holding an integer, either bare or as a
/// decimal string (the contract's `U128` encoding). Negative amounts read as zero.
pub fn parse_fund_amount(bytes: &[u8]) -> Result<u128> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| AppError::malformed(format!("fund amount is not UTF-8: {e}")))?;
    // serde_json reads integers past u64 as f64
    if let Some(amount) = parse_integer(text.trim()) {
        return Ok(amount);
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::malformed(format!("fund amount is not JSON: {e}")))?;
    match &value {
        Value::String(s) => parse_integer(s)
            .ok_or_else(|| AppError::malformed(format!("fund amount is not an integer: {s:?}"))),
        Value::Number(n) => Err(AppError::malformed(format!("fund amount is not an integer: {n}"))),
        other => Err(AppError::malformed(format!("fund amount has unexpected shape: {other}"))),
    }
}

fn parse_integer(s: &str) -> Option<u128> {
    match s.strip_prefix('-') {
        Some(digits) if digits.bytes().all(|b| b.is_ascii_digit()) && !digits.is_empty() => Some(0),
        Some(_) => None,
        None if s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::state::PoolSnapshot;
    use crate::executor::Receipt;
    use crate::rpc::testing::{FnTransport, json_reply, status_result, view_result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, Debug)]
    enum Fund {
        Amount(i128),
        Protocol,
        Down,
        Garbage,
    }

    /// Two healthy nodes; fund reads follow `script`, repeating its last entry.
    fn chain(script: Vec<Fund>) -> (Arc<dyn HttpTransport>, Arc<AtomicUsize>) {
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let last: Arc<Mutex<Option<Fund>>> = Arc::new(Mutex::new(None));
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let transport = FnTransport(move |_url: &str, body: Option<&Value>| {
            let method = body.and_then(|b| b["method"].as_str()).unwrap_or_default();
            if method == "status" {
                return json_reply(json!({"result": status_result(1_000, false)}));
            }
            counter.fetch_add(1, Ordering::SeqCst);
            let next = script.lock().unwrap().pop_front();
            let fund = match next {
                Some(f) => {
                    *last.lock().unwrap() = Some(f);
                    f
                }
                None => last.lock().unwrap().expect("fund script is empty"),
            };
            match fund {
                Fund::Amount(n) => json_reply(json!({"result": view_result(format!("\"{n}\"").as_bytes())})),
                Fund::Protocol => json_reply(json!({"error": {"code": -32000, "message": "Server error"}})),
                Fund::Down => Err(AppError::TransientNetwork("connection reset".into())),
                Fund::Garbage => json_reply(json!({"result": view_result(b"not-json")})),
            }
        });
        (Arc::new(transport), reads)
    }

    struct StaticPools {
        feed: Option<Value>,
        fetches: AtomicUsize,
    }

    impl StaticPools {
        fn new(feed: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                feed,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PoolSource for StaticPools {
        async fn fetch_pools(&self) -> Result<PoolSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &self.feed {
                Some(feed) => PoolSnapshot::from_feed(feed.clone()),
                None => Err(AppError::TransientNetwork("indexer down".into())),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<FunctionCall>>,
        fail: bool,
    }

    #[async_trait]
    impl TxSubmitter for Recorder {
        async fn submit(&self, call: &FunctionCall) -> Result<Receipt> {
            self.calls.lock().unwrap().push(call.clone());
            if self.fail {
                return Err(AppError::Submission("transaction failed".into()));
            }
            Ok(Receipt {
                transaction_id: Some("tx-hash".into()),
                output: String::new(),
            })
        }
    }

    fn pools_feed() -> Value {
        json!([
            {"id": "3", "token_account_ids": ["usdc.near", "wrap.near"], "amounts": ["100000000", "100000000"], "total_fee": 0},
            {"id": "3474", "token_account_ids": ["wrap.near", "brrr.near"], "amounts": ["200000000", "100000000"], "total_fee": 30},
            {"id": "5", "token_account_ids": ["usdc.near", "dai.near"], "amounts": ["1", "1"], "total_fee": 5}
        ])
    }

    fn config(max_attempts: u32) -> AppConfig {
        let attempts = max_attempts.to_string();
        let pairs = [
            ("NEAR_ENV", "testnet"),
            ("RPC_URLS", "http://node-a,http://node-b"),
            ("BUYBACK_CONTRACT", "buyback.testnet"),
            ("BUYBACK_TOKEN_IN", "usdc.near"),
            ("BUYBACK_TOKEN_OUT", "brrr.near"),
            ("BUYBACK_POOL_ONE", "3"),
            ("BUYBACK_POOL_TWO", "3474"),
            ("MAX_ATTEMPTS", attempts.as_str()),
        ];
        AppConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    struct Harness {
        orchestrator: Orchestrator,
        reads: Arc<AtomicUsize>,
        pools: Arc<StaticPools>,
        submitter: Arc<Recorder>,
    }

    fn harness(script: Vec<Fund>, feed: Option<Value>, submitter: Recorder, max_attempts: u32) -> Harness {
        let (transport, reads) = chain(script);
        let pools = StaticPools::new(feed);
        let submitter = Arc::new(submitter);
        let orchestrator = Orchestrator::new(
            config(max_attempts),
            transport,
            pools.clone(),
            submitter.clone(),
            CancellationToken::new(),
        );
        Harness {
            orchestrator,
            reads,
            pools,
            submitter,
        }
    }

    #[test]
    fn fund_amount_decoding_is_strict() {
        assert_eq!(parse_fund_amount(b"\"500000\"").unwrap(), 500_000);
        assert_eq!(parse_fund_amount(b"42").unwrap(), 42);
        assert_eq!(parse_fund_amount(b"\"0\"").unwrap(), 0);
        assert_eq!(parse_fund_amount(b"\"-7\"").unwrap(), 0);
        assert_eq!(parse_fund_amount(b"-7").unwrap(), 0);
        assert_eq!(parse_fund_amount(b" 42\n").unwrap(), 42);
        assert_eq!(
            parse_fund_amount(b"20000000000000000000000").unwrap(),
            20_000_000_000_000_000_000_000
        );
        assert_eq!(
            parse_fund_amount(b"340282366920938463463374607431768211455").unwrap(),
            u128::MAX
        );
        assert_eq!(
            parse_fund_amount(b"\"340282366920938463463374607431768211455\"").unwrap(),
            u128::MAX
        );
        for bad in [
            &b"\"12a\""[..],
            b"\"+5\"",
            b"\"\"",
            b"\"-\"",
            b"1.5",
            b"2e22",
            b"340282366920938463463374607431768211456",
            b"null",
            b"{}",
            b"",
            &[0xff, 0xfe],
        ] {
            assert!(matches!(parse_fund_amount(bad), Err(AppError::MalformedResponse(_))), "{bad:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unfunded_contract_terminates_without_submission() {
        let h = harness(vec![Fund::Amount(0)], Some(pools_feed()), Recorder::default(), 5);
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::NotFunded);
        assert_eq!(report.outcome.exit_code(), 0);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::NotFunded);
        assert_eq!(h.pools.fetches.load(Ordering::SeqCst), 0);
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn funded_contract_submits_once_and_verifies() {
        let h = harness(
            vec![Fund::Amount(500_000), Fund::Amount(0)],
            Some(pools_feed()),
            Recorder::default(),
            5,
        );
        let started = tokio::time::Instant::now();
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::Verified);
        assert_eq!(report.submissions(), 1);
        // at least one second of jitter plus the verification window
        assert!(started.elapsed() >= Duration::from_secs(61));

        let attempt = &report.attempts[0];
        assert_eq!(attempt.fund_amount, Some(500_000));
        assert_eq!(attempt.jitter_bound_secs, 3600);
        assert_eq!(attempt.outcome, AttemptOutcome::Verified);
        assert_eq!(attempt.actions.len(), 2);
        assert_eq!(attempt.actions[0].amount_in.as_deref(), Some("500000"));
        assert_eq!(attempt.actions[0].min_amount_out, "496019");
        assert_eq!(attempt.actions[1].amount_in, None);
        assert_eq!(attempt.actions[1].min_amount_out, "246653");

        let calls = h.submitter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].contract_id, "buyback.testnet");
        assert_eq!(calls[0], FunctionCall::do_buyback("buyback.testnet", &attempt.actions).unwrap());
        assert_eq!(h.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_pool_skips_submission() {
        let feed = json!([
            {"id": "3", "token_account_ids": ["usdc.near", "wrap.near"], "amounts": ["100", "100"], "total_fee": 30}
        ]);
        let h = harness(vec![Fund::Amount(500_000)], Some(feed), Recorder::default(), 5);
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::NoViableRoute);
        assert_eq!(report.outcome.exit_code(), 0);
        assert!(report.attempts[0].actions.is_empty());
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn perpetual_funds_stop_at_the_attempt_cap() {
        let h = harness(vec![Fund::Amount(500_000)], Some(pools_feed()), Recorder::default(), 3);
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(
            report.outcome,
            BuybackOutcome::AttemptsExhausted {
                attempts: 3,
                remaining: 500_000
            }
        );
        assert_eq!(report.outcome.exit_code(), 2);
        assert_eq!(report.submissions(), 3);
        let bounds: Vec<u64> = report.attempts.iter().map(|a| a.jitter_bound_secs).collect();
        assert_eq!(bounds, vec![3600, 600, 600]);
        let outcomes: Vec<AttemptOutcome> = report.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![AttemptOutcome::Executed, AttemptOutcome::Executed, AttemptOutcome::Exhausted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_error_aborts_without_retry() {
        let h = harness(vec![Fund::Protocol], Some(pools_feed()), Recorder::default(), 5);
        let err = h.orchestrator.run().await.unwrap_err();
        assert!(matches!(err, AppError::RpcProtocol { .. }));
        assert_eq!(h.reads.load(Ordering::SeqCst), 1);
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_available_endpoint_is_fatal() {
        let transport: Arc<dyn HttpTransport> =
            Arc::new(FnTransport(|_url: &str, _body: Option<&Value>| {
                json_reply(json!({"result": status_result(1_000, true)}))
            }));
        let submitter = Arc::new(Recorder::default());
        let orchestrator = Orchestrator::new(
            config(5),
            transport,
            StaticPools::new(Some(pools_feed())),
            submitter.clone(),
            CancellationToken::new(),
        );
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, AppError::NoAvailableEndpoint { candidates: 2 }));
        assert!(submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_rechecks_once_and_stops_when_drained() {
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let h = harness(
            vec![Fund::Amount(500_000), Fund::Amount(0)],
            Some(pools_feed()),
            recorder,
            5,
        );
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::NotFunded);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Failed);
        assert!(!report.attempts[0].submitted);
        assert_eq!(h.submitter.calls.lock().unwrap().len(), 1);
        assert_eq!(h.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_into_a_shorter_retry() {
        let h = harness(
            vec![
                Fund::Down,
                Fund::Amount(500_000),
                Fund::Amount(500_000),
                Fund::Amount(0),
            ],
            Some(pools_feed()),
            Recorder::default(),
            5,
        );
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::Verified);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Failed);
        assert_eq!(report.attempts[0].jitter_bound_secs, 3600);
        assert_eq!(report.attempts[1].outcome, AttemptOutcome::Verified);
        assert_eq!(report.attempts[1].jitter_bound_secs, 600);
        assert_eq!(h.submitter.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_recovery_check_gives_up_benignly() {
        let h = harness(vec![Fund::Garbage, Fund::Down], Some(pools_feed()), Recorder::default(), 5);
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::NotFunded);
        assert_eq!(h.reads.load(Ordering::SeqCst), 2);
        assert_eq!(h.pools.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn indexer_outage_takes_the_generic_path() {
        let h = harness(
            vec![Fund::Amount(500_000), Fund::Amount(0)],
            None,
            Recorder::default(),
            5,
        );
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.outcome, BuybackOutcome::NotFunded);
        assert_eq!(h.pools.fetches.load(Ordering::SeqCst), 1);
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_fund_checks_are_consistent_and_side_effect_free() {
        let h = harness(vec![Fund::Amount(500_000)], Some(pools_feed()), Recorder::default(), 5);
        let first = h.orchestrator.check_funds().await.unwrap();
        let second = h.orchestrator.check_funds().await.unwrap();
        assert_eq!(first, 500_000);
        assert_eq!(first, second);
        assert_eq!(h.pools.fetches.load(Ordering::SeqCst), 0);
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_jitter_stops_before_submission() {
        let (transport, _reads) = chain(vec![Fund::Amount(500_000)]);
        let submitter = Arc::new(Recorder::default());
        let pools = StaticPools::new(Some(pools_feed()));
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            config(5),
            transport,
            pools.clone(),
            submitter.clone(),
            cancel.clone(),
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        });
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(pools.fetches.load(Ordering::SeqCst), 0);
        assert!(submitter.calls.lock().unwrap().is_empty());
    }

    /// Fires the token a while after the call is handed over.
    struct CancelAfterSubmit {
        cancel: CancellationToken,
        submits: AtomicUsize,
    }

    #[async_trait]
    impl TxSubmitter for CancelAfterSubmit {
        async fn submit(&self, _call: &FunctionCall) -> Result<Receipt> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                cancel.cancel();
            });
            Ok(Receipt::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_verification_wait_skips_the_verification_read() {
        let (transport, reads) = chain(vec![Fund::Amount(500_000)]);
        let cancel = CancellationToken::new();
        let submitter = Arc::new(CancelAfterSubmit {
            cancel: cancel.clone(),
            submits: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::new(
            config(5),
            transport,
            StaticPools::new(Some(pools_feed())),
            submitter.clone(),
            cancel,
        );
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(submitter.submits.load(Ordering::SeqCst), 1);
        // only the opening fund check went out
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    /// An indexer that never answers; cancels the run shortly after the request starts.
    struct HangingPools {
        cancel: CancellationToken,
    }

    #[async_trait]
    impl PoolSource for HangingPools {
        async fn fetch_pools(&self) -> Result<PoolSnapshot> {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel();
            });
            std::future::pending::<Result<PoolSnapshot>>().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_an_in_flight_pool_fetch() {
        let (transport, _reads) = chain(vec![Fund::Amount(500_000)]);
        let cancel = CancellationToken::new();
        let submitter = Arc::new(Recorder::default());
        let orchestrator = Orchestrator::new(
            config(5),
            transport,
            Arc::new(HangingPools { cancel: cancel.clone() }),
            submitter.clone(),
            cancel,
        );
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(submitter.calls.lock().unwrap().is_empty());
    }
}
