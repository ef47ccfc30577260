use anyhow::Result;
use buyback_runner::{
    buyback::{BuybackReport, Orchestrator},
    config::{AppConfig, SubmitMode},
    dex::IndexerClient,
    errors::AppError,
    executor::{DryRunSubmitter, NearCliSubmitter, TxSubmitter},
    rpc::{HttpTransport, ReqwestTransport},
    utils,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = AppConfig::load()?;
    tracing::info!(
        network = ?config.network,
        endpoints = config.rpc_urls.len(),
        contract = %config.buyback_contract,
        pool_one = config.pool_one,
        pool_two = config.pool_two,
        max_attempts = config.retry.max_attempts,
        submit_mode = ?config.submit_mode,
        "[INIT] buyback-runner starting"
    );

    // Operator shutdown: abort the current sleep or call instead of waiting it out
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("[INIT] shutdown requested");
                cancel.cancel();
            }
        });
    }

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
    let pools = Arc::new(IndexerClient::new(
        transport.clone(),
        &config.indexer_url,
        config.retry.indexer_timeout,
    ));
    let submitter: Arc<dyn TxSubmitter> = match config.submit_mode {
        SubmitMode::NearCli => Arc::new(NearCliSubmitter::new(
            &config.near_cli_bin,
            &config.signer_account_id,
            config.retry.submit_timeout,
        )),
        SubmitMode::DryRun => Arc::new(DryRunSubmitter),
    };
    let orchestrator = Orchestrator::new(config, transport, pools, submitter, cancel);

    let started = Instant::now();
    let code = match orchestrator.run().await {
        Ok(report) => {
            log_report(&report);
            report.outcome.exit_code()
        }
        Err(AppError::Cancelled) => {
            tracing::warn!("[BUYBACK] cancelled by operator");
            130
        }
        Err(e) => {
            tracing::error!(error = %e, class = ?e.class(), "[BUYBACK] run failed");
            1
        }
    };
    tracing::info!(
        elapsed_secs = started.elapsed().as_secs(),
        exit_code = code,
        "[BUYBACK] buyback end"
    );
    std::process::exit(code);
}

fn log_report(report: &BuybackReport) {
    for attempt in &report.attempts {
        let actions = serde_json::to_string(&attempt.actions).unwrap_or_default();
        tracing::info!(
            attempt = attempt.number,
            jitter_bound_secs = attempt.jitter_bound_secs,
            fund_amount = ?attempt.fund_amount,
            submitted = attempt.submitted,
            outcome = ?attempt.outcome,
            actions = %actions,
            "[BUYBACK] attempt summary"
        );
    }
    tracing::info!(
        outcome = ?report.outcome,
        submissions = report.submissions(),
        "[BUYBACK] final report"
    );
}
