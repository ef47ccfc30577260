//! Miscellaneous helper utilities.

use crate::errors::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level. Timestamps stay on since
/// output usually lands in a cron log.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// The token is checked before and after the wait as well, so a cancellation that
/// lands between two suspension points is never missed.
pub async fn sleep_cancellable(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        _ = tokio::time::sleep(duration) => {}
    }
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

/// Drive `fut` to completion unless `cancel` fires first.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        res = fut => res,
    }
}
