use crate::dex::state::PoolSnapshot;
use crate::errors::{AppError, Result};
use crate::rpc::transport::HttpTransport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Read-only source of pool snapshots.
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn fetch_pools(&self) -> Result<PoolSnapshot>;
}

/// Pool list served by the exchange indexer over plain HTTP GET.
#[derive(Clone)]
pub struct IndexerClient {
    transport: Arc<dyn HttpTransport>,
    url: String,
    timeout: Duration,
}

impl IndexerClient {
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PoolSource for IndexerClient {
    async fn fetch_pools(&self) -> Result<PoolSnapshot> {
        let reply = self.transport.get(&self.url, self.timeout).await?;
        if !reply.is_success() {
            // The indexer is not the RPC layer; a bad status here is worth another try.
            return Err(AppError::TransientNetwork(format!(
                "indexer returned HTTP {}",
                reply.status
            )));
        }
        let feed = serde_json::from_str(&reply.body)
            .map_err(|e| AppError::malformed(format!("indexer body: {e}")))?;
        let snapshot = PoolSnapshot::from_feed(feed)?;
        info!(url = %self.url, pools = snapshot.len(), "[INDEXER] fetched pool snapshot");
        Ok(snapshot)
    }
}
