//! Endpoint probing and best-node selection.

use crate::errors::{AppError, Result};
use crate::rpc::client::RpcClient;
use crate::rpc::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A candidate has to beat the running best by more than this many blocks.
pub const HEIGHT_MARGIN: u64 = 10;

/// Result of pinging one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeProbe {
    pub latest_height: u64,
    pub syncing: bool,
}

impl NodeProbe {
    /// What a failed probe reports: never selectable.
    pub fn unusable() -> Self {
        Self {
            latest_height: 0,
            syncing: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub probe: NodeProbe,
}

/// The endpoint chosen for this pass together with a client bound to it.
#[derive(Clone)]
pub struct SelectedNode {
    pub endpoint: Endpoint,
    pub client: RpcClient,
}

/// Ping one endpoint. Failures are absorbed into [`NodeProbe::unusable`].
pub async fn probe_endpoint(client: &RpcClient) -> NodeProbe {
    match client.get_status().await {
        Ok(status) => NodeProbe {
            latest_height: status.sync_info.latest_block_height,
            syncing: status.sync_info.syncing,
        },
        Err(e) => {
            warn!(addr = %client.addr(), error = %e, "[RPC] probe failed, endpoint unusable");
            NodeProbe::unusable()
        }
    }
}

/// Whether `probe` should displace a running best at `best_height`.
pub fn beats(probe: &NodeProbe, best_height: u64) -> bool {
    !probe.syncing && probe.latest_height > best_height.saturating_add(HEIGHT_MARGIN)
}

/// Probe `urls` in order and keep the first endpoint to clear the height margin.
pub async fn select_best_node(
    transport: Arc<dyn HttpTransport>,
    urls: &[String],
    timeout: Duration,
) -> Result<SelectedNode> {
    let mut best: Option<SelectedNode> = None;
    let mut best_height = 0u64;

    for url in urls {
        let client = RpcClient::new(transport.clone(), url.clone(), timeout);
        let probe = probe_endpoint(&client).await;
        info!(
            addr = %url,
            height = probe.latest_height,
            syncing = probe.syncing,
            "[RPC] probed endpoint"
        );
        if beats(&probe, best_height) {
            best_height = probe.latest_height;
            best = Some(SelectedNode {
                endpoint: Endpoint {
                    url: url.clone(),
                    probe,
                },
                client,
            });
        }
    }

    match best {
        Some(node) => {
            info!(addr = %node.endpoint.url, height = best_height, "[RPC] chose node");
            Ok(node)
        }
        None => Err(AppError::NoAvailableEndpoint {
            candidates: urls.len(),
        }),
    }
}
