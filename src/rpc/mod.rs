//! NEAR JSON-RPC access: transport, client and node selection.

pub mod client;
pub mod selector;
pub mod transport;

pub use client::{DEFAULT_FINALITY, NodeStatus, RpcClient, RpcRequest, SyncInfo};
pub use selector::{Endpoint, NodeProbe, SelectedNode, probe_endpoint, select_best_node};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};
