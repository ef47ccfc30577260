//! Exchange pool data: snapshots, the indexer feed and swap sizing.

pub mod calc;
pub mod client;
pub mod state;

pub use calc::{decimal_mult, get_token_flow_ratio, min_amount_out, swap_output};
pub use client::{IndexerClient, PoolSource};
pub use state::{OrientedPool, Pool, PoolSnapshot};
