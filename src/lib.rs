//! Core library for the buyback-runner project.
//!
//! Reads the buyback contract's available fund through a health-checked NEAR RPC
//! endpoint, sizes a two-pool swap route from the exchange indexer, and submits
//! it with bounded, cancellable retries.

pub mod buyback;
pub mod config;
pub mod dex;
pub mod errors;
pub mod executor;
pub mod rpc;
pub mod utils;
