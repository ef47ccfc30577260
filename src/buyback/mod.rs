//! Buyback route planning and the execution state machine.

pub mod orchestrator;
pub mod planner;
pub mod types;

pub use orchestrator::{FUND_METHOD, Orchestrator, parse_fund_amount};
pub use planner::{Route, build_actions};
pub use types::{AttemptOutcome, BuybackAttempt, BuybackOutcome, BuybackReport, SwapAction};
