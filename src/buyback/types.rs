use serde::Serialize;

/// One leg of the swap route, in the exchange's action format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapAction {
    /// Pool which should be used for swapping.
    pub pool_id: u64,
    pub token_in: String,
    /// `None` chains the previous leg's actual output into this one.
    pub amount_in: Option<String>,
    pub token_out: String,
    /// Required minimum amount of `token_out`.
    pub min_amount_out: String,
}

/// How a single pass through the state machine ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The fund read at the start of the pass was empty.
    NotFunded,
    /// No usable route; nothing was submitted.
    NoViableRoute,
    /// Submitted, and the verification read still showed funds.
    Executed,
    /// Submitted, and the verification read showed the fund drained.
    Verified,
    /// A generic failure interrupted the pass.
    Failed,
    /// Funds remained but no attempts were left.
    Exhausted,
}

/// Audit record of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuybackAttempt {
    pub number: u32,
    pub jitter_bound_secs: u64,
    pub fund_amount: Option<u128>,
    pub actions: Vec<SwapAction>,
    /// Whether the action list was handed to the submitter.
    pub submitted: bool,
    pub outcome: AttemptOutcome,
}

impl BuybackAttempt {
    pub fn new(number: u32, jitter_bound_secs: u64) -> Self {
        Self {
            number,
            jitter_bound_secs,
            fund_amount: None,
            actions: Vec::new(),
            submitted: false,
            outcome: AttemptOutcome::Failed,
        }
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuybackOutcome {
    NotFunded,
    NoViableRoute,
    Verified,
    AttemptsExhausted { attempts: u32, remaining: u128 },
}

impl BuybackOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuybackOutcome::AttemptsExhausted { .. } => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuybackReport {
    pub outcome: BuybackOutcome,
    pub attempts: Vec<BuybackAttempt>,
}

impl BuybackReport {
    pub fn submissions(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.submitted)
            .count()
    }
}
