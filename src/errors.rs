use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No available endpoint among {candidates} candidate(s)")]
    NoAvailableEndpoint { candidates: usize },

    #[error("RPC protocol error (code {code:?}): {message}")]
    RpcProtocol { code: Option<i64>, message: String },

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// How the orchestrator reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The endpoint rejected the call; abort the run without retrying.
    Protocol,
    /// Nothing left to try in this run (no endpoint, bad config).
    Fatal,
    /// Goes through the single wait-and-recheck path.
    Generic,
    Cancelled,
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::RpcProtocol { .. } => ErrorClass::Protocol,
            AppError::NoAvailableEndpoint { .. } | AppError::Config(_) => ErrorClass::Fatal,
            AppError::Cancelled => ErrorClass::Cancelled,
            AppError::TransientNetwork(_)
            | AppError::MalformedResponse(_)
            | AppError::Submission(_)
            | AppError::Io(_)
            | AppError::SerdeJson(_) => ErrorClass::Generic,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        AppError::RpcProtocol {
            code: None,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::MalformedResponse(message.into())
    }
}
