//! LLM error types and their transient/permanent classification.

use thiserror::Error;

use crate::worker::WorkerError;

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Whether an error is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("token counting failed: {0}")]
    TokenCount(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited(_)
            | Self::Timeout(_)
            | Self::Unavailable(_)
            | Self::EmptyResponse
            | Self::Malformed(_) => ErrorKind::Transient,
            Self::AuthFailed(_) | Self::InvalidRequest(_) | Self::TokenCount(_) => {
                ErrorKind::Permanent
            }
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<WorkerError> for LlmError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::RateLimited(msg) => Self::RateLimited(msg),
            WorkerError::Timeout(secs) => Self::Timeout(format!("no response after {}s", secs)),
            WorkerError::AuthFailed(msg) => Self::AuthFailed(msg),
            WorkerError::InvalidRequest(msg) | WorkerError::MethodNotFound(msg) => {
                Self::InvalidRequest(msg)
            }
            WorkerError::DeserializeFailed(e) => Self::Malformed(e.to_string()),
            WorkerError::SerializeFailed(e) => Self::InvalidRequest(e.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}
