//! Saga error types.

use domain::DomainError;
use thiserror::Error;

use crate::state::ProcessState;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The process is in a state that does not allow the requested transition.
    #[error("Invalid operation: cannot {action} from {}", state_label(.from))]
    InvalidOperation {
        from: Option<ProcessState>,
        action: &'static str,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

fn state_label(state: &Option<ProcessState>) -> &'static str {
    state.map(|s| s.as_str()).unwrap_or("no process")
}

impl SagaError {
    /// Returns true for transient failures the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SagaError::Domain(e) if e.is_retryable())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
