//! Circuit breaker error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The circuit is open: the run must not start another attempt yet.
///
/// Expected and recoverable by waiting. Reaching the run controller means
/// the run halts early, which is the intended safety outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error(
    "circuit breaker tripped after {consecutive_failures} consecutive failures, retry after {seconds_until_reset} seconds"
)]
pub struct CircuitOpenError {
    pub consecutive_failures: u32,
    /// Remaining cool-down, rounded up. Zero when the cool-down elapsed but
    /// the health gate kept the circuit open.
    pub seconds_until_reset: u64,
}

/// Result type alias for admission checks
pub type CircuitResult<T> = Result<T, CircuitOpenError>;

/// Error from [`CircuitBreaker::call`](super::CircuitBreaker::call).
#[derive(Debug, Error)]
pub enum CircuitCallError<E> {
    /// Operation was not attempted
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// Operation ran and failed; the failure was recorded
    #[error("guarded operation failed: {0}")]
    Operation(E),
}

impl<E> CircuitCallError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// The operation's own error, if it ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Open(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_message() {
        let err = CircuitOpenError {
            consecutive_failures: 3,
            seconds_until_reset: 42,
        };
        assert_eq!(
            err.to_string(),
            "circuit breaker tripped after 3 consecutive failures, retry after 42 seconds"
        );
    }

    #[test]
    fn test_call_error_variants() {
        let open: CircuitCallError<String> = CircuitOpenError {
            consecutive_failures: 1,
            seconds_until_reset: 0,
        }
        .into();
        assert!(open.is_open());
        assert!(open.into_operation().is_none());

        let op: CircuitCallError<String> = CircuitCallError::Operation("boom".to_string());
        assert_eq!(op.to_string(), "guarded operation failed: boom");
        assert_eq!(op.into_operation().as_deref(), Some("boom"));
    }
}
