//! Retry policy: deterministic decisions after each phase attempt.
//!
//! Pure functions of `(AttemptContext, status)`. No state, no locks; safe
//! to call from any number of threads.
//!
//! ```text
//! max_attempts <= 0                → halt
//! attempt_index >= max_attempts    → halt
//! status == COMPLETE               → halt
//! otherwise                        → retry at attempt_index + 1
//!                                    diagnostics unless TOKEN_ESCALATION
//!                                    escalate iff TOKEN_ESCALATION
//!                                    terminal iff next >= max_attempts
//! ```

use super::types::{AttemptContext, AttemptDecision, OutcomeClass};

/// Whether the outcome asks for a larger model tier.
pub fn should_escalate(status: &str) -> bool {
    OutcomeClass::classify(status) == OutcomeClass::TokenEscalation
}

/// Whether the outcome warrants diagnostics.
///
/// True for unrecognized statuses: unknown failure modes get investigated.
pub fn should_run_diagnostics(status: &str) -> bool {
    OutcomeClass::classify(status) == OutcomeClass::Failure
}

/// Decide the next step for a phase.
pub fn next_attempt_state(ctx: &AttemptContext, status: &str) -> AttemptDecision {
    if ctx.is_exhausted() {
        return AttemptDecision::halt();
    }
    if OutcomeClass::classify(status) == OutcomeClass::Complete {
        return AttemptDecision::halt();
    }

    let next = ctx.attempt_index.saturating_add(1);
    AttemptDecision {
        next_retry_attempt: Some(next),
        should_run_diagnostics: should_run_diagnostics(status),
        should_escalate_model: should_escalate(status),
        terminal: i64::from(next) >= i64::from(ctx.max_attempts),
    }
}

/// Retry policy seam used by the orchestration loop.
///
/// Every method has the base behaviour as its default; implementors
/// override only what they change.
pub trait RetryPolicy: Send + Sync {
    fn should_escalate(&self, status: &str) -> bool {
        should_escalate(status)
    }

    fn should_run_diagnostics(&self, status: &str) -> bool {
        should_run_diagnostics(status)
    }

    fn next_attempt_state(&self, ctx: &AttemptContext, status: &str) -> AttemptDecision {
        next_attempt_state(ctx, status)
    }

    /// Model to force for the next attempt. `None` means no opinion.
    fn choose_model_for_attempt(&self, _ctx: &AttemptContext) -> Option<String> {
        None
    }
}

/// The base policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {}
