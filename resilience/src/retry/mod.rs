//! Retry and escalation decisions for phase attempts.

pub mod policy;
pub mod types;

pub use policy::{
    next_attempt_state, should_escalate, should_run_diagnostics, DefaultRetryPolicy, RetryPolicy,
};
pub use types::{status, AttemptContext, AttemptDecision, OutcomeClass};
