//! Attempt context, decision, and outcome status vocabulary.

use serde::{Deserialize, Serialize};

/// Outcome statuses reported by the phase loop.
///
/// The vocabulary is open: any string is accepted. Only [`COMPLETE`] and
/// [`TOKEN_ESCALATION`] are treated specially; everything else is a failure.
pub mod status {
    /// Phase finished and passed validation
    pub const COMPLETE: &str = "COMPLETE";
    /// Attempt ran out of token budget and needs a larger tier
    pub const TOKEN_ESCALATION: &str = "TOKEN_ESCALATION";
    /// Generic failure
    pub const FAILED: &str = "FAILED";
    pub const BUILD_FAILED: &str = "BUILD_FAILED";
    pub const CI_FAILED: &str = "CI_FAILED";
    pub const AUDITOR_REJECTED: &str = "AUDITOR_REJECTED";
    pub const BUDGET_EXCEEDED: &str = "BUDGET_EXCEEDED";
}

/// How the retry policy buckets an outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    Complete,
    TokenEscalation,
    Failure,
}

impl OutcomeClass {
    /// Bucket a status string. Matching is exact.
    pub fn classify(status: &str) -> Self {
        match status {
            status::COMPLETE => Self::Complete,
            status::TOKEN_ESCALATION => Self::TokenEscalation,
            _ => Self::Failure,
        }
    }
}

/// Where a phase is in its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptContext {
    /// Zero-based index of the attempt just finished
    pub attempt_index: u32,
    /// Attempts allowed. Values <= 0 are a degenerate "halt" configuration.
    pub max_attempts: i32,
    /// Reserved for tiered escalation; carried through unchanged
    #[serde(default)]
    pub escalation_level: u32,
}

impl AttemptContext {
    pub fn new(attempt_index: u32, max_attempts: i32) -> Self {
        Self {
            attempt_index,
            max_attempts,
            escalation_level: 0,
        }
    }

    /// Context for the first attempt of a phase.
    pub fn first(max_attempts: i32) -> Self {
        Self::new(0, max_attempts)
    }

    pub fn with_escalation_level(mut self, escalation_level: u32) -> Self {
        self.escalation_level = escalation_level;
        self
    }

    /// Whether the attempt budget is already spent.
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts <= 0 || i64::from(self.attempt_index) >= i64::from(self.max_attempts)
    }

    /// Context for the attempt a decision schedules, if any.
    pub fn advance(&self, decision: &AttemptDecision) -> Option<Self> {
        if decision.terminal {
            return None;
        }
        decision.next_retry_attempt.map(|next| Self {
            attempt_index: next,
            ..*self
        })
    }
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AttemptDecision {
    /// Index of the next attempt, when a retry is scheduled
    pub next_retry_attempt: Option<u32>,
    /// Run the (expensive) diagnostics step before retrying
    pub should_run_diagnostics: bool,
    /// Move to a larger model/resource tier
    pub should_escalate_model: bool,
    /// No further attempts for this phase
    pub terminal: bool,
}

impl AttemptDecision {
    /// Terminal decision with no follow-up work.
    pub fn halt() -> Self {
        Self {
            terminal: true,
            ..Self::default()
        }
    }

    /// Whether the loop should start another attempt.
    pub fn should_retry(&self) -> bool {
        !self.terminal && self.next_retry_attempt.is_some()
    }
}
