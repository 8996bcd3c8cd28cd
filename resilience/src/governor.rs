//! Attempt governor: the per-attempt contract between the phase loop and
//! the resilience core.
//!
//! ```text
//! governor.admit()?                          // CircuitOpenError halts the run
//! let outcome = run_phase_attempt(..);       // external
//! let decision = governor.settle(&ctx, outcome.status, outcome.validated);
//! if decision.should_run_diagnostics { .. }  // external
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::circuit::{CircuitBreaker, CircuitResult};
use crate::retry::{AttemptContext, AttemptDecision, DefaultRetryPolicy, RetryPolicy};

/// One run's breaker paired with the retry policy in force.
#[derive(Clone)]
pub struct AttemptGovernor {
    breaker: Arc<CircuitBreaker>,
    policy: Arc<dyn RetryPolicy>,
}

impl AttemptGovernor {
    pub fn new(breaker: Arc<CircuitBreaker>, policy: Arc<dyn RetryPolicy>) -> Self {
        Self { breaker, policy }
    }

    /// Governor using [`DefaultRetryPolicy`].
    pub fn with_default_policy(breaker: Arc<CircuitBreaker>) -> Self {
        Self::new(breaker, Arc::new(DefaultRetryPolicy))
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.policy
    }

    /// Gate before starting an attempt.
    pub fn admit(&self) -> CircuitResult<()> {
        self.breaker.check_state()
    }

    /// Record an attempt's validated outcome and decide what comes next.
    ///
    /// `validation_passed` is the verdict of the attempt's own tests/audit;
    /// it drives the breaker. `status` drives the retry decision.
    pub fn settle(
        &self,
        ctx: &AttemptContext,
        status: &str,
        validation_passed: bool,
    ) -> AttemptDecision {
        if validation_passed {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure();
        }

        let decision = self.policy.next_attempt_state(ctx, status);
        debug!(
            breaker = %self.breaker.label(),
            attempt = ctx.attempt_index,
            max_attempts = ctx.max_attempts,
            status,
            validation_passed,
            next = ?decision.next_retry_attempt,
            diagnostics = decision.should_run_diagnostics,
            escalate = decision.should_escalate_model,
            terminal = decision.terminal,
            "Attempt settled"
        );
        decision
    }

    /// Model the policy wants for the next attempt, if any.
    pub fn model_override(&self, ctx: &AttemptContext) -> Option<String> {
        self.policy.choose_model_for_attempt(ctx)
    }
}

impl std::fmt::Debug for AttemptGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptGovernor")
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitState;
    use crate::clock::ManualClock;
    use crate::config::CircuitBreakerConfig;
    use crate::retry::status;

    fn governor(threshold: u32) -> AttemptGovernor {
        let config = CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout_seconds: 60,
            ..Default::default()
        };
        let breaker = CircuitBreaker::with_clock(config, Arc::new(ManualClock::new()));
        AttemptGovernor::with_default_policy(Arc::new(breaker))
    }

    #[test]
    fn test_failed_attempts_trip_breaker() {
        let gov = governor(2);
        let mut ctx = AttemptContext::first(5);

        assert!(gov.admit().is_ok());
        let d = gov.settle(&ctx, status::BUILD_FAILED, false);
        assert!(d.should_retry());
        assert!(d.should_run_diagnostics);
        ctx = ctx.advance(&d).unwrap();

        assert!(gov.admit().is_ok());
        let d = gov.settle(&ctx, status::CI_FAILED, false);
        assert!(d.should_retry());

        let err = gov.admit().unwrap_err();
        assert_eq!(err.consecutive_failures, 2);
        assert_eq!(gov.breaker().state(), CircuitState::Open);
    }

    #[test]
    fn test_complete_attempt_settles_terminal() {
        let gov = governor(2);
        let ctx = AttemptContext::first(3);
        let d = gov.settle(&ctx, status::COMPLETE, true);
        assert!(d.terminal);
        assert!(!d.should_retry());
        assert_eq!(gov.breaker().get_stats().consecutive_failures, 0);
    }

    #[test]
    fn test_escalation_skips_diagnostics() {
        let gov = governor(3);
        let d = gov.settle(&AttemptContext::first(3), status::TOKEN_ESCALATION, false);
        assert!(d.should_escalate_model);
        assert!(!d.should_run_diagnostics);
        assert_eq!(gov.model_override(&AttemptContext::first(3)), None);
    }
}
