//! Table-driven tests for the retry policy
//!
//! Covers every branch of `next_attempt_state` across budgets, attempt
//! indices, and the outcome vocabulary (known and unknown statuses).

use autopack_resilience::retry::{next_attempt_state, should_escalate, should_run_diagnostics};
use autopack_resilience::{
    status, AttemptContext, AttemptDecision, DefaultRetryPolicy, RetryPolicy,
};

const FAILURE_STATUSES: &[&str] = &[
    status::FAILED,
    status::BUILD_FAILED,
    status::CI_FAILED,
    status::AUDITOR_REJECTED,
    status::BUDGET_EXCEEDED,
    "PATCH_APPLY_FAILED",
    "",
    "complete",
];

fn retry(next: u32, diagnostics: bool, escalate: bool, terminal: bool) -> AttemptDecision {
    AttemptDecision {
        next_retry_attempt: Some(next),
        should_run_diagnostics: diagnostics,
        should_escalate_model: escalate,
        terminal,
    }
}

#[test]
fn test_decision_table() {
    let cases: [(u32, i32, &str, AttemptDecision); 12] = [
        // degenerate budgets
        (0, 0, status::FAILED, AttemptDecision::halt()),
        (0, -2, status::TOKEN_ESCALATION, AttemptDecision::halt()),
        // already exhausted
        (3, 3, status::FAILED, AttemptDecision::halt()),
        (9, 3, status::TOKEN_ESCALATION, AttemptDecision::halt()),
        // success
        (0, 3, status::COMPLETE, AttemptDecision::halt()),
        (2, 3, status::COMPLETE, AttemptDecision::halt()),
        // failures
        (0, 3, status::FAILED, retry(1, true, false, false)),
        (1, 3, status::CI_FAILED, retry(2, true, false, false)),
        (2, 3, status::FAILED, retry(3, true, false, true)),
        (0, 1, "UNHEARD_OF", retry(1, true, false, true)),
        // escalation
        (0, 3, status::TOKEN_ESCALATION, retry(1, false, true, false)),
        (2, 3, status::TOKEN_ESCALATION, retry(3, false, true, true)),
    ];

    for (attempt_index, max_attempts, st, expected) in cases {
        let ctx = AttemptContext::new(attempt_index, max_attempts);
        assert_eq!(
            next_attempt_state(&ctx, st),
            expected,
            "attempt_index={} max_attempts={} status={:?}",
            attempt_index,
            max_attempts,
            st
        );
    }
}

#[test]
fn test_terminal_iff_budget_spent_or_complete() {
    let mut statuses: Vec<&str> = FAILURE_STATUSES.to_vec();
    statuses.push(status::COMPLETE);
    statuses.push(status::TOKEN_ESCALATION);

    for max_attempts in -2..=5i32 {
        for attempt_index in 0..=6u32 {
            for &st in &statuses {
                let ctx = AttemptContext::new(attempt_index, max_attempts);
                let d = next_attempt_state(&ctx, st);
                let halted = max_attempts <= 0
                    || i64::from(attempt_index) >= i64::from(max_attempts)
                    || st == status::COMPLETE;

                if halted {
                    assert_eq!(d, AttemptDecision::halt(), "{:?} {}", ctx, st);
                } else {
                    assert_eq!(d.next_retry_attempt, Some(attempt_index + 1));
                    assert_eq!(
                        d.terminal,
                        i64::from(attempt_index + 1) >= i64::from(max_attempts)
                    );
                }
            }
        }
    }
}

#[test]
fn test_diagnostics_and_escalation_vocabulary() {
    for &st in FAILURE_STATUSES {
        assert!(should_run_diagnostics(st), "{:?} should run diagnostics", st);
        assert!(!should_escalate(st), "{:?} should not escalate", st);
    }
    assert!(!should_run_diagnostics(status::COMPLETE));
    assert!(!should_escalate(status::COMPLETE));
    assert!(!should_run_diagnostics(status::TOKEN_ESCALATION));
    assert!(should_escalate(status::TOKEN_ESCALATION));
}

#[test]
fn test_escalation_level_passes_through() {
    let ctx = AttemptContext::new(0, 4).with_escalation_level(3);
    let d = next_attempt_state(&ctx, status::TOKEN_ESCALATION);
    let next = ctx.advance(&d).unwrap();
    assert_eq!(next.escalation_level, 3);
    assert_eq!(next.attempt_index, 1);
}

#[test]
fn test_full_retry_loop_runs_to_budget() {
    let policy = DefaultRetryPolicy;
    let mut ctx = AttemptContext::first(4);
    let mut attempts = 1;
    let mut diagnostics_runs = 0;

    loop {
        let d = policy.next_attempt_state(&ctx, status::BUILD_FAILED);
        if d.should_run_diagnostics {
            diagnostics_runs += 1;
        }
        match ctx.advance(&d) {
            Some(next) => {
                ctx = next;
                attempts += 1;
            }
            None => break,
        }
    }

    assert_eq!(attempts, 4);
    assert_eq!(diagnostics_runs, 4);
}

#[test]
fn test_policy_callable_across_threads() {
    let policy = DefaultRetryPolicy;
    std::thread::scope(|s| {
        for i in 0..8u32 {
            let policy = &policy;
            s.spawn(move || {
                let d = policy.next_attempt_state(&AttemptContext::new(i % 3, 3), status::FAILED);
                assert_eq!(d.next_retry_attempt, Some(i % 3 + 1));
            });
        }
    });
}
