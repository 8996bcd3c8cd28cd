//! Autopack Resilience Library
//!
//! Failure containment for long-running autonomous coding runs:
//! - [`CircuitBreaker`]: per-run state machine that halts runaway failure
//!   loops and only resumes after a cool-down corroborated by system health
//! - [`RetryPolicy`]: pure decisions on retrying, diagnostics, and model
//!   escalation after each phase attempt
//! - [`AttemptGovernor`]: the two wired together in the order the phase loop
//!   calls them
//!
//! # Per-attempt contract
//!
//! ```text
//! circuit.check_state()?                     before work; error halts the run
//! circuit.record_success() / record_failure()  after tests/audit
//! policy.next_attempt_state(ctx, status)     retry? diagnostics? escalate?
//! ```
//!
//! Nothing here performs I/O or sleeps. Health telemetry is pushed in by the
//! caller ([`CircuitBreaker::update_health_report`]) and anomaly alerts are
//! only peeked.

#![allow(clippy::uninlined_format_args)]

pub mod circuit;
pub mod clock;
pub mod config;
pub mod governor;
pub mod health;
pub mod retry;

// Re-export circuit breaker types
pub use circuit::{
    BreakerRegistry, CircuitBreaker, CircuitCallError, CircuitOpenError, CircuitResult,
    CircuitState, CircuitStats, SharedCircuitBreaker,
};

// Re-export clock types
pub use clock::{Clock, ManualClock, SystemClock};

// Re-export configuration types
pub use config::{CircuitBreakerConfig, ConfigError, ConfigResult, ResilienceConfig, RetryConfig};

// Re-export governor
pub use governor::AttemptGovernor;

// Re-export health telemetry types
pub use health::{
    AlertQueue, AlertSeverity, AnomalyAlert, AnomalyAlertSource, ComponentReport,
    ComponentStatus, GateVerdict, HealthGate, HealthReport, HealthReportProvider,
    HealthSourceError, OverallStatus,
};

// Re-export retry policy types
pub use retry::{
    status, AttemptContext, AttemptDecision, DefaultRetryPolicy, OutcomeClass, RetryPolicy,
};
