//! Per-run circuit breaker with health-gated recovery.
//!
//! Counts consecutive failed phase attempts. Once `failure_threshold` is
//! reached the circuit *opens* and further attempts are refused. After
//! `reset_timeout_seconds` the circuit may move to *half-open*, but only if
//! the [`HealthGate`] agrees the wider system has recovered. A half-open
//! circuit closes after `half_open_max_calls` successes and re-opens on any
//! failure.
//!
//! ```text
//!            failures >= threshold
//!   Closed ─────────────────────────▶ Open
//!     ▲                                │ elapsed >= reset_timeout
//!     │ successes >= half_open_max     │ and health gate passes
//!     │                                ▼
//!     └─────────────────────────── HalfOpen
//!                 any failure ──▶ Open
//! ```
//!
//! Open → HalfOpen is evaluated lazily on every state read; there are no
//! timers. All state lives behind one mutex per breaker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{CircuitCallError, CircuitOpenError, CircuitResult};
use super::stats::CircuitStats;
use crate::clock::{Clock, SystemClock};
use crate::config::{CircuitBreakerConfig, ConfigResult};
use crate::health::{
    AnomalyAlertSource, GateInputs, HealthGate, HealthReport, HealthReportProvider,
};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy, attempts allowed.
    Closed,
    /// Tripped, attempts blocked until cool-down and health gate allow.
    Open,
    /// Trial window: attempts allowed, one failure re-opens.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_time: Option<Instant>,
    half_open_calls: u32,
    total_trips: u64,
    health_blocked_transitions: u64,
    state_entered_at: Instant,
    last_health_report: Option<HealthReport>,
    last_gate_block: Option<String>,
    health_provider: Option<Arc<dyn HealthReportProvider>>,
    anomaly_source: Option<Arc<dyn AnomalyAlertSource>>,
    telemetry_registered: bool,
}

impl BreakerInner {
    fn enter(&mut self, state: CircuitState, now: Instant) {
        self.state = state;
        self.state_entered_at = now;
    }
}

/// Failure-containment state machine for one run.
///
/// Shared as `Arc<CircuitBreaker>`; every operation takes `&self`.
pub struct CircuitBreaker {
    label: String,
    config: CircuitBreakerConfig,
    gate: HealthGate,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker measuring cool-downs with the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a breaker with an injected clock.
    ///
    /// An out-of-range config is replaced by the defaults (with a warning);
    /// use [`CircuitBreaker::try_with_clock`] to reject it instead.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config.validated_or_default(), clock)
    }

    /// Like [`CircuitBreaker::new`], but fails on an out-of-range config.
    pub fn try_new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::try_with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`CircuitBreaker::with_clock`], but fails on an out-of-range config.
    pub fn try_with_clock(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            label: "run".to_string(),
            gate: HealthGate::new(config.health_threshold),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_time: None,
                half_open_calls: 0,
                total_trips: 0,
                health_blocked_transitions: 0,
                state_entered_at: now,
                last_health_report: None,
                last_gate_block: None,
                health_provider: None,
                anomaly_source: None,
                telemetry_registered: false,
            }),
        }
    }

    /// Set the label used in logs and stats (usually the run id).
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, after applying any due Open → HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        self.lock_settled(self.clock.now()).state
    }

    /// Whether an attempt may start (state is not Open).
    pub fn is_available(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Admission check before an attempt.
    ///
    /// Applies the lazy Open → HalfOpen transition, then fails if the
    /// circuit is still open.
    pub fn check_state(&self) -> CircuitResult<()> {
        let now = self.clock.now();
        let inner = self.lock_settled(now);

        if inner.state == CircuitState::Open {
            let err = CircuitOpenError {
                consecutive_failures: inner.consecutive_failures,
                seconds_until_reset: self.seconds_until_reset(&inner, now),
            };
            debug!(
                breaker = %self.label,
                failures = err.consecutive_failures,
                retry_after_secs = err.seconds_until_reset,
                "Attempt refused: circuit open"
            );
            return Err(err);
        }
        Ok(())
    }

    /// Record a successful attempt.
    ///
    /// Applies to the stored state only. A success landing on an open
    /// circuit is ignored even when its cool-down has elapsed.
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    inner.enter(CircuitState::Closed, now);
                    inner.consecutive_failures = 0;
                    inner.last_failure_time = None;
                    inner.half_open_calls = 0;
                    info!(breaker = %self.label, "Circuit closed after successful trial window");
                } else {
                    debug!(
                        breaker = %self.label,
                        half_open_calls = inner.half_open_calls,
                        needed = self.config.half_open_max_calls,
                        "Trial attempt succeeded"
                    );
                }
            }
            CircuitState::Open => {
                debug!(breaker = %self.label, "Success recorded while open; ignored");
            }
        }
    }

    /// Record a failed attempt.
    ///
    /// A failure landing on an open circuit only bumps the counter; the
    /// cool-down keeps running from the trip.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();

        // Keeps counting while open: historical visibility only.
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.trip(&mut inner, now);
                }
            }
            CircuitState::HalfOpen => self.trip(&mut inner, now),
            CircuitState::Open => {
                debug!(
                    breaker = %self.label,
                    failures = inner.consecutive_failures,
                    "Failure recorded while open"
                );
            }
        }
    }

    /// Wire optional telemetry collaborators. Replaces any previous ones.
    pub fn set_health_providers(
        &self,
        health_provider: Option<Arc<dyn HealthReportProvider>>,
        anomaly_source: Option<Arc<dyn AnomalyAlertSource>>,
    ) {
        let mut inner = self.lock();
        if let Some(p) = &health_provider {
            debug!(breaker = %self.label, provider = p.provider_name(), "Health provider registered");
        }
        inner.telemetry_registered |= health_provider.is_some() || anomaly_source.is_some();
        inner.health_provider = health_provider;
        inner.anomaly_source = anomaly_source;
    }

    /// Store the latest health snapshot.
    pub fn update_health_report(&self, report: HealthReport) {
        let mut inner = self.lock();
        debug!(
            breaker = %self.label,
            score = report.overall_score,
            status = %report.overall_status,
            "Health report updated"
        );
        inner.last_health_report = Some(report);
    }

    /// Most recently stored health snapshot.
    pub fn last_health_report(&self) -> Option<HealthReport> {
        self.lock().last_health_report.clone()
    }

    /// Operator reset: force Closed.
    ///
    /// `total_trips` and `health_blocked_transitions` are lifetime counters
    /// and survive.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        let previous = inner.state;
        inner.enter(CircuitState::Closed, now);
        inner.consecutive_failures = 0;
        inner.half_open_calls = 0;
        inner.last_failure_time = None;
        inner.last_gate_block = None;
        info!(breaker = %self.label, from = %previous, "Circuit manually reset");
    }

    /// Run `op` under the breaker: admit, execute, record the outcome.
    pub fn call<T, E, F>(&self, op: F) -> Result<T, CircuitCallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.check_state()?;
        match op() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitCallError::Operation(e))
            }
        }
    }

    /// Read-only snapshot. Does not apply pending transitions.
    ///
    /// `state` is the stored state: an open circuit whose cool-down has
    /// elapsed still reports `open` until the next `state`, `is_available`
    /// or `check_state` call evaluates the health gate.
    pub fn get_stats(&self) -> CircuitStats {
        let now = self.clock.now();
        let inner = self.lock();
        let report = inner.last_health_report.as_ref();
        CircuitStats {
            label: self.label.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_trips: inner.total_trips,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_seconds: self.config.reset_timeout_seconds,
            half_open_max_calls: self.config.half_open_max_calls,
            half_open_calls: inner.half_open_calls,
            time_in_current_state_secs: now
                .saturating_duration_since(inner.state_entered_at)
                .as_secs_f64(),
            health_threshold: self.config.health_threshold,
            health_blocked_transitions: inner.health_blocked_transitions,
            last_health_score: report.and_then(HealthReport::score),
            last_health_status: report.map(|r| r.overall_status),
            last_critical_issue_count: report.map(|r| r.critical_issues.len()),
            last_gate_block: inner.last_gate_block.clone(),
            health_provider: inner
                .health_provider
                .as_ref()
                .map(|p| p.provider_name().to_string()),
            anomaly_source_registered: inner.anomaly_source.is_some(),
        }
    }

    fn trip(&self, inner: &mut BreakerInner, now: Instant) {
        let from = inner.state;
        inner.enter(CircuitState::Open, now);
        inner.total_trips += 1;
        inner.half_open_calls = 0;
        inner.last_failure_time = Some(now);
        info!(
            breaker = %self.label,
            from = %from,
            failures = inner.consecutive_failures,
            total_trips = inner.total_trips,
            cooldown_secs = self.config.reset_timeout_seconds,
            "Circuit opened"
        );
    }

    fn elapsed_since_failure(&self, inner: &BreakerInner, now: Instant) -> Duration {
        inner
            .last_failure_time
            .map_or(Duration::MAX, |t| now.saturating_duration_since(t))
    }

    fn seconds_until_reset(&self, inner: &BreakerInner, now: Instant) -> u64 {
        let remaining = self
            .config
            .reset_timeout()
            .saturating_sub(self.elapsed_since_failure(inner, now));
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    fn cooldown_elapsed(&self, inner: &BreakerInner, now: Instant) -> bool {
        inner.state == CircuitState::Open
            && self.elapsed_since_failure(inner, now) >= self.config.reset_timeout()
    }

    /// Lock the state after applying any due Open → HalfOpen transition.
    ///
    /// The gate runs without the lock held so collaborators may read the
    /// breaker. The verdict is dropped if the circuit re-tripped, closed or
    /// moved to half-open in the meantime.
    fn lock_settled(&self, now: Instant) -> MutexGuard<'_, BreakerInner> {
        let inner = self.lock();
        if !self.cooldown_elapsed(&inner, now) {
            return inner;
        }
        let trips = inner.total_trips;
        let report = inner.last_health_report.clone();
        let anomalies = inner.anomaly_source.clone();
        let telemetry_registered = inner.telemetry_registered;
        drop(inner);

        let verdict = self.gate.evaluate(GateInputs {
            report: report.as_ref(),
            anomalies: anomalies.as_deref(),
            telemetry_registered,
        });

        let mut inner = self.lock();
        if inner.total_trips != trips || !self.cooldown_elapsed(&inner, now) {
            return inner;
        }

        if verdict.passed {
            inner.enter(CircuitState::HalfOpen, now);
            inner.half_open_calls = 0;
            inner.last_gate_block = None;
            info!(
                breaker = %self.label,
                trial_calls = self.config.half_open_max_calls,
                "Circuit half-open: probing recovery"
            );
        } else {
            inner.health_blocked_transitions += 1;
            let summary = verdict.summary();
            warn!(
                breaker = %self.label,
                blocked = inner.health_blocked_transitions,
                reasons = %summary,
                "Health gate kept circuit open"
            );
            inner.last_gate_block = Some(summary);
        }
        inner
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("label", &self.label)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
