//! Health gate: the extra condition an open circuit must satisfy before
//! it may probe recovery.
//!
//! ```text
//! no telemetry registered and no report ever seen → pass
//! latest report:
//!   overall_status == ATTENTION_REQUIRED          → block
//!   overall_score  <  health_threshold            → block
//!   >= 2 components DEGRADING                     → block
//! anomaly source (peeked, never drained):
//!   >= 1 pending CRITICAL alert                   → block
//! ```
//!
//! Unusable data (non-finite score, collaborator error) skips the affected
//! check instead of blocking.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::source::AnomalyAlertSource;
use super::types::{HealthReport, OverallStatus};

/// Number of degrading components that blocks recovery.
pub const DEGRADING_COMPONENT_LIMIT: usize = 2;

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub passed: bool,
    /// Why the gate blocked, in evaluation order. Empty when passed.
    pub reasons: Vec<String>,
}

impl GateVerdict {
    fn pass() -> Self {
        Self {
            passed: true,
            reasons: Vec::new(),
        }
    }

    /// Reasons joined for a single log field.
    pub fn summary(&self) -> String {
        self.reasons.join("; ")
    }
}

/// What the gate looks at.
#[derive(Clone, Copy, Default)]
pub struct GateInputs<'a> {
    /// Most recently pushed report
    pub report: Option<&'a HealthReport>,
    /// Registered anomaly source
    pub anomalies: Option<&'a dyn AnomalyAlertSource>,
    /// Whether any health provider or anomaly source was ever registered
    pub telemetry_registered: bool,
}

/// Gate parameterised by the minimum acceptable health score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthGate {
    health_threshold: f64,
}

impl HealthGate {
    pub fn new(health_threshold: f64) -> Self {
        Self { health_threshold }
    }

    pub fn health_threshold(&self) -> f64 {
        self.health_threshold
    }

    /// Evaluate every check and collect the blocking reasons.
    pub fn evaluate(&self, inputs: GateInputs<'_>) -> GateVerdict {
        if !inputs.telemetry_registered && inputs.report.is_none() {
            return GateVerdict::pass();
        }

        let mut reasons = Vec::new();

        if let Some(report) = inputs.report {
            self.check_report(report, &mut reasons);
        }

        if let Some(source) = inputs.anomalies {
            match source.pending_alerts(false) {
                Ok(alerts) => {
                    let critical = alerts.iter().filter(|a| a.is_critical()).count();
                    if critical > 0 {
                        reasons.push(format!("{} critical anomaly alert(s) pending", critical));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Anomaly source failed during health gate; skipping check");
                }
            }
        }

        GateVerdict {
            passed: reasons.is_empty(),
            reasons,
        }
    }

    fn check_report(&self, report: &HealthReport, reasons: &mut Vec<String>) {
        if report.overall_status == OverallStatus::AttentionRequired {
            let detail = match report.critical_issues.len() {
                0 => String::new(),
                n => format!(" ({} critical issue(s))", n),
            };
            reasons.push(format!("overall status is {}{}", report.overall_status, detail));
        }

        match report.score() {
            Some(score) if score < self.health_threshold => {
                reasons.push(format!(
                    "health score {:.2} below threshold {:.2}",
                    score, self.health_threshold
                ));
            }
            Some(_) => {}
            None => {
                warn!(
                    score = report.overall_score,
                    "Health report score is not a number; skipping score check"
                );
            }
        }

        let degrading = report.degrading_components();
        if degrading.len() >= DEGRADING_COMPONENT_LIMIT {
            reasons.push(format!(
                "{} components degrading ({})",
                degrading.len(),
                degrading.join(", ")
            ));
        }
    }
}
