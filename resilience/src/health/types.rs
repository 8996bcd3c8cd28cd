//! Health report and anomaly alert shapes consumed by the breaker.
//!
//! These are produced by the external telemetry pipeline. Missing or
//! unusable data is represented explicitly (`Option`, non-finite scores
//! filtered by [`HealthReport::score`]) rather than probed for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate status of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    /// Nothing needs attention
    Nominal,
    /// Telemetry flagged at least one problem an operator should look at
    AttentionRequired,
    /// Not enough samples to judge
    InsufficientData,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nominal => write!(f, "NOMINAL"),
            Self::AttentionRequired => write!(f, "ATTENTION_REQUIRED"),
            Self::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

/// Trend of a single telemetry component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    Improving,
    Stable,
    Degrading,
    InsufficientData,
}

/// Per-component entry of a [`HealthReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: ComponentStatus,
    pub score: f64,
}

/// Snapshot of system health pushed by the telemetry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall score, nominally 0.0–1.0
    pub overall_score: f64,
    pub overall_status: OverallStatus,
    /// Ordered list of issues flagged as critical
    #[serde(default)]
    pub critical_issues: Vec<String>,
    /// Component name → component report
    #[serde(default)]
    pub component_reports: BTreeMap<String, ComponentReport>,
}

impl HealthReport {
    /// Create a report with no components or issues.
    pub fn new(overall_score: f64, overall_status: OverallStatus) -> Self {
        Self {
            overall_score,
            overall_status,
            critical_issues: Vec::new(),
            component_reports: BTreeMap::new(),
        }
    }

    /// Nominal report with the given score.
    pub fn nominal(overall_score: f64) -> Self {
        Self::new(overall_score, OverallStatus::Nominal)
    }

    /// Add a component entry.
    pub fn with_component(
        mut self,
        name: impl Into<String>,
        status: ComponentStatus,
        score: f64,
    ) -> Self {
        self.component_reports
            .insert(name.into(), ComponentReport { status, score });
        self
    }

    /// Append a critical issue.
    pub fn with_critical_issue(mut self, issue: impl Into<String>) -> Self {
        self.critical_issues.push(issue.into());
        self
    }

    /// Overall score, or `None` when the value is not a usable number.
    pub fn score(&self) -> Option<f64> {
        self.overall_score.is_finite().then_some(self.overall_score)
    }

    /// Names of components currently degrading, in name order.
    pub fn degrading_components(&self) -> Vec<&str> {
        self.component_reports
            .iter()
            .filter(|(_, r)| r.status == ComponentStatus::Degrading)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Severity of an anomaly alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A single alert raised by the anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub severity: AlertSeverity,
    /// Metric that tripped the detector (e.g. "token_spend_rate")
    pub metric: String,
    /// Human-readable description
    pub message: String,
    pub observed_at: DateTime<Utc>,
}

impl AnomalyAlert {
    /// Create an alert observed now.
    pub fn new(
        severity: AlertSeverity,
        metric: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            metric: metric.into(),
            message: message.into(),
            observed_at: Utc::now(),
        }
    }

    /// Shorthand for a critical alert.
    pub fn critical(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertSeverity::Critical, metric, message)
    }

    pub fn is_critical(&self) -> bool {
        self.severity == AlertSeverity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_filters_non_finite() {
        assert_eq!(HealthReport::nominal(0.7).score(), Some(0.7));
        assert_eq!(HealthReport::nominal(f64::NAN).score(), None);
        assert_eq!(HealthReport::nominal(f64::INFINITY).score(), None);
    }

    #[test]
    fn test_degrading_components_in_name_order() {
        let report = HealthReport::nominal(0.9)
            .with_component("token_usage", ComponentStatus::Degrading, 0.4)
            .with_component("build_success", ComponentStatus::Stable, 0.9)
            .with_component("audit_pass", ComponentStatus::Degrading, 0.3);
        assert_eq!(report.degrading_components(), vec!["audit_pass", "token_usage"]);
    }

    #[test]
    fn test_report_wire_format() {
        let json = serde_json::json!({
            "overall_score": 0.42,
            "overall_status": "ATTENTION_REQUIRED",
            "critical_issues": ["ci failing"],
            "component_reports": {
                "ci": { "status": "DEGRADING", "score": 0.1 }
            }
        });
        let report: HealthReport = serde_json::from_value(json).unwrap();
        assert_eq!(report.overall_status, OverallStatus::AttentionRequired);
        assert_eq!(report.critical_issues, vec!["ci failing".to_string()]);
        assert_eq!(
            report.component_reports["ci"].status,
            ComponentStatus::Degrading
        );
    }

    #[test]
    fn test_report_optional_sections_default() {
        let report: HealthReport = serde_json::from_str(
            r#"{"overall_score": 1.0, "overall_status": "NOMINAL"}"#,
        )
        .unwrap();
        assert!(report.critical_issues.is_empty());
        assert!(report.component_reports.is_empty());
    }

    #[test]
    fn test_alert_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
        assert!(AnomalyAlert::critical("cost", "spend spike").is_critical());
        assert!(!AnomalyAlert::new(AlertSeverity::Warning, "cost", "drift").is_critical());
    }
}
