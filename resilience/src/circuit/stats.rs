//! Read-only breaker snapshot for monitoring.

use serde::{Deserialize, Serialize};

use super::breaker::CircuitState;
use crate::health::OverallStatus;

/// Point-in-time view of a [`CircuitBreaker`](super::CircuitBreaker).
///
/// Two snapshots taken without an intervening mutation differ only in
/// `time_in_current_state_secs`. Taking one never applies a due Open →
/// HalfOpen transition, so `state` may read `open` past the cool-down until
/// the breaker is next asked for its state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitStats {
    pub label: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Lifetime count of Closed/HalfOpen → Open transitions
    pub total_trips: u64,
    pub failure_threshold: u32,
    pub reset_timeout_seconds: u64,
    pub half_open_max_calls: u32,
    pub half_open_calls: u32,
    pub time_in_current_state_secs: f64,
    pub health_threshold: f64,
    /// Lifetime count of recoveries refused by the health gate
    pub health_blocked_transitions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_status: Option<OverallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_critical_issue_count: Option<usize>,
    /// Reasons given by the most recent blocking gate evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_gate_block: Option<String>,
    /// Name of the registered health provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_provider: Option<String>,
    #[serde(default)]
    pub anomaly_source_registered: bool,
}

impl CircuitStats {
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    /// Monitoring payload.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl std::fmt::Display for CircuitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "breaker={} state={} failures={}/{} trips={} half_open={}/{} health_blocked={}",
            self.label,
            self.state,
            self.consecutive_failures,
            self.failure_threshold,
            self.total_trips,
            self.half_open_calls,
            self.half_open_max_calls,
            self.health_blocked_transitions,
        )?;
        if let Some(score) = self.last_health_score {
            write!(f, " health_score={:.2}", score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CircuitStats {
        CircuitStats {
            label: "run-1".to_string(),
            state: CircuitState::Open,
            consecutive_failures: 3,
            total_trips: 1,
            failure_threshold: 3,
            reset_timeout_seconds: 100,
            half_open_max_calls: 2,
            half_open_calls: 0,
            time_in_current_state_secs: 12.5,
            health_threshold: 0.5,
            health_blocked_transitions: 0,
            last_health_score: None,
            last_health_status: None,
            last_critical_issue_count: None,
            last_gate_block: None,
            health_provider: None,
            anomaly_source_registered: false,
        }
    }

    #[test]
    fn test_json_omits_absent_health() {
        let json = sample().to_json().unwrap();
        assert_eq!(json["state"], "open");
        assert_eq!(json["total_trips"], 1);
        assert!(json.get("last_health_score").is_none());
    }

    #[test]
    fn test_json_includes_health_when_known() {
        let stats = CircuitStats {
            last_health_score: Some(0.8),
            last_health_status: Some(OverallStatus::Nominal),
            last_critical_issue_count: Some(0),
            ..sample()
        };
        let json = stats.to_json().unwrap();
        assert_eq!(json["last_health_status"], "NOMINAL");
        assert_eq!(json["last_critical_issue_count"], 0);
    }

    #[test]
    fn test_display_summary() {
        let line = sample().to_string();
        assert!(line.starts_with("breaker=run-1 state=open failures=3/3 trips=1"));
    }
}
