//! Collaborator contracts for health telemetry.
//!
//! The breaker never pulls health reports: a [`HealthReportProvider`] pushes
//! snapshots through `CircuitBreaker::update_health_report` on its own
//! cadence. Anomaly alerts are peeked from an [`AnomalyAlertSource`] without
//! draining it.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use super::types::AnomalyAlert;

/// Errors a collaborator can report while being introspected.
#[derive(Debug, Clone, Error)]
pub enum HealthSourceError {
    #[error("health source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed health data: {0}")]
    Malformed(String),
}

/// Result type for collaborator calls
pub type HealthSourceResult<T> = Result<T, HealthSourceError>;

/// Producer of health reports.
///
/// Registering a provider tells the breaker that telemetry exists for this
/// run; reports themselves arrive via `update_health_report`.
pub trait HealthReportProvider: Send + Sync {
    /// Name used in logs.
    fn provider_name(&self) -> &str;
}

/// Queue of alerts raised by an anomaly detector.
///
/// Alerts are peeked without the breaker's lock held, so an implementation
/// may read the breaker (`get_stats`). Calling `state`, `is_available` or
/// `check_state` from here re-enters the gate and recurses.
pub trait AnomalyAlertSource: Send + Sync {
    /// Alerts currently pending. `clear = true` drains them.
    fn pending_alerts(&self, clear: bool) -> HealthSourceResult<Vec<AnomalyAlert>>;
}

/// In-process [`AnomalyAlertSource`] backed by a vector.
#[derive(Debug, Default)]
pub struct AlertQueue {
    alerts: Mutex<Vec<AnomalyAlert>>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an alert.
    pub fn push(&self, alert: AnomalyAlert) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert);
    }

    pub fn len(&self) -> usize {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnomalyAlertSource for AlertQueue {
    fn pending_alerts(&self, clear: bool) -> HealthSourceResult<Vec<AnomalyAlert>> {
        let mut alerts = self.alerts.lock().unwrap_or_else(PoisonError::into_inner);
        if clear {
            Ok(std::mem::take(&mut *alerts))
        } else {
            Ok(alerts.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::AlertSeverity;

    #[test]
    fn test_peek_does_not_drain() {
        let queue = AlertQueue::new();
        queue.push(AnomalyAlert::critical("cost", "spike"));
        queue.push(AnomalyAlert::new(AlertSeverity::Info, "latency", "noise"));

        assert_eq!(queue.pending_alerts(false).unwrap().len(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_clear_drains() {
        let queue = AlertQueue::new();
        queue.push(AnomalyAlert::critical("cost", "spike"));

        let drained = queue.pending_alerts(true).unwrap();
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
        assert!(queue.pending_alerts(false).unwrap().is_empty());
    }
}
