//! Health telemetry consumed by the circuit breaker.
//!
//! Types for the pushed [`HealthReport`] and peeked [`AnomalyAlert`]s, the
//! collaborator traits that supply them, and the [`HealthGate`] that turns
//! them into a recover/stay-open verdict.

pub mod gate;
pub mod source;
pub mod types;

pub use gate::{GateInputs, GateVerdict, HealthGate, DEGRADING_COMPONENT_LIMIT};
pub use source::{
    AlertQueue, AnomalyAlertSource, HealthReportProvider, HealthSourceError, HealthSourceResult,
};
pub use types::{
    AlertSeverity, AnomalyAlert, ComponentReport, ComponentStatus, HealthReport, OverallStatus,
};
