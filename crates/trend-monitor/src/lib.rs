//! Metrics and alerting for trend-rs
//!
//! Tracks every monitored operation from start to terminal outcome,
//! aggregates per-participant statistics, and raises alerts when
//! configured thresholds are crossed.

pub mod event;
pub mod monitor;

pub use event::{Alert, MetricEvent, OperationOutcome, Threshold, Thresholds};
pub use monitor::{
    MonitoringSummary, MonitoringSystem, ParticipantSummary, StalledOperation,
};
