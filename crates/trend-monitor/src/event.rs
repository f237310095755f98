//! Metric event and alert types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Terminal outcome of a monitored operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    Success,
    Failure,
}

/// One finalized operation lifecycle record
///
/// Immutable once finalized; exactly one event exists per invoked
/// operation (a tool attempt or a full pipeline run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub operation_id: Uuid,
    pub participant: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: OperationOutcome,
    pub error_detail: Option<String>,
}

impl MetricEvent {
    /// Duration of the operation in milliseconds
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_microseconds().unwrap_or(0) as f64 / 1000.0
    }
}

/// A monitored limit that an alert can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Threshold {
    /// Mean latency in milliseconds exceeded its maximum
    MeanLatencyMs,
    /// Success rate fell below its minimum
    SuccessRate,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeanLatencyMs => f.write_str("max_mean_latency_ms"),
            Self::SuccessRate => f.write_str("min_success_rate"),
        }
    }
}

/// Configured alert limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Maximum acceptable mean latency per participant, in milliseconds
    pub max_mean_latency_ms: f64,
    /// Minimum acceptable success rate per participant, in `[0, 1]`
    pub min_success_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_mean_latency_ms: 5000.0,
            min_success_rate: 0.8,
        }
    }
}

/// A threshold violation raised by the monitoring system
///
/// Alerts are append-only and produced only by `MonitoringSystem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub triggered_at: DateTime<Utc>,
    pub participant: String,
    pub threshold: Threshold,
    pub observed: f64,
    pub limit: f64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} violated for {}: observed {:.2}, limit {:.2}",
            self.triggered_at.format("%Y-%m-%dT%H:%M:%SZ"),
            self.threshold,
            self.participant,
            self.observed,
            self.limit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_event_duration() {
        let started = Utc::now();
        let event = MetricEvent {
            operation_id: Uuid::new_v4(),
            participant: "extraction".to_string(),
            kind: "fetch_attempt".to_string(),
            started_at: started,
            ended_at: started + TimeDelta::milliseconds(250),
            outcome: OperationOutcome::Success,
            error_detail: None,
        };
        assert!((event.duration_ms() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_alert_display() {
        let alert = Alert {
            triggered_at: Utc::now(),
            participant: "extraction".to_string(),
            threshold: Threshold::SuccessRate,
            observed: 0.5,
            limit: 0.8,
        };
        let rendered = alert.to_string();
        assert!(rendered.contains("min_success_rate"));
        assert!(rendered.contains("extraction"));
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = Thresholds::default();
        assert!((thresholds.max_mean_latency_ms - 5000.0).abs() < f64::EPSILON);
        assert!((thresholds.min_success_rate - 0.8).abs() < f64::EPSILON);
    }
}
