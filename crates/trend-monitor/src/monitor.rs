//! Centralized monitoring of operation lifecycles
//!
//! Every monitored operation is opened with `start_operation` and closed by
//! exactly one `record_success`/`record_failure` call. Operations that are
//! never closed are leaks; `summary` exposes them as in-flight counts and
//! `stalled_operations` surfaces the ones in flight beyond an expected
//! duration.

use crate::event::{Alert, MetricEvent, OperationOutcome, Threshold, Thresholds};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

struct InFlightOperation {
    participant: String,
    kind: String,
    started_at: DateTime<Utc>,
    started_instant: Instant,
}

#[derive(Default)]
struct ParticipantStats {
    count: u64,
    successes: u64,
    failures: u64,
    mean_latency_ms: f64,
    min_latency_ms: Option<f64>,
    max_latency_ms: f64,
    last_error: Option<String>,
}

impl ParticipantStats {
    fn success_rate(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }

    fn record(&mut self, outcome: OperationOutcome, latency_ms: f64, detail: Option<&str>) {
        self.count += 1;
        match outcome {
            OperationOutcome::Success => self.successes += 1,
            OperationOutcome::Failure => {
                self.failures += 1;
                self.last_error = detail.map(ToString::to_string);
            }
        }

        // Running mean over all terminal records
        self.mean_latency_ms += (latency_ms - self.mean_latency_ms) / self.count as f64;
        self.min_latency_ms = Some(self.min_latency_ms.map_or(latency_ms, |m| m.min(latency_ms)));
        self.max_latency_ms = self.max_latency_ms.max(latency_ms);
    }
}

#[derive(Default)]
struct MonitorState {
    in_flight: HashMap<Uuid, InFlightOperation>,
    events: Vec<MetricEvent>,
    stats: HashMap<String, ParticipantStats>,
}

/// Aggregated view of one participant's operations
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSummary {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: f64,
    pub last_error: Option<String>,
    /// Operations started but not yet terminated
    pub in_flight: usize,
}

/// Snapshot of the whole monitoring state, suitable for periodic
/// persistence by an external logger
#[derive(Debug, Clone)]
pub struct MonitoringSummary {
    pub uptime: Duration,
    pub participants: HashMap<String, ParticipantSummary>,
}

/// An operation that has been in flight beyond the expected duration
#[derive(Debug, Clone)]
pub struct StalledOperation {
    pub operation_id: Uuid,
    pub participant: String,
    pub kind: String,
    pub in_flight_for: Duration,
}

/// Records operation lifecycle events, computes per-participant statistics,
/// and raises alerts on threshold breach
///
/// All mutating access is serialized behind an `RwLock`; summary reads take
/// the shared lock. The recording API is synchronous so it can be called
/// from async code without suspension.
pub struct MonitoringSystem {
    thresholds: Thresholds,
    started_at: Instant,
    state: RwLock<MonitorState>,
}

impl MonitoringSystem {
    pub fn new() -> Self {
        Self::with_thresholds(Thresholds::default())
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            started_at: Instant::now(),
            state: RwLock::new(MonitorState::default()),
        }
    }

    /// Begin tracking one operation; the returned id must be closed with
    /// exactly one `record_success` or `record_failure` call
    pub fn start_operation(&self, participant: &str, kind: &str) -> Uuid {
        let operation_id = Uuid::new_v4();
        let mut state = self.write_state();
        state.in_flight.insert(
            operation_id,
            InFlightOperation {
                participant: participant.to_string(),
                kind: kind.to_string(),
                started_at: Utc::now(),
                started_instant: Instant::now(),
            },
        );
        debug!(%operation_id, participant, kind, "operation started");
        operation_id
    }

    /// Close an operation as successful
    pub fn record_success(&self, operation_id: Uuid, elapsed: Duration) {
        self.finalize(operation_id, elapsed, OperationOutcome::Success, None);
    }

    /// Close an operation as failed, with a human-readable error detail
    pub fn record_failure(&self, operation_id: Uuid, elapsed: Duration, detail: impl Into<String>) {
        self.finalize(
            operation_id,
            elapsed,
            OperationOutcome::Failure,
            Some(detail.into()),
        );
    }

    fn finalize(
        &self,
        operation_id: Uuid,
        elapsed: Duration,
        outcome: OperationOutcome,
        detail: Option<String>,
    ) {
        let mut state = self.write_state();
        let Some(op) = state.in_flight.remove(&operation_id) else {
            // Unknown or already-closed id: an event may exist at most once
            warn!(%operation_id, "terminal record for unknown operation ignored");
            return;
        };

        let latency_ms = elapsed.as_secs_f64() * 1000.0;
        let ended_at = op.started_at
            + TimeDelta::from_std(elapsed).unwrap_or_else(|_| TimeDelta::zero());

        state
            .stats
            .entry(op.participant.clone())
            .or_default()
            .record(outcome, latency_ms, detail.as_deref());

        state.events.push(MetricEvent {
            operation_id,
            participant: op.participant,
            kind: op.kind,
            started_at: op.started_at,
            ended_at,
            outcome,
            error_detail: detail,
        });
    }

    /// Aggregates per participant: count, success rate, latency, last error
    pub fn summary(&self) -> MonitoringSummary {
        let state = self.read_state();
        let mut participants: HashMap<String, ParticipantSummary> = state
            .stats
            .iter()
            .map(|(name, stats)| {
                (
                    name.clone(),
                    ParticipantSummary {
                        count: stats.count,
                        successes: stats.successes,
                        failures: stats.failures,
                        success_rate: stats.success_rate(),
                        mean_latency_ms: stats.mean_latency_ms,
                        min_latency_ms: stats.min_latency_ms,
                        max_latency_ms: stats.max_latency_ms,
                        last_error: stats.last_error.clone(),
                        in_flight: 0,
                    },
                )
            })
            .collect();

        for op in state.in_flight.values() {
            participants
                .entry(op.participant.clone())
                .or_insert_with(|| ParticipantSummary {
                    count: 0,
                    successes: 0,
                    failures: 0,
                    success_rate: 1.0,
                    mean_latency_ms: 0.0,
                    min_latency_ms: None,
                    max_latency_ms: 0.0,
                    last_error: None,
                    in_flight: 0,
                })
                .in_flight += 1;
        }

        MonitoringSummary {
            uptime: self.started_at.elapsed(),
            participants,
        }
    }

    /// Operations in flight longer than `older_than` - likely leaks
    pub fn stalled_operations(&self, older_than: Duration) -> Vec<StalledOperation> {
        let state = self.read_state();
        state
            .in_flight
            .iter()
            .filter(|(_, op)| op.started_instant.elapsed() > older_than)
            .map(|(id, op)| StalledOperation {
                operation_id: *id,
                participant: op.participant.clone(),
                kind: op.kind.clone(),
                in_flight_for: op.started_instant.elapsed(),
            })
            .collect()
    }

    /// Compare aggregates against the configured limits
    ///
    /// Produces at most one alert per participant and threshold per pass.
    /// Repeat alerts across separate passes are not suppressed: detection
    /// is idempotent, not deduplicated across time.
    pub fn check_thresholds(&self) -> Vec<Alert> {
        let state = self.read_state();
        let mut alerts = Vec::new();

        for (participant, stats) in &state.stats {
            if stats.count == 0 {
                continue;
            }

            if stats.mean_latency_ms > self.thresholds.max_mean_latency_ms {
                alerts.push(Alert {
                    triggered_at: Utc::now(),
                    participant: participant.clone(),
                    threshold: Threshold::MeanLatencyMs,
                    observed: stats.mean_latency_ms,
                    limit: self.thresholds.max_mean_latency_ms,
                });
            }

            if stats.success_rate() < self.thresholds.min_success_rate {
                alerts.push(Alert {
                    triggered_at: Utc::now(),
                    participant: participant.clone(),
                    threshold: Threshold::SuccessRate,
                    observed: stats.success_rate(),
                    limit: self.thresholds.min_success_rate,
                });
            }
        }

        for alert in &alerts {
            warn!(%alert, "monitoring threshold violated");
        }

        alerts
    }

    /// Snapshot of every finalized metric event, in completion order
    pub fn events(&self) -> Vec<MetricEvent> {
        self.read_state().events.clone()
    }

    /// Finalized events for one participant
    pub fn events_for(&self, participant: &str) -> Vec<MetricEvent> {
        self.read_state()
            .events
            .iter()
            .filter(|e| e.participant == participant)
            .cloned()
            .collect()
    }

    /// Drop all events, aggregates, and in-flight operations
    pub fn reset(&self) {
        let mut state = self.write_state();
        *state = MonitorState::default();
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MonitorState> {
        self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, MonitorState> {
        self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MonitoringSystem {
    fn default() -> Self {
        Self::new()
    }
}
