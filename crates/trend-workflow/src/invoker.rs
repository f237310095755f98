//! Retrying tool invoker with bounded backoff
//!
//! Wraps a single unreliable data source behind a fixed retry schedule.
//! Transient errors are absorbed here: after the schedule is exhausted the
//! invoker returns a terminal [`ToolOutcome::Failure`] instead of raising,
//! leaving degradation to the orchestrator. This keeps the invoker
//! reusable for any unreliable dependency.

use crate::{op_kind, participant};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use trend_core::{PipelineError, Symbol, TrendSet};
use trend_monitor::MonitoringSystem;

/// Kinds of transient source failure
///
/// All of these are retryable; none of them ever surfaces past the
/// invoker except inside a terminal [`ToolOutcome::Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Network or upstream connectivity failed
    Connectivity,
    /// The source did not answer in time
    Timeout,
    /// The source answered but had no data for the symbol
    NoData,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => f.write_str("connectivity"),
            Self::Timeout => f.write_str("timeout"),
            Self::NoData => f.write_str("no data"),
        }
    }
}

/// A transient error returned by a [`TrendSource`]
#[derive(Debug, Clone, Error)]
#[error("source error ({kind}): {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Connectivity, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NoData, message)
    }
}

/// The injectable unreliable data call
///
/// Implementations produce the trend data one attempt at a time; the
/// invoker owns retries and instrumentation. Tests script deterministic
/// failure/success sequences through this seam instead of relying on
/// randomness.
#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch(&self, symbol: &Symbol) -> Result<TrendSet, SourceError>;

    /// Get the source's name (for logging)
    fn name(&self) -> &str;
}

/// Terminal result of one logical tool call
///
/// A `Failure` on the last attempt is indistinguishable in kind from an
/// earlier attempt's failure; only `attempts` differs. Callers detect
/// exhaustion by comparing `attempts` against the invoker's maximum, not
/// by the error kind alone.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Success(TrendSet),
    Failure {
        kind: SourceErrorKind,
        attempts: u32,
    },
}

impl ToolOutcome {
    /// Whether this outcome is a failure that consumed the whole schedule
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        matches!(self, Self::Failure { attempts, .. } if *attempts == max_attempts)
    }

    /// Convert to a hard error for callers that do not degrade
    pub fn into_result(self, symbol: &Symbol) -> trend_core::Result<TrendSet> {
        match self {
            Self::Success(trends) => Ok(trends),
            Self::Failure { attempts, .. } => Err(PipelineError::DataUnavailable {
                symbol: symbol.as_str().to_string(),
                attempts,
            }),
        }
    }
}

/// A non-decreasing schedule of delays, one per attempt
///
/// `delays[0]` runs before the first attempt (zero by default, so the
/// first attempt is immediate); the schedule length is the maximum number
/// of attempts.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    /// Create a schedule, validating that it is non-empty and non-decreasing
    pub fn new(delays: Vec<Duration>) -> trend_core::Result<Self> {
        if delays.is_empty() {
            return Err(PipelineError::Config(
                "backoff schedule must allow at least one attempt".to_string(),
            ));
        }
        if delays.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(PipelineError::Config(
                "backoff schedule must be non-decreasing".to_string(),
            ));
        }
        Ok(Self { delays })
    }

    /// Create a schedule with short delays (for testing)
    pub fn fast() -> Self {
        Self {
            delays: vec![
                Duration::ZERO,
                Duration::from_millis(10),
                Duration::from_millis(20),
            ],
        }
    }

    /// Maximum number of attempts this schedule allows
    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32
    }

    /// Delay to wait before the given 1-based attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.delays
            .get(attempt.saturating_sub(1) as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        }
    }
}

/// Executes the unreliable data call with retries and per-attempt metrics
///
/// Stateless per call; concurrent fetches share nothing beyond their
/// monitoring emissions.
pub struct ToolInvoker {
    source: Arc<dyn TrendSource>,
    schedule: BackoffSchedule,
    monitor: Arc<MonitoringSystem>,
}

impl ToolInvoker {
    pub fn new(
        source: Arc<dyn TrendSource>,
        schedule: BackoffSchedule,
        monitor: Arc<MonitoringSystem>,
    ) -> Self {
        Self {
            source,
            schedule,
            monitor,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.schedule.max_attempts()
    }

    /// Fetch trend data for an already-validated symbol
    ///
    /// Emits one metric event per attempt so retry cost is observable.
    /// Never raises: exhaustion yields `Failure { attempts: max }`.
    pub async fn fetch(&self, symbol: &Symbol) -> ToolOutcome {
        let max_attempts = self.schedule.max_attempts();
        let mut last_kind = SourceErrorKind::Connectivity;

        for attempt in 1..=max_attempts {
            let delay = self.schedule.delay_before(attempt);
            if !delay.is_zero() {
                debug!(%symbol, attempt, ?delay, "backing off before retry");
                sleep(delay).await;
            }

            debug!(
                %symbol,
                attempt,
                max_attempts,
                source = self.source.name(),
                "fetch attempt"
            );

            let operation = self
                .monitor
                .start_operation(participant::EXTRACTION, op_kind::FETCH_ATTEMPT);
            let started = Instant::now();

            match self.source.fetch(symbol).await {
                Ok(trends) => {
                    self.monitor.record_success(operation, started.elapsed());
                    if attempt > 1 {
                        debug!(%symbol, attempt, "fetch succeeded after retries");
                    }
                    return ToolOutcome::Success(trends);
                }
                Err(e) => {
                    self.monitor
                        .record_failure(operation, started.elapsed(), e.to_string());
                    warn!(
                        %symbol,
                        attempt,
                        max_attempts,
                        error = %e,
                        "fetch attempt failed"
                    );
                    last_kind = e.kind;
                }
            }
        }

        warn!(%symbol, max_attempts, "fetch exhausted all attempts");
        ToolOutcome::Failure {
            kind: last_kind,
            attempts: max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ScriptedCall, ScriptedSource};
    use trend_core::{Importance, Trend};

    fn trend_set() -> TrendSet {
        TrendSet::new(vec![Trend::new(
            "Price move",
            Importance::High,
            "impact",
            0.9,
        )])
        .unwrap()
    }

    fn invoker(script: Vec<ScriptedCall>) -> (ToolInvoker, Arc<ScriptedSource>, Arc<MonitoringSystem>) {
        let source = Arc::new(ScriptedSource::new(script));
        let monitor = Arc::new(MonitoringSystem::new());
        let invoker = ToolInvoker::new(source.clone(), BackoffSchedule::fast(), monitor.clone());
        (invoker, source, monitor)
    }

    #[test]
    fn test_default_schedule() {
        let schedule = BackoffSchedule::default();
        assert_eq!(schedule.max_attempts(), 3);
        assert_eq!(schedule.delay_before(1), Duration::ZERO);
        assert_eq!(schedule.delay_before(2), Duration::from_secs(2));
        assert_eq!(schedule.delay_before(3), Duration::from_secs(4));
    }

    #[test]
    fn test_schedule_rejects_empty() {
        assert!(BackoffSchedule::new(vec![]).is_err());
    }

    #[test]
    fn test_schedule_rejects_decreasing() {
        let result = BackoffSchedule::new(vec![
            Duration::from_secs(4),
            Duration::from_secs(2),
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (invoker, source, monitor) =
            invoker(vec![ScriptedCall::Succeed(trend_set())]);

        let outcome = invoker.fetch(&Symbol::parse("AAPL").unwrap()).await;
        assert!(matches!(outcome, ToolOutcome::Success(_)));
        assert_eq!(source.calls(), 1);
        assert_eq!(monitor.events_for("extraction").len(), 1);
    }

    #[tokio::test]
    async fn test_success_on_second_attempt() {
        let (invoker, source, _monitor) = invoker(vec![
            ScriptedCall::Fail(SourceError::connectivity("down")),
            ScriptedCall::Succeed(trend_set()),
        ]);

        let outcome = invoker.fetch(&Symbol::parse("AAPL").unwrap()).await;
        assert!(matches!(outcome, ToolOutcome::Success(_)));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_terminal_failure() {
        // Empty script: every attempt fails
        let (invoker, source, monitor) = invoker(vec![]);

        let outcome = invoker.fetch(&Symbol::parse("MSFT").unwrap()).await;
        match outcome {
            ToolOutcome::Failure { attempts, .. } => assert_eq!(attempts, 3),
            ToolOutcome::Success(_) => panic!("expected terminal failure"),
        }
        assert!(outcome.is_exhausted(invoker.max_attempts()));
        assert_eq!(source.calls(), 3);

        // One metric event per attempt, not just per call
        let events = monitor.events_for("extraction");
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.kind == "fetch_attempt"));
    }

    #[tokio::test]
    async fn test_exhausted_outcome_converts_to_data_unavailable() {
        let (invoker, _source, _monitor) = invoker(vec![]);
        let symbol = Symbol::parse("MSFT").unwrap();

        let outcome = invoker.fetch(&symbol).await;
        let error = outcome.into_result(&symbol).unwrap_err();
        assert!(matches!(
            error,
            PipelineError::DataUnavailable { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_last_error_kind_is_kept() {
        let (invoker, _source, _monitor) = invoker(vec![
            ScriptedCall::Fail(SourceError::connectivity("down")),
            ScriptedCall::Fail(SourceError::timeout("slow")),
            ScriptedCall::Fail(SourceError::no_data("nothing")),
        ]);

        let outcome = invoker.fetch(&Symbol::parse("AAPL").unwrap()).await;
        match outcome {
            ToolOutcome::Failure { kind, attempts } => {
                assert_eq!(kind, SourceErrorKind::NoData);
                assert_eq!(attempts, 3);
            }
            ToolOutcome::Success(_) => panic!("expected failure"),
        }
    }
}
