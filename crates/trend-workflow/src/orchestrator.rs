//! Workflow orchestration for the two-stage pipeline
//!
//! Sequences extraction and synthesis for one request, stages writes
//! through the memory manager, reports to monitoring, and substitutes a
//! degraded report when extraction cannot produce live data. The caller
//! only ever receives a [`PipelineOutcome`], never a raw error.

use crate::config::WorkflowConfig;
use crate::invoker::{ToolInvoker, ToolOutcome, TrendSource};
use crate::stages::{degraded_report, ExtractionStage, SynthesisInput, SynthesisStage};
use crate::{op_kind, participant};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use trend_core::{PipelineError, Report, Result, Stage, Symbol};
use trend_memory::{MemoryManager, ScopeId};
use trend_monitor::MonitoringSystem;
use uuid::Uuid;

/// States a request moves through
///
/// `Completed`, `DegradedCompleted`, and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Validating,
    FetchingData,
    Synthesizing,
    Completed,
    DegradedCompleted,
    Rejected,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::FetchingData => "fetching_data",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::DegradedCompleted => "degraded_completed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A request turned away before or during the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRequest {
    pub input: String,
    pub reason: String,
}

/// Terminal response of one pipeline run
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Live data was fetched and synthesized
    Completed(Report),
    /// Live data was unavailable; the report is explicitly limited
    Degraded(Report),
    /// The request was invalid, cancelled, or failed fatally
    Rejected(RejectedRequest),
}

impl PipelineOutcome {
    /// The report, when one was produced
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Completed(report) | Self::Degraded(report) => Some(report),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

enum DriveResult {
    Completed(Report),
    Degraded(Report),
}

/// Coordinates the two-stage pipeline per request
///
/// Holds no per-request state: the orchestrator can be shared across many
/// concurrent requests, which interleave freely. Within one request,
/// fetching strictly precedes synthesis.
pub struct Orchestrator {
    extraction: ExtractionStage,
    synthesis: Box<dyn Stage<Input = SynthesisInput, Output = Report>>,
    memory: Arc<MemoryManager>,
    monitor: Arc<MonitoringSystem>,
    request_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn TrendSource>,
        memory: Arc<MemoryManager>,
        monitor: Arc<MonitoringSystem>,
        config: WorkflowConfig,
    ) -> Result<Self> {
        config.validate()?;
        let invoker = ToolInvoker::new(source, config.backoff, monitor.clone());
        Ok(Self {
            extraction: ExtractionStage::new(invoker),
            synthesis: Box::new(SynthesisStage::new()),
            memory,
            monitor,
            request_timeout: config.request_timeout,
        })
    }

    /// Replace the synthesis stage implementation
    pub fn with_synthesis<S>(mut self, stage: S) -> Self
    where
        S: Stage<Input = SynthesisInput, Output = Report> + 'static,
    {
        self.synthesis = Box::new(stage);
        self
    }

    /// Run one request to its terminal outcome
    ///
    /// Applies the configured request timeout, when one is set.
    pub async fn run(&self, input: &str) -> PipelineOutcome {
        match self.request_timeout {
            Some(timeout) => {
                self.run_with_cancel(input, tokio::time::sleep(timeout))
                    .await
            }
            None => self.run_with_cancel(input, std::future::pending()).await,
        }
    }

    /// Run one request with an explicit deadline
    pub async fn run_with_timeout(&self, input: &str, timeout: Duration) -> PipelineOutcome {
        self.run_with_cancel(input, tokio::time::sleep(timeout)).await
    }

    /// Run one request, aborting when `cancel` resolves
    ///
    /// Cancellation at any state still clears the request's memory scope
    /// and still emits the terminal pipeline metric, so partial work is
    /// never left unrecorded.
    pub async fn run_with_cancel<F>(&self, input: &str, cancel: F) -> PipelineOutcome
    where
        F: Future<Output = ()> + Send,
    {
        debug!(input, state = %RequestState::Validating, "request received");
        let symbol = match Symbol::parse(input) {
            Ok(symbol) => symbol,
            Err(e) => {
                // Rejected before any tool, memory, or monitoring interaction
                info!(input, state = %RequestState::Rejected, "request rejected: {e}");
                return PipelineOutcome::Rejected(RejectedRequest {
                    input: input.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let scope = ScopeId::new();
        self.memory.open(scope, participant::EXTRACTION).await;
        let operation = self
            .monitor
            .start_operation(participant::PIPELINE, op_kind::PIPELINE);
        let started = Instant::now();

        tokio::select! {
            result = self.drive(&symbol, scope) => {
                self.finish(&symbol, scope, operation, started, result).await
            }
            () = cancel => self.cancelled(&symbol, scope, operation, started).await,
        }
    }

    /// Analyze many symbols concurrently
    ///
    /// Requests share no scopes or call state and interleave freely;
    /// outcomes are returned in input order.
    pub async fn run_batch<S: AsRef<str> + Sync>(&self, inputs: &[S]) -> Vec<PipelineOutcome> {
        futures::future::join_all(inputs.iter().map(|input| self.run(input.as_ref()))).await
    }

    async fn drive(&self, symbol: &Symbol, scope: ScopeId) -> Result<DriveResult> {
        debug!(%symbol, state = %RequestState::FetchingData, "fetching trend data");
        let outcome = self.extraction.execute(symbol.clone()).await?;

        match outcome {
            ToolOutcome::Success(trends) => {
                self.memory
                    .append(
                        scope,
                        participant::EXTRACTION,
                        serde_json::json!({ "symbol": symbol.as_str() }),
                        serde_json::to_value(&trends).unwrap_or(serde_json::Value::Null),
                    )
                    .await?;

                debug!(%symbol, state = %RequestState::Synthesizing, "composing report");
                let report = self
                    .synthesis
                    .execute(SynthesisInput {
                        symbol: symbol.clone(),
                        trends,
                    })
                    .await?;

                self.memory.open(scope, participant::SYNTHESIS).await;
                self.memory
                    .append(
                        scope,
                        participant::SYNTHESIS,
                        serde_json::json!({ "symbol": symbol.as_str() }),
                        serde_json::json!({ "summary": report.summary }),
                    )
                    .await?;

                Ok(DriveResult::Completed(report))
            }
            ToolOutcome::Failure { kind, attempts } => {
                // Only exhausted failures escape the invoker
                warn!(
                    %symbol,
                    %kind,
                    attempts,
                    "extraction exhausted retries, producing degraded report"
                );
                Ok(DriveResult::Degraded(degraded_report(symbol, attempts)))
            }
        }
    }

    async fn finish(
        &self,
        symbol: &Symbol,
        scope: ScopeId,
        operation: Uuid,
        started: Instant,
        result: Result<DriveResult>,
    ) -> PipelineOutcome {
        // The scope never survives its request, whatever the outcome
        self.memory.clear(scope).await;
        let elapsed = started.elapsed();

        match result {
            Ok(DriveResult::Completed(report)) => {
                self.monitor.record_success(operation, elapsed);
                info!(%symbol, state = %RequestState::Completed, "pipeline completed");
                PipelineOutcome::Completed(report)
            }
            Ok(DriveResult::Degraded(report)) => {
                self.monitor
                    .record_failure(operation, elapsed, "degraded: live data unavailable");
                info!(
                    %symbol,
                    state = %RequestState::DegradedCompleted,
                    "pipeline completed with degraded report"
                );
                PipelineOutcome::Degraded(report)
            }
            Err(e) => {
                self.monitor.record_failure(operation, elapsed, e.to_string());
                warn!(%symbol, state = %RequestState::Rejected, "pipeline failed: {e}");
                PipelineOutcome::Rejected(RejectedRequest {
                    input: symbol.as_str().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn cancelled(
        &self,
        symbol: &Symbol,
        scope: ScopeId,
        operation: Uuid,
        started: Instant,
    ) -> PipelineOutcome {
        warn!(%symbol, "request cancelled");
        self.memory.clear(scope).await;
        self.monitor
            .record_failure(operation, started.elapsed(), "cancelled");
        PipelineOutcome::Rejected(RejectedRequest {
            input: symbol.as_str().to_string(),
            reason: PipelineError::Cancelled.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{BackoffSchedule, SourceError};
    use crate::sources::{ScriptedCall, ScriptedSource, SimulatedSource};
    use async_trait::async_trait;
    use trend_core::{Importance, Trend, TrendSet};
    use trend_monitor::OperationOutcome;

    /// Source that never answers within a test's lifetime
    struct StalledSource;

    #[async_trait]
    impl TrendSource for StalledSource {
        async fn fetch(&self, _symbol: &Symbol) -> std::result::Result<TrendSet, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(SourceError::timeout("never answered"))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        memory: Arc<MemoryManager>,
        monitor: Arc<MonitoringSystem>,
    }

    fn fixture(source: Arc<dyn TrendSource>) -> Fixture {
        let memory = Arc::new(MemoryManager::new());
        let monitor = Arc::new(MonitoringSystem::new());
        let config = WorkflowConfig::builder()
            .backoff(BackoffSchedule::fast())
            .build();
        let orchestrator =
            Orchestrator::new(source, memory.clone(), monitor.clone(), config).unwrap();
        Fixture {
            orchestrator,
            memory,
            monitor,
        }
    }

    fn trend(title: &str, importance: Importance) -> Trend {
        Trend::new(title, importance, format!("{title} impact."), 0.8)
    }

    #[tokio::test]
    async fn test_success_scenario_orders_by_importance() {
        let trends = TrendSet::new(vec![
            trend("moderate-first", Importance::Moderate),
            trend("the-high-one", Importance::High),
            trend("moderate-second", Importance::Moderate),
        ])
        .unwrap();
        let fx = fixture(Arc::new(ScriptedSource::new(vec![ScriptedCall::Succeed(
            trends,
        )])));

        let outcome = fx.orchestrator.run("AAPL").await;
        let report = outcome.report().expect("expected a report");

        assert!(!outcome.is_degraded());
        assert!(report.summary.contains("the-high-one"));
        let headings: Vec<&str> = report
            .sections
            .iter()
            .map(|s| s.heading.as_str())
            .collect();
        assert_eq!(
            headings,
            vec!["the-high-one", "moderate-first", "moderate-second"]
        );
        assert!(report.limitations.is_none());
    }

    #[tokio::test]
    async fn test_memory_is_empty_after_any_completed_run() {
        let fx = fixture(Arc::new(SimulatedSource::new()));

        fx.orchestrator.run("AAPL").await;
        let stats = fx.memory.stats().await;
        assert_eq!(stats.active_scopes, 0);
        assert_eq!(stats.scopes_cleared, 1);

        // Degraded runs clear their scope too
        let fx = fixture(Arc::new(ScriptedSource::new(vec![])));
        fx.orchestrator.run("MSFT").await;
        let stats = fx.memory.stats().await;
        assert_eq!(stats.active_scopes, 0);
        assert_eq!(stats.scopes_cleared, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade() {
        // Empty script: every attempt fails
        let fx = fixture(Arc::new(ScriptedSource::new(vec![])));

        let outcome = fx.orchestrator.run("MSFT").await;
        assert!(outcome.is_degraded());

        let report = outcome.report().expect("degraded runs still produce a report");
        assert!(report.limitations.as_deref().is_some_and(|l| !l.is_empty()));

        // One metric event per attempt plus one pipeline-level event
        let fetch_events = fx.monitor.events_for("extraction");
        assert_eq!(fetch_events.len(), 3);
        assert!(fetch_events
            .iter()
            .all(|e| e.outcome == OperationOutcome::Failure));

        let pipeline_events = fx.monitor.events_for("pipeline");
        assert_eq!(pipeline_events.len(), 1);
        assert_eq!(pipeline_events[0].outcome, OperationOutcome::Failure);
    }

    #[tokio::test]
    async fn test_validation_reject_touches_nothing() {
        let fx = fixture(Arc::new(ScriptedSource::new(vec![])));

        for input in ["123", "aapl", "", "TOOLONG"] {
            let outcome = fx.orchestrator.run(input).await;
            assert!(outcome.is_rejected(), "expected rejection for {input:?}");
        }

        // Zero invoker calls, zero metric events, zero scopes created
        assert!(fx.monitor.events().is_empty());
        assert!(fx.monitor.summary().participants.is_empty());
        let stats = fx.memory.stats().await;
        assert_eq!(stats.active_scopes, 0);
        assert_eq!(stats.scopes_cleared, 0);
    }

    #[tokio::test]
    async fn test_success_after_transient_failure() {
        let trends = TrendSet::new(vec![trend("recovered", Importance::High)]).unwrap();
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedCall::Fail(SourceError::connectivity("blip")),
            ScriptedCall::Succeed(trends),
        ]));
        let fx = fixture(source.clone());

        let outcome = fx.orchestrator.run("AAPL").await;
        assert!(!outcome.is_degraded());
        assert!(!outcome.is_rejected());
        assert_eq!(source.calls(), 2);
        assert_eq!(fx.monitor.events_for("extraction").len(), 2);

        let pipeline_events = fx.monitor.events_for("pipeline");
        assert_eq!(pipeline_events.len(), 1);
        assert_eq!(pipeline_events[0].outcome, OperationOutcome::Success);
    }

    #[tokio::test]
    async fn test_cancellation_clears_scope_and_records_failure() {
        let fx = fixture(Arc::new(StalledSource));

        let outcome = fx
            .orchestrator
            .run_with_timeout("AAPL", Duration::from_millis(50))
            .await;

        match &outcome {
            PipelineOutcome::Rejected(rejected) => {
                assert_eq!(rejected.reason, "Request cancelled");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // Partial work is never left unrecorded
        let stats = fx.memory.stats().await;
        assert_eq!(stats.active_scopes, 0);
        assert_eq!(stats.scopes_cleared, 1);

        let pipeline_events = fx.monitor.events_for("pipeline");
        assert_eq!(pipeline_events.len(), 1);
        assert_eq!(pipeline_events[0].outcome, OperationOutcome::Failure);
        assert_eq!(pipeline_events[0].error_detail.as_deref(), Some("cancelled"));
    }

    /// Synthesis that always fails with a fatal composition error
    struct FailingSynthesis;

    #[async_trait]
    impl Stage for FailingSynthesis {
        type Input = SynthesisInput;
        type Output = Report;

        async fn execute(&self, _input: SynthesisInput) -> Result<Report> {
            Err(PipelineError::Synthesis(
                "report composition failed".to_string(),
            ))
        }

        fn name(&self) -> &str {
            "failing-synthesis"
        }
    }

    #[tokio::test]
    async fn test_fatal_synthesis_error_rejects_and_cleans_up() {
        let fx = fixture(Arc::new(SimulatedSource::new()));
        let orchestrator = fx.orchestrator.with_synthesis(FailingSynthesis);

        let outcome = orchestrator.run("AAPL").await;
        match &outcome {
            PipelineOutcome::Rejected(rejected) => {
                assert!(rejected.reason.contains("Synthesis failed"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // Fatal stage errors still clear the scope and record the run
        let stats = fx.memory.stats().await;
        assert_eq!(stats.active_scopes, 0);
        assert_eq!(stats.scopes_cleared, 1);

        let pipeline_events = fx.monitor.events_for("pipeline");
        assert_eq!(pipeline_events.len(), 1);
        assert_eq!(pipeline_events[0].outcome, OperationOutcome::Failure);
        assert!(pipeline_events[0]
            .error_detail
            .as_deref()
            .is_some_and(|d| d.contains("Synthesis failed")));
    }

    #[tokio::test]
    async fn test_configured_timeout_applies_to_run() {
        let memory = Arc::new(MemoryManager::new());
        let monitor = Arc::new(MonitoringSystem::new());
        let config = WorkflowConfig::builder()
            .backoff(BackoffSchedule::fast())
            .request_timeout(Duration::from_millis(50))
            .build();
        let orchestrator =
            Orchestrator::new(Arc::new(StalledSource), memory, monitor, config).unwrap();

        let outcome = orchestrator.run("AAPL").await;
        assert!(outcome.is_rejected());
    }

    #[tokio::test]
    async fn test_batch_runs_concurrently_and_isolated() {
        let fx = fixture(Arc::new(SimulatedSource::new()));

        let outcomes = fx
            .orchestrator
            .run_batch(&["AAPL", "MSFT", "GOOGL"])
            .await;

        assert_eq!(outcomes.len(), 3);
        for (outcome, symbol) in outcomes.iter().zip(["AAPL", "MSFT", "GOOGL"]) {
            let report = outcome.report().expect("expected a report");
            assert_eq!(report.symbol, symbol);
        }

        let stats = fx.memory.stats().await;
        assert_eq!(stats.active_scopes, 0);
        assert_eq!(stats.scopes_cleared, 3);
        assert_eq!(fx.monitor.events_for("pipeline").len(), 3);
    }

    #[tokio::test]
    async fn test_pipeline_count_matches_terminal_records() {
        let fx = fixture(Arc::new(SimulatedSource::new()));

        fx.orchestrator.run("AAPL").await;
        fx.orchestrator.run("MSFT").await;

        let summary = fx.monitor.summary();
        let pipeline = &summary.participants["pipeline"];
        assert_eq!(pipeline.count, 2);
        assert!((pipeline.success_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(pipeline.in_flight, 0);
    }
}
