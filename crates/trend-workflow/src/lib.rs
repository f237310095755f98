//! Resilient two-stage trend analysis pipeline
//!
//! Wires the pipeline together: a retrying [`ToolInvoker`] around a
//! [`TrendSource`], extraction and synthesis stages, and an
//! [`Orchestrator`] that drives one request from validation to a terminal
//! [`PipelineOutcome`] while keeping memory scopes transactional and the
//! monitoring record complete.

pub mod config;
pub mod invoker;
pub mod orchestrator;
pub mod sources;
pub mod stages;

pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use invoker::{BackoffSchedule, SourceError, SourceErrorKind, ToolInvoker, ToolOutcome, TrendSource};
pub use orchestrator::{Orchestrator, PipelineOutcome, RejectedRequest, RequestState};
pub use sources::SimulatedSource;

/// Participant names used in memory scopes and metric events
pub mod participant {
    pub const EXTRACTION: &str = "extraction";
    pub const SYNTHESIS: &str = "synthesis";
    pub const PIPELINE: &str = "pipeline";
}

/// Operation kinds recorded on metric events
pub mod op_kind {
    pub const FETCH_ATTEMPT: &str = "fetch_attempt";
    pub const PIPELINE: &str = "pipeline";
}
