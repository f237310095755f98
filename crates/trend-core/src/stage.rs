//! Core Stage trait definition

use crate::Result;
use async_trait::async_trait;

/// A capability in the analysis pipeline
///
/// The pipeline is a fixed two-stage shape (extraction feeds synthesis),
/// but each stage is expressed through this interface so new stage
/// implementations plug in without touching the orchestrator.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Input consumed by this stage
    type Input: Send + 'static;

    /// Output produced by this stage
    type Output: Send + 'static;

    /// Execute the stage against one input
    async fn execute(&self, input: Self::Input) -> Result<Self::Output>;

    /// Get the stage's name
    fn name(&self) -> &str;
}
