//! Configuration for pipeline execution

use crate::invoker::BackoffSchedule;
use std::time::Duration;
use trend_core::{PipelineError, Result};
use trend_monitor::Thresholds;

/// Configuration for the workflow orchestrator
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Retry schedule for the data-fetch stage
    pub backoff: BackoffSchedule,

    /// Overall per-request deadline; `None` disables the timeout
    pub request_timeout: Option<Duration>,

    /// Alert limits handed to the monitoring system
    pub thresholds: Thresholds,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffSchedule::default(),
            request_timeout: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl WorkflowConfig {
    /// Create a new configuration builder
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(PipelineError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.thresholds.max_mean_latency_ms <= 0.0 {
            return Err(PipelineError::Config(
                "max_mean_latency_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.thresholds.min_success_rate) {
            return Err(PipelineError::Config(
                "min_success_rate must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for WorkflowConfig
#[derive(Debug, Default)]
pub struct WorkflowConfigBuilder {
    backoff: Option<BackoffSchedule>,
    request_timeout: Option<Duration>,
    thresholds: Option<Thresholds>,
}

impl WorkflowConfigBuilder {
    /// Set the retry schedule for the data-fetch stage
    pub fn backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.backoff = Some(schedule);
        self
    }

    /// Set the per-request deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the monitoring alert limits
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Build the configuration
    pub fn build(self) -> WorkflowConfig {
        WorkflowConfig {
            backoff: self.backoff.unwrap_or_default(),
            request_timeout: self.request_timeout,
            thresholds: self.thresholds.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backoff.max_attempts(), 3);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_builder() {
        let config = WorkflowConfig::builder()
            .backoff(BackoffSchedule::fast())
            .request_timeout(Duration::from_secs(30))
            .build();

        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = WorkflowConfig::builder()
            .request_timeout(Duration::ZERO)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let config = WorkflowConfig::builder()
            .thresholds(Thresholds {
                max_mean_latency_ms: 5000.0,
                min_success_rate: 1.5,
            })
            .build();
        assert!(config.validate().is_err());
    }
}
