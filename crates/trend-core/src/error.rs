//! Error types for the analysis pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error taxonomy for the analysis pipeline
///
/// Transient source errors never appear here: they are absorbed by the
/// tool invoker's retry loop and only surface as `DataUnavailable` once
/// the retry schedule is exhausted.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request symbol; rejected synchronously, never retried
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Trend data violated its invariants (empty set, too many entries,
    /// confidence out of bounds)
    #[error("Invalid trend set: {0}")]
    InvalidTrendSet(String),

    /// Terminal after retry exhaustion; triggers the degraded report path
    #[error("Data unavailable for {symbol} after {attempts} attempts")]
    DataUnavailable { symbol: String, attempts: u32 },

    /// Deterministic failure during report composition; fatal, never retried
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Memory operation on an unknown or already-cleared scope
    #[error("Memory scope error: {0}")]
    Scope(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request was cancelled by the caller or a timeout
    #[error("Request cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::InvalidSymbol("aapl!".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: aapl!");

        let err = PipelineError::DataUnavailable {
            symbol: "MSFT".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Data unavailable for MSFT after 3 attempts"
        );
    }
}
