//! Core abstractions and data types for trend-rs
//!
//! This crate defines the fundamental types shared across the pipeline:
//! validated request symbols, trend data, report structures, the error
//! taxonomy, and the `Stage` trait implemented by pipeline stages.

pub mod error;
pub mod stage;
pub mod types;

pub use error::{PipelineError, Result};
pub use stage::Stage;
pub use types::{Importance, Report, Section, Symbol, Trend, TrendSet, MAX_TRENDS};
