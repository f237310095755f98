//! Transactional short-term memory for trend-rs
//!
//! Provides the per-request memory scope used by the pipeline: a keyed
//! buffer of input/output snapshots that is destroyed atomically when the
//! owning request produces its terminal response.

pub mod manager;

pub use manager::{MemoryManager, MemoryRecord, MemoryStats, ScopeError, ScopeId};
