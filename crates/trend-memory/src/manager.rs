//! Scoped transactional memory manager
//!
//! Each pipeline request owns one memory scope. Participants append
//! input/output snapshot pairs to their lane during the request, and the
//! whole scope is destroyed atomically when the request's terminal response
//! is produced. Nothing survives past its owning request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Error for memory operations on an unknown or cleared scope
///
/// This is a programming-contract violation, not a user-facing condition.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("unknown or cleared memory scope: {0}")]
    UnknownScope(ScopeId),
}

impl From<ScopeError> for trend_core::PipelineError {
    fn from(err: ScopeError) -> Self {
        trend_core::PipelineError::Scope(err.to_string())
    }
}

/// Unique identifier for one request's memory scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One input/output snapshot pair recorded by a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(input: serde_json::Value, output: serde_json::Value) -> Self {
        Self {
            input,
            output,
            recorded_at: Utc::now(),
        }
    }
}

/// Aggregate memory statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Scopes currently open
    pub active_scopes: usize,
    /// Scopes destroyed since startup (or the last reset)
    pub scopes_cleared: u64,
    /// Records currently held across all open scopes
    pub records_stored: usize,
}

#[derive(Default)]
struct MemoryState {
    scopes: HashMap<ScopeId, HashMap<String, Vec<MemoryRecord>>>,
    scopes_cleared: u64,
}

/// Short-term transactional memory, cleared per response
///
/// Scopes are caller-supplied and unique per request, so concurrent
/// requests never share a buffer. Mutating access is serialized behind a
/// `tokio` `RwLock`; reads of `stats` and `read_all` take the shared lock.
/// There is no cross-request retention: long-term persistence is out of
/// scope for this component.
pub struct MemoryManager {
    state: RwLock<MemoryState>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Open a scope and register a participant lane under it
    ///
    /// Opening an already-open scope is idempotent.
    pub async fn open(&self, scope: ScopeId, participant: &str) {
        let mut state = self.state.write().await;
        state
            .scopes
            .entry(scope)
            .or_default()
            .entry(participant.to_string())
            .or_default();
        debug!(%scope, participant, "memory scope opened");
    }

    /// Append an input/output snapshot pair to a participant's lane
    ///
    /// Writes under an unknown or already-cleared scope are rejected.
    pub async fn append(
        &self,
        scope: ScopeId,
        participant: &str,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Result<(), ScopeError> {
        let mut state = self.state.write().await;
        let participants = state
            .scopes
            .get_mut(&scope)
            .ok_or(ScopeError::UnknownScope(scope))?;
        participants
            .entry(participant.to_string())
            .or_default()
            .push(MemoryRecord::new(input, output));
        Ok(())
    }

    /// Read every record a participant stored under a scope, in append order
    ///
    /// Returns an empty sequence for an unknown or cleared scope, so
    /// post-clear reads observe the scope as empty.
    pub async fn read_all(&self, scope: ScopeId, participant: &str) -> Vec<MemoryRecord> {
        let state = self.state.read().await;
        state
            .scopes
            .get(&scope)
            .and_then(|participants| participants.get(participant))
            .cloned()
            .unwrap_or_default()
    }

    /// Destroy a scope and every participant record under it
    ///
    /// Idempotent: clearing an unknown or already-cleared scope is a no-op.
    pub async fn clear(&self, scope: ScopeId) {
        let mut state = self.state.write().await;
        if state.scopes.remove(&scope).is_some() {
            state.scopes_cleared += 1;
            debug!(%scope, "memory scope cleared");
        }
    }

    /// Current memory statistics
    pub async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        let records_stored = state
            .scopes
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum();
        MemoryStats {
            active_scopes: state.scopes.len(),
            scopes_cleared: state.scopes_cleared,
            records_stored,
        }
    }

    /// Drop every scope and reset the counters
    pub async fn reset_all(&self) {
        let mut state = self.state.write().await;
        state.scopes.clear();
        state.scopes_cleared = 0;
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}
