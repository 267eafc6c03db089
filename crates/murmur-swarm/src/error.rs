//! Engine error type.
//!
//! Only genuinely unrecoverable states are errors here. Optimistic-write
//! conflicts and merge conflicts are routine outcomes and travel as data
//! ([`crate::WriteResult`], [`crate::MergeResult`]), never as variants of
//! this enum.

use std::path::PathBuf;
use std::io;
use std::result::Result as StdResult;

use murmur_core::CoreError;
use murmur_core::types::TaskId;
use serde_json::Error as JsonError;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = StdResult<T, SwarmError>;

/// Errors that can occur in the swarm engine.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Core error bubbled up from shared types.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),

    /// The task graph contains a dependency cycle.
    #[error("Cyclic dependency detected in task graph")]
    CyclicDependency,

    /// A task id was referenced that the graph does not contain.
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    /// Decomposition produced no tasks and no degradation was possible.
    #[error("Decomposition produced no tasks for goal")]
    NoTasks,

    /// The ledger could not persist its state to disk.
    #[error("Ledger persistence failed for {path}: {reason}")]
    LedgerPersist {
        /// Persistence file involved.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_dependency_display() {
        assert_eq!(
            SwarmError::CyclicDependency.to_string(),
            "Cyclic dependency detected in task graph"
        );
    }

    #[test]
    fn core_error_converts() {
        let core = CoreError::Config("bad".to_owned());
        let swarm: SwarmError = core.into();
        assert!(swarm.to_string().contains("Configuration error"));
    }
}
