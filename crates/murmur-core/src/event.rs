//! Typed run events.
//!
//! Every orchestrator action emits exactly one event; the run's `events` file
//! is the newline-delimited JSON serialization of these. The kind enum is
//! closed so the event-log schema is enforced at compile time.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, TaskId};

/// A single timestamped entry in the run's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl SwarmEvent {
    /// Wrap an event kind with the current time.
    #[must_use]
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Everything the orchestrator can report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    /// A run began for the given goal.
    RunStarted {
        /// Goal text the run was started with.
        goal: String,
    },
    /// Decomposition produced a task list.
    DecompositionCompleted {
        /// Number of tasks produced.
        task_count: usize,
    },
    /// Decomposition was unavailable or failed; the run degraded to a single
    /// whole-goal task.
    DecompositionDegraded {
        /// Why decomposition did not produce tasks.
        reason: String,
    },
    /// A level of the execution order began dispatching.
    LevelStarted {
        /// Level index, 0-based.
        level: usize,
        /// Tasks scheduled in this level.
        task_ids: Vec<TaskId>,
    },
    /// A task was handed to the worker pool.
    TaskDispatched {
        /// Task being dispatched.
        task_id: TaskId,
        /// Agent assigned, when known at dispatch time.
        agent_id: Option<AgentId>,
        /// Whether the task ran in the parallel-safe set.
        parallel: bool,
    },
    /// A worker reported success.
    TaskCompleted {
        /// Completed task.
        task_id: TaskId,
        /// Files the worker modified.
        files_modified: Vec<PathBuf>,
    },
    /// A worker reported failure.
    TaskFailed {
        /// Failed task.
        task_id: TaskId,
        /// Worker-reported error text.
        error: String,
    },
    /// Transitive dependents of a failed task were skipped.
    TasksSkipped {
        /// The task whose failure triggered the cascade.
        failed_task_id: TaskId,
        /// Every task marked skipped.
        skipped: Vec<TaskId>,
    },
    /// Two ready tasks overlapped on files and were serialized.
    ConflictDetected {
        /// First task of the conflicting pair.
        task_a: TaskId,
        /// Second task of the conflicting pair.
        task_b: TaskId,
        /// Conflict classification (direct / read-write / ast-dependency).
        kind: String,
    },
    /// An optimistic write lost the compare-and-swap race.
    WriteConflict {
        /// Path whose recorded hash moved underneath the writer.
        path: PathBuf,
        /// Task that attempted the write.
        task_id: TaskId,
    },
    /// The code-intelligence index could not be refreshed; the run continues.
    IndexRefreshFailed {
        /// Error text from the AST service.
        error: String,
    },
    /// The run reached a terminal phase.
    RunCompleted {
        /// Tasks that finished successfully.
        done: usize,
        /// Tasks that failed.
        failed: usize,
        /// Tasks skipped by cascade.
        skipped: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = SwarmEvent::now(EventKind::TaskFailed {
            task_id: TaskId::new(),
            error: "boom".to_owned(),
        });
        let json = match serde_json::to_value(&event) {
            Ok(json) => json,
            Err(error) => panic!("serialize failed: {error}"),
        };
        assert_eq!(json["event_type"], "task_failed");
        assert_eq!(json["error"], "boom");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn events_round_trip() {
        let event = SwarmEvent::now(EventKind::LevelStarted {
            level: 2,
            task_ids: vec![TaskId::new()],
        });
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(error) => panic!("serialize failed: {error}"),
        };
        let back: SwarmEvent = match serde_json::from_str(&line) {
            Ok(back) => back,
            Err(error) => panic!("deserialize failed: {error}"),
        };
        match back.kind {
            EventKind::LevelStarted { level, task_ids } => {
                assert_eq!(level, 2);
                assert_eq!(task_ids.len(), 1);
            }
            other => panic!("wrong kind back: {other:?}"),
        }
    }
}
