//! Task and agent types shared across the swarm engine.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a worker agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a swarm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Kind of work a task performs.
///
/// Review kinds (`Judge`, `Critic`, `Merge`) are allowed to start while their
/// dependency is still in review; every other kind waits for `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Code writing and modification.
    Implementation,
    /// Information gathering, reading files.
    Research,
    /// Reviews a producing task's output and arbitrates escalations.
    Judge,
    /// Reviews a producing task's output for quality.
    Critic,
    /// Resolves divergent edits produced by other tasks.
    Merge,
}

impl TaskKind {
    /// Whether this kind participates in the review-stage scheduling
    /// relaxation.
    #[must_use]
    pub fn is_review(self) -> bool {
        matches!(self, Self::Judge | Self::Critic | Self::Merge)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting on dependencies.
    Pending,
    /// Dependencies satisfied, not yet dispatched.
    Ready,
    /// Dispatched to a worker.
    Running,
    /// Finished producing output, held open for external review.
    Reviewing,
    /// Completed successfully.
    Done,
    /// Worker reported failure.
    Failed,
    /// Skipped because a transitive dependency failed.
    Skipped,
}

impl TaskStatus {
    /// Whether the task can never run again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// A unit of work dispatched to one worker agent.
///
/// The identifier and declared file sets are immutable after construction;
/// the orchestrator mutates `status`, and result handling fills in
/// `files_modified` / `result_summary` once a worker finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Immutable task identifier.
    pub id: TaskId,
    /// Kind of work performed.
    pub kind: TaskKind,
    /// Short human-readable name.
    pub title: String,
    /// Full description handed to the worker.
    pub description: String,
    /// Files this task may write.
    pub target_files: Vec<PathBuf>,
    /// Files this task may only read.
    pub read_files: Vec<PathBuf>,
    /// Tasks whose completion gates this one.
    pub depends_on: Vec<TaskId>,
    /// Named functions/classes the task is expected to touch.
    pub symbol_scope: Vec<String>,
    /// File path -> content hash the task was given at dispatch time.
    #[serde(default)]
    pub file_version_snapshot: HashMap<PathBuf, String>,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Files the worker reported modifying.
    #[serde(default)]
    pub files_modified: Vec<PathBuf>,
    /// Worker's summary of the outcome.
    #[serde(default)]
    pub result_summary: Option<String>,
}

impl TaskSpec {
    /// Create a new implementation task with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: TaskId::new(),
            kind: TaskKind::Implementation,
            description: title.clone(),
            title,
            target_files: Vec::new(),
            read_files: Vec::new(),
            depends_on: Vec::new(),
            symbol_scope: Vec::new(),
            file_version_snapshot: HashMap::new(),
            status: TaskStatus::Pending,
            files_modified: Vec::new(),
            result_summary: None,
        }
    }

    /// Set the kind of work.
    #[must_use]
    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the full description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the files this task may write.
    #[must_use]
    pub fn with_target_files(mut self, files: Vec<PathBuf>) -> Self {
        self.target_files = files;
        self
    }

    /// Set the files this task may only read.
    #[must_use]
    pub fn with_read_files(mut self, files: Vec<PathBuf>) -> Self {
        self.read_files = files;
        self
    }

    /// Set the dependency gate.
    #[must_use]
    pub fn with_depends_on(mut self, depends_on: Vec<TaskId>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Set the named symbols this task is expected to touch.
    #[must_use]
    pub fn with_symbol_scope(mut self, symbols: Vec<String>) -> Self {
        self.symbol_scope = symbols;
        self
    }
}

/// Outcome of executing one task, reported by the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task this result belongs to.
    pub task_id: TaskId,
    /// Whether the worker considered the task complete.
    pub success: bool,
    /// Files the worker modified.
    pub files_modified: Vec<PathBuf>,
    /// Short summary of what was done.
    pub result_summary: String,
    /// Error text when `success` is false.
    pub error: Option<String>,
}

impl TaskResult {
    /// Build a successful result.
    #[must_use]
    pub fn success(task_id: TaskId, summary: impl Into<String>) -> Self {
        Self {
            task_id,
            success: true,
            files_modified: Vec::new(),
            result_summary: summary.into(),
            error: None,
        }
    }

    /// Build a failed result.
    #[must_use]
    pub fn failure(task_id: TaskId, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            task_id,
            success: false,
            files_modified: Vec::new(),
            result_summary: String::new(),
            error: Some(error),
        }
    }

    /// Attach the set of modified files.
    #[must_use]
    pub fn with_files_modified(mut self, files: Vec<PathBuf>) -> Self {
        self.files_modified = files;
        self
    }
}

/// Observable state of one worker agent, reported by the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Task the agent is currently executing, if any.
    pub task_id: Option<TaskId>,
    /// Free-form status string ("idle", "running", …).
    pub status: String,
    /// Tokens this agent has consumed so far.
    pub tokens_used: u64,
    /// When the agent picked up its current task.
    pub started_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_spec_builder_sets_fields() {
        let dep = TaskId::new();
        let task = TaskSpec::new("Refactor parser")
            .with_kind(TaskKind::Implementation)
            .with_target_files(vec![PathBuf::from("src/parser.py")])
            .with_read_files(vec![PathBuf::from("src/lexer.py")])
            .with_depends_on(vec![dep])
            .with_symbol_scope(vec!["parse_expr".to_owned()]);

        assert_eq!(task.title, "Refactor parser");
        assert_eq!(task.target_files, vec![PathBuf::from("src/parser.py")]);
        assert_eq!(task.depends_on, vec![dep]);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn review_kinds_are_flagged() {
        assert!(TaskKind::Judge.is_review());
        assert!(TaskKind::Critic.is_review());
        assert!(TaskKind::Merge.is_review());
        assert!(!TaskKind::Implementation.is_review());
        assert!(!TaskKind::Research.is_review());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Reviewing.is_terminal());
    }

    #[test]
    fn task_spec_round_trips_through_json() {
        let task = TaskSpec::new("Serialize me");
        let json = match serde_json::to_string(&task) {
            Ok(json) => json,
            Err(error) => panic!("serialize failed: {error}"),
        };
        let back: TaskSpec = match serde_json::from_str(&json) {
            Ok(back) => back,
            Err(error) => panic!("deserialize failed: {error}"),
        };
        assert_eq!(back.id, task.id);
        assert_eq!(back.title, task.title);
    }
}
