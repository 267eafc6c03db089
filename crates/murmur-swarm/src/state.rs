//! Machine-readable run state for external observers.
//!
//! A run directory holds four surfaces: `manifest` (written once),
//! `state` (a full JSON snapshot rewritten atomically on every update),
//! `events` (append-only newline-delimited JSON), and `tasks/` (one file
//! per task). `state_seq` increases on every snapshot write so an observer
//! polling the file can detect updates it missed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use murmur_core::event::SwarmEvent;
use murmur_core::types::{AgentInfo, RunId, TaskSpec};

use crate::error::{Result, SwarmError};
use crate::graph::GraphSummary;

/// Lifecycle phase of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Initializing,
    Decomposing,
    Executing,
    Completed,
    Failed,
}

/// One node as observers see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagNodeState {
    pub task_id: murmur_core::types::TaskId,
    pub title: String,
    pub status: murmur_core::types::TaskStatus,
}

/// One dependency edge, serialized as a `[from, to]` pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DagEdge(
    pub murmur_core::types::TaskId,
    pub murmur_core::types::TaskId,
);

/// Observer view of the task graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DagState {
    pub nodes: Vec<DagNodeState>,
    pub edges: Vec<DagEdge>,
}

/// Full state snapshot, rewritten on every dispatch and every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStateSnapshot {
    pub run_id: RunId,
    pub phase: RunPhase,
    pub updated_at: DateTime<Utc>,
    pub dag: DagState,
    pub active_agents: Vec<AgentInfo>,
    /// Opaque budget/economics payload owned by the worker layer.
    pub budget: serde_json::Value,
    pub dag_summary: GraphSummary,
    pub elapsed_s: f64,
    /// Monotonic write counter; filled in by [`RunStateWriter::write_state`].
    pub state_seq: u64,
}

/// Goal and initial task list, written once at run start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<TaskSpec>,
}

/// Writes run state under one run directory. Constructed without a
/// directory, every method is a no-op, so persistence stays optional
/// without branching at call sites.
pub struct RunStateWriter {
    run_dir: Option<PathBuf>,
    state_seq: AtomicU64,
}

impl RunStateWriter {
    #[must_use]
    pub fn new(run_dir: Option<PathBuf>) -> Self {
        Self {
            run_dir,
            state_seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    /// Write the one-time manifest and create the directory layout.
    ///
    /// # Errors
    /// Returns an error if the run directory cannot be created or written.
    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<()> {
        let Some(dir) = &self.run_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir.join("tasks"))?;
        write_json_atomic(&dir.join("manifest"), manifest)
    }

    /// Stamp the snapshot with the next sequence number and rewrite `state`
    /// atomically.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn write_state(&self, snapshot: &mut RunStateSnapshot) -> Result<()> {
        snapshot.state_seq = self.state_seq.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.updated_at = Utc::now();
        let Some(dir) = &self.run_dir else {
            return Ok(());
        };
        write_json_atomic(&dir.join("state"), snapshot)
    }

    /// Append one event line to the `events` log.
    ///
    /// # Errors
    /// Returns an error if the log cannot be appended.
    pub fn append_event(&self, event: &SwarmEvent) -> Result<()> {
        use std::io::Write as _;
        let Some(dir) = &self.run_dir else {
            return Ok(());
        };
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events"))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Write one task's full detail under `tasks/`.
    ///
    /// # Errors
    /// Returns an error if the task file cannot be written.
    pub fn write_task(&self, task: &TaskSpec) -> Result<()> {
        let Some(dir) = &self.run_dir else {
            return Ok(());
        };
        let path = dir.join("tasks").join(format!("{}.json", task.id));
        write_json_atomic(&path, task)
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp_name = path
        .file_name()
        .map(|name| format!("{}.tmp", name.to_string_lossy()))
        .ok_or_else(|| SwarmError::Other(format!("bad state path: {}", path.display())))?;
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::types::TaskStatus;
    use tempfile::TempDir;

    fn snapshot(run_id: RunId) -> RunStateSnapshot {
        RunStateSnapshot {
            run_id,
            phase: RunPhase::Executing,
            updated_at: Utc::now(),
            dag: DagState::default(),
            active_agents: Vec::new(),
            budget: serde_json::Value::Object(serde_json::Map::new()),
            dag_summary: GraphSummary::default(),
            elapsed_s: 0.0,
            state_seq: 0,
        }
    }

    #[test]
    fn state_seq_increases_on_every_write() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("create temp dir failed: {error}"),
        };
        let writer = RunStateWriter::new(Some(dir.path().to_path_buf()));
        let run_id = RunId::new();

        let mut snap = snapshot(run_id);
        for expected in 1..=3u64 {
            if let Err(error) = writer.write_state(&mut snap) {
                panic!("write_state failed: {error}");
            }
            assert_eq!(snap.state_seq, expected);
        }

        let on_disk = match fs::read_to_string(dir.path().join("state")) {
            Ok(contents) => contents,
            Err(error) => panic!("state file missing: {error}"),
        };
        let parsed: RunStateSnapshot = match serde_json::from_str(&on_disk) {
            Ok(parsed) => parsed,
            Err(error) => panic!("state file unparseable: {error}"),
        };
        assert_eq!(parsed.state_seq, 3);
    }

    #[test]
    fn disabled_writer_is_a_no_op() {
        let writer = RunStateWriter::new(None);
        let mut snap = snapshot(RunId::new());
        if let Err(error) = writer.write_state(&mut snap) {
            panic!("no-op write errored: {error}");
        }
        assert_eq!(snap.state_seq, 1);
    }

    #[test]
    fn events_append_as_one_json_line_each() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("create temp dir failed: {error}"),
        };
        let writer = RunStateWriter::new(Some(dir.path().to_path_buf()));
        let events = [
            SwarmEvent::now(murmur_core::event::EventKind::RunStarted {
                goal: "demo".to_owned(),
            }),
            SwarmEvent::now(murmur_core::event::EventKind::RunCompleted {
                done: 1,
                failed: 0,
                skipped: 0,
            }),
        ];
        for event in &events {
            if let Err(error) = writer.append_event(event) {
                panic!("append_event failed: {error}");
            }
        }

        let log = match fs::read_to_string(dir.path().join("events")) {
            Ok(contents) => contents,
            Err(error) => panic!("events file missing: {error}"),
        };
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("run_started"));
        assert!(lines[1].contains("run_completed"));
    }

    #[test]
    fn manifest_and_task_files_round_trip() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("create temp dir failed: {error}"),
        };
        let writer = RunStateWriter::new(Some(dir.path().to_path_buf()));
        let task = TaskSpec::new("build the thing");
        let manifest = RunManifest {
            run_id: RunId::new(),
            goal: "build the thing".to_owned(),
            created_at: Utc::now(),
            tasks: vec![task.clone()],
        };

        if let Err(error) = writer.write_manifest(&manifest) {
            panic!("write_manifest failed: {error}");
        }
        if let Err(error) = writer.write_task(&task) {
            panic!("write_task failed: {error}");
        }

        let task_path = dir.path().join("tasks").join(format!("{}.json", task.id));
        let raw = match fs::read_to_string(task_path) {
            Ok(contents) => contents,
            Err(error) => panic!("task file missing: {error}"),
        };
        let parsed: TaskSpec = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(error) => panic!("task file unparseable: {error}"),
        };
        assert_eq!(parsed.title, "build the thing");
        assert_eq!(parsed.status, TaskStatus::Pending);
    }
}
