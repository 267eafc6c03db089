//! Top-level control loop driving one run from goal to completion.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use murmur_core::SwarmConfig;
use murmur_core::event::{EventKind, SwarmEvent};
use murmur_core::types::{AgentId, RunId, TaskId, TaskResult, TaskSpec};

use crate::ast::AstService;
use crate::decompose::Decomposer;
use crate::error::{Result, SwarmError};
use crate::graph::{AotGraph, GraphSummary};
use crate::ledger::FileLedger;
use crate::state::{
    DagEdge, DagNodeState, DagState, RunManifest, RunPhase, RunStateSnapshot, RunStateWriter,
};
use crate::worker::WorkerPool;

/// Final accounting for one run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    /// One result per dispatched task, in completion order.
    pub results: Vec<TaskResult>,
    /// Tasks cascade-skipped because a dependency failed.
    pub skipped: Vec<TaskId>,
    pub summary: GraphSummary,
}

/// Drives decomposition, level-by-level dispatch, conflict arbitration,
/// and state persistence for one goal at a time.
///
/// The orchestrator owns the task map and the [`FileLedger`]; the AST
/// service, worker pool, and decomposer are injected collaborators. All
/// names a run can fail with are configuration problems (cyclic graph,
/// empty decomposition); everything else — conflicts, worker failures,
/// index staleness — is handled in-loop and reported as data.
pub struct SwarmOrchestrator {
    config: SwarmConfig,
    ast: Arc<dyn AstService>,
    pool: Arc<dyn WorkerPool>,
    ledger: Arc<FileLedger>,
    decomposer: Option<Arc<dyn Decomposer>>,
    run_dir: Option<PathBuf>,
}

struct RunCtx {
    run_id: RunId,
    coordinator: AgentId,
    started: Instant,
    phase: RunPhase,
    graph: AotGraph,
    tasks: HashMap<TaskId, TaskSpec>,
    writer: RunStateWriter,
    results: Vec<TaskResult>,
    skipped: Vec<TaskId>,
    write_log_seen: usize,
}

impl SwarmOrchestrator {
    #[must_use]
    pub fn new(config: SwarmConfig, ast: Arc<dyn AstService>, pool: Arc<dyn WorkerPool>) -> Self {
        let ledger = Arc::new(
            FileLedger::new(
                config.workspace.root_path.clone(),
                config.persistence.ledger_dir.clone(),
            )
            .with_ast_service(Arc::clone(&ast)),
        );
        let run_dir = config.persistence.run_dir.clone();
        Self {
            config,
            ast,
            pool,
            ledger,
            decomposer: None,
            run_dir,
        }
    }

    #[must_use]
    pub fn with_decomposer(mut self, decomposer: Arc<dyn Decomposer>) -> Self {
        self.decomposer = Some(decomposer);
        self
    }

    /// Override the run directory from configuration.
    #[must_use]
    pub fn with_run_dir(mut self, run_dir: PathBuf) -> Self {
        self.run_dir = Some(run_dir);
        self
    }

    /// The ledger workers must route all file writes through.
    #[must_use]
    pub fn ledger(&self) -> Arc<FileLedger> {
        Arc::clone(&self.ledger)
    }

    /// Run one goal to completion.
    ///
    /// # Errors
    /// Returns an error only for unrecoverable configuration states: a
    /// cyclic task graph, or a decomposer that produced zero tasks. Task
    /// failures, conflicts, and skips are reported in the [`RunReport`].
    pub async fn run(&self, goal: &str) -> Result<RunReport> {
        let mut ctx = RunCtx {
            run_id: RunId::new(),
            coordinator: AgentId::new(),
            started: Instant::now(),
            phase: RunPhase::Init,
            graph: AotGraph::new(),
            tasks: HashMap::new(),
            writer: RunStateWriter::new(self.run_dir.clone()),
            results: Vec::new(),
            skipped: Vec::new(),
            write_log_seen: 0,
        };

        tracing::info!(run_id = %ctx.run_id, goal, "run starting");
        self.emit(&ctx, EventKind::RunStarted {
            goal: goal.to_owned(),
        });

        ctx.phase = RunPhase::Initializing;
        self.ast.initialize().await?;

        ctx.phase = RunPhase::Decomposing;
        let tasks = self.decompose(goal, &ctx).await?;
        self.emit(&ctx, EventKind::DecompositionCompleted {
            task_count: tasks.len(),
        });

        ctx.graph = AotGraph::from_tasks(&tasks);
        for task in tasks.iter().cloned() {
            ctx.tasks.insert(task.id, task);
        }
        if let Err(error) = ctx.graph.compute_levels() {
            ctx.phase = RunPhase::Failed;
            self.persist(&mut ctx).await;
            return Err(error);
        }

        let manifest = RunManifest {
            run_id: ctx.run_id,
            goal: goal.to_owned(),
            created_at: chrono::Utc::now(),
            tasks,
        };
        if let Err(error) = ctx.writer.write_manifest(&manifest) {
            tracing::warn!(%error, "manifest write failed, run continues");
        }

        ctx.phase = RunPhase::Executing;
        self.persist(&mut ctx).await;
        self.execute_levels(&mut ctx).await;

        ctx.phase = RunPhase::Completed;
        let summary = ctx.graph.summary();
        self.emit(&ctx, EventKind::RunCompleted {
            done: summary.done,
            failed: summary.failed,
            skipped: summary.skipped,
        });
        self.persist(&mut ctx).await;
        tracing::info!(
            run_id = %ctx.run_id,
            done = summary.done,
            failed = summary.failed,
            skipped = summary.skipped,
            "run finished"
        );

        Ok(RunReport {
            run_id: ctx.run_id,
            results: ctx.results,
            skipped: ctx.skipped,
            summary,
        })
    }

    /// Decompose the goal, degrading to a single whole-goal task when no
    /// decomposer is configured or the configured one fails. An *empty*
    /// decomposition is the one unrecoverable case.
    async fn decompose(&self, goal: &str, ctx: &RunCtx) -> Result<Vec<TaskSpec>> {
        let degraded_reason = match &self.decomposer {
            Some(decomposer) => {
                match decomposer
                    .decompose(goal, Arc::clone(&self.ast), &self.config)
                    .await
                {
                    Ok(tasks) if tasks.is_empty() => return Err(SwarmError::NoTasks),
                    Ok(tasks) => return Ok(tasks),
                    Err(error) => format!("decomposer failed: {error}"),
                }
            }
            None => "no decomposer configured".to_owned(),
        };

        tracing::warn!(reason = %degraded_reason, "degrading to a single whole-goal task");
        self.emit(ctx, EventKind::DecompositionDegraded {
            reason: degraded_reason,
        });
        Ok(vec![
            TaskSpec::new("Complete goal").with_description(goal.to_owned()),
        ])
    }

    async fn execute_levels(&self, ctx: &mut RunCtx) {
        let order = ctx.graph.get_execution_order();
        for (level, level_ids) in order.into_iter().enumerate() {
            let level_set: HashSet<TaskId> = level_ids.into_iter().collect();
            let batch: Vec<TaskId> = ctx
                .graph
                .get_ready_batch()
                .into_iter()
                .filter(|id| level_set.contains(id))
                .collect();
            if batch.is_empty() {
                // Everything here is blocked or already terminal (cascade
                // skip); move on.
                continue;
            }

            self.emit(ctx, EventKind::LevelStarted {
                level,
                task_ids: batch.clone(),
            });
            tracing::debug!(level, tasks = batch.len(), "level starting");

            let conflicts = if self.config.execution.enable_conflict_detection {
                ctx.graph
                    .check_parallel_safety(&batch, self.ast.as_ref())
                    .await
            } else {
                Vec::new()
            };
            for conflict in &conflicts {
                self.emit(ctx, EventKind::ConflictDetected {
                    task_a: conflict.task_a,
                    task_b: conflict.task_b,
                    kind: conflict.kind.as_str().to_owned(),
                });
            }
            let (parallel, serialized) = AotGraph::split_batch(&batch, &conflicts);

            let mut dispatch = Vec::new();
            for task_id in parallel {
                match self.prepare_dispatch(ctx, task_id, true).await {
                    Ok(spec) => dispatch.push(spec),
                    Err(error) => {
                        self.handle_result(
                            ctx,
                            TaskResult::failure(task_id, error.to_string()),
                        )
                        .await;
                    }
                }
            }
            if !dispatch.is_empty() {
                let results = self.pool.execute_batch(dispatch).await;
                for result in results {
                    self.handle_result(ctx, result).await;
                }
            }

            for task_id in serialized {
                // Re-check: a serialized task's dependency may have failed
                // earlier in this same level.
                if ctx
                    .graph
                    .node(task_id)
                    .map(|node| node.status.is_terminal())
                    .unwrap_or(true)
                {
                    continue;
                }
                match self.prepare_dispatch(ctx, task_id, false).await {
                    Ok(spec) => {
                        let result = self.pool.execute_single(spec).await;
                        self.handle_result(ctx, result).await;
                    }
                    Err(error) => {
                        self.handle_result(
                            ctx,
                            TaskResult::failure(task_id, error.to_string()),
                        )
                        .await;
                    }
                }
            }

            self.report_write_conflicts(ctx);

            // Stale index is tolerable; a dead run is not.
            if let Err(error) = self.ast.refresh().await {
                tracing::warn!(%error, "index refresh failed, run continues");
                self.emit(ctx, EventKind::IndexRefreshFailed {
                    error: error.to_string(),
                });
            }
            self.persist(ctx).await;
        }
    }

    /// Snapshot every target file into the task's dispatch payload and
    /// transition it to running.
    async fn prepare_dispatch(
        &self,
        ctx: &mut RunCtx,
        task_id: TaskId,
        parallel: bool,
    ) -> Result<TaskSpec> {
        let Some(task) = ctx.tasks.get(&task_id) else {
            return Err(SwarmError::UnknownTask(task_id));
        };
        let mut task = task.clone();
        for path in task.target_files.clone() {
            let version = self.ledger.snapshot_file(&path, ctx.coordinator).await?;
            task.file_version_snapshot.insert(path, version.hash);
        }

        ctx.graph.mark_running(task_id)?;
        task.status = murmur_core::types::TaskStatus::Running;
        ctx.tasks.insert(task_id, task.clone());

        self.emit(ctx, EventKind::TaskDispatched {
            task_id,
            agent_id: None,
            parallel,
        });
        self.write_task(ctx, task_id);
        self.persist(ctx).await;
        Ok(task)
    }

    async fn handle_result(&self, ctx: &mut RunCtx, result: TaskResult) {
        let task_id = result.task_id;

        if result.success {
            if let Err(error) = ctx.graph.mark_complete(task_id) {
                tracing::warn!(%task_id, %error, "completion for unknown or non-running task");
            }
            self.emit(ctx, EventKind::TaskCompleted {
                task_id,
                files_modified: result.files_modified.clone(),
            });
        } else {
            let error_text = result
                .error
                .clone()
                .unwrap_or_else(|| "unspecified worker failure".to_owned());
            tracing::warn!(%task_id, error = %error_text, "task failed");
            self.emit(ctx, EventKind::TaskFailed {
                task_id,
                error: error_text,
            });

            match ctx.graph.mark_failed(task_id) {
                Ok(cascade) => {
                    if !cascade.is_empty() {
                        self.emit(ctx, EventKind::TasksSkipped {
                            failed_task_id: task_id,
                            skipped: cascade.clone(),
                        });
                        for &skipped_id in &cascade {
                            self.sync_task_status(ctx, skipped_id);
                            self.write_task(ctx, skipped_id);
                        }
                        ctx.skipped.extend(cascade);
                    }
                }
                Err(error) => {
                    tracing::warn!(%task_id, %error, "failure for unknown or non-running task");
                }
            }
        }

        if let Some(task) = ctx.tasks.get_mut(&task_id) {
            task.files_modified = result.files_modified.clone();
            task.result_summary =
                (!result.result_summary.is_empty()).then(|| result.result_summary.clone());
        }
        self.sync_task_status(ctx, task_id);
        self.write_task(ctx, task_id);
        ctx.results.push(result);
        self.persist(ctx).await;
    }

    /// Surface optimistic-write conflicts recorded by the ledger since the
    /// last check into the event log.
    fn report_write_conflicts(&self, ctx: &mut RunCtx) {
        let log = self.ledger.get_write_log();
        for entry in log.iter().skip(ctx.write_log_seen) {
            if entry.conflict {
                self.emit(ctx, EventKind::WriteConflict {
                    path: entry.path.clone(),
                    task_id: entry.task_id,
                });
            }
        }
        ctx.write_log_seen = log.len();
    }

    fn sync_task_status(&self, ctx: &mut RunCtx, task_id: TaskId) {
        if let (Some(node_status), Some(task)) = (
            ctx.graph.node(task_id).map(|node| node.status),
            ctx.tasks.get_mut(&task_id),
        ) {
            task.status = node_status;
        }
    }

    fn write_task(&self, ctx: &RunCtx, task_id: TaskId) {
        if let Some(task) = ctx.tasks.get(&task_id) {
            if let Err(error) = ctx.writer.write_task(task) {
                tracing::warn!(%task_id, %error, "task file write failed, run continues");
            }
        }
    }

    fn emit(&self, ctx: &RunCtx, kind: EventKind) {
        if let Err(error) = ctx.writer.append_event(&SwarmEvent::now(kind)) {
            tracing::warn!(%error, "event append failed, run continues");
        }
    }

    async fn persist(&self, ctx: &mut RunCtx) {
        let nodes = ctx
            .graph
            .nodes()
            .map(|node| DagNodeState {
                task_id: node.task_id,
                title: ctx
                    .tasks
                    .get(&node.task_id)
                    .map(|task| task.title.clone())
                    .unwrap_or_default(),
                status: node.status,
            })
            .collect();
        let edges = ctx
            .graph
            .edges()
            .into_iter()
            .map(|(from, to)| DagEdge(from, to))
            .collect();

        let mut snapshot = RunStateSnapshot {
            run_id: ctx.run_id,
            phase: ctx.phase,
            updated_at: chrono::Utc::now(),
            dag: DagState { nodes, edges },
            active_agents: self.pool.get_all_agents().await,
            // Economics tracking lives in the worker layer; the slot stays a
            // map so observers can read it uniformly.
            budget: Value::Object(serde_json::Map::new()),
            dag_summary: ctx.graph.summary(),
            elapsed_s: ctx.started.elapsed().as_secs_f64(),
            state_seq: 0,
        };
        if let Err(error) = ctx.writer.write_state(&mut snapshot) {
            tracing::warn!(%error, "state snapshot write failed, run continues");
        }
    }
}
