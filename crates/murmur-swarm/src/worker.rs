//! Worker pool contract and a local in-process implementation.
//!
//! The orchestrator only depends on the [`WorkerPool`] trait: hand it a
//! batch (or a single task), get per-task results back. How workers run —
//! in-process, subprocess, remote — is the pool's business. The pool also
//! owns timeout and cancellation policy; the orchestrator waits as long as
//! the pool does.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;

use murmur_core::types::{AgentId, AgentInfo, TaskId, TaskResult, TaskSpec};

use crate::error::Result;

/// Executes one task to completion.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Run the task. An `Err` is converted by the pool into a failed
    /// [`TaskResult`]; it never escapes to the orchestrator as an error.
    async fn execute(&self, task: TaskSpec) -> Result<TaskResult>;
}

/// Batch execution surface the orchestrator dispatches through.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Run a parallel-safe batch concurrently, up to the pool's cap.
    /// Returns one result per task, in no particular order.
    async fn execute_batch(&self, tasks: Vec<TaskSpec>) -> Vec<TaskResult>;

    /// Run exactly one task.
    async fn execute_single(&self, task: TaskSpec) -> TaskResult;

    /// Live view of agents the pool is currently running.
    async fn get_all_agents(&self) -> Vec<AgentInfo>;
}

/// In-process pool: every task runs the same [`Worker`] on the local
/// runtime, bounded by a semaphore independent of batch size.
pub struct LocalWorkerPool<W> {
    worker: Arc<W>,
    semaphore: Arc<Semaphore>,
    agents: Arc<RwLock<HashMap<AgentId, AgentInfo>>>,
}

impl<W: Worker> LocalWorkerPool<W> {
    #[must_use]
    pub fn new(worker: W, max_concurrent: usize) -> Self {
        Self {
            worker: Arc::new(worker),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn run_one(
        worker: Arc<W>,
        semaphore: Arc<Semaphore>,
        agents: Arc<RwLock<HashMap<AgentId, AgentInfo>>>,
        task: TaskSpec,
    ) -> TaskResult {
        let task_id = task.id;
        let Ok(_permit) = semaphore.acquire_owned().await else {
            return TaskResult::failure(task_id, "worker pool is shut down");
        };

        let agent_id = AgentId::new();
        {
            let mut agents = agents.write().await;
            agents.insert(
                agent_id,
                AgentInfo {
                    agent_id,
                    task_id: Some(task_id),
                    status: "running".to_owned(),
                    tokens_used: 0,
                    started_at: Some(Utc::now()),
                },
            );
        }

        let result = match worker.execute(task).await {
            Ok(result) => result,
            Err(error) => TaskResult::failure(task_id, error.to_string()),
        };

        agents.write().await.remove(&agent_id);
        result
    }
}

#[async_trait]
impl<W: Worker> WorkerPool for LocalWorkerPool<W> {
    async fn execute_batch(&self, tasks: Vec<TaskSpec>) -> Vec<TaskResult> {
        let mut set = JoinSet::new();
        let mut task_ids: HashMap<tokio::task::Id, TaskId> = HashMap::new();

        for task in tasks {
            let task_id = task.id;
            let handle = set.spawn(Self::run_one(
                Arc::clone(&self.worker),
                Arc::clone(&self.semaphore),
                Arc::clone(&self.agents),
                task,
            ));
            task_ids.insert(handle.id(), task_id);
        }

        let mut results = Vec::with_capacity(task_ids.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                // A panicked worker fails its own task, nothing else.
                Err(error) => {
                    let task_id = task_ids.get(&error.id()).copied().unwrap_or_default();
                    tracing::error!(%task_id, %error, "worker task aborted");
                    results.push(TaskResult::failure(
                        task_id,
                        format!("worker aborted: {error}"),
                    ));
                }
            }
        }
        results
    }

    async fn execute_single(&self, task: TaskSpec) -> TaskResult {
        Self::run_one(
            Arc::clone(&self.worker),
            Arc::clone(&self.semaphore),
            Arc::clone(&self.agents),
            task,
        )
        .await
    }

    async fn get_all_agents(&self) -> Vec<AgentInfo> {
        let agents = self.agents.read().await;
        agents.values().cloned().collect()
    }
}
