//! Goal decomposition contract.

use std::sync::Arc;

use async_trait::async_trait;

use murmur_core::SwarmConfig;
use murmur_core::types::TaskSpec;

use crate::ast::AstService;
use crate::error::Result;

/// Turns a goal into a task list. Pluggable: the orchestrator accepts any
/// implementation, and runs without one by degrading to a single
/// whole-goal task.
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Decompose `goal` into tasks with dependency edges. May consult the
    /// code-intelligence index to decide file ownership per task.
    ///
    /// # Errors
    /// An error here does not abort the run; the orchestrator degrades to a
    /// single whole-goal task and reports the degradation.
    async fn decompose(
        &self,
        goal: &str,
        ast: Arc<dyn AstService>,
        config: &SwarmConfig,
    ) -> Result<Vec<TaskSpec>>;
}
