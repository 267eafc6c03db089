//! Contract for the code-intelligence index the engine consumes.
//!
//! The engine never parses or indexes source itself; it asks an injected
//! [`AstService`] handle for file-level dependency edges and tells it when
//! files change. There is deliberately no global registry — callers that
//! want to share one index across orchestrators pass the same handle in.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// File-level dependency queries consumed by the scheduler and ledger.
#[async_trait]
pub trait AstService: Send + Sync {
    /// Prepare the index. Called once before a run.
    async fn initialize(&self) -> Result<()>;

    /// Files that `path` depends on.
    async fn get_dependencies(&self, path: &Path) -> HashSet<PathBuf>;

    /// Files that depend on `path`.
    async fn get_dependents(&self, path: &Path) -> HashSet<PathBuf>;

    /// Inform the index that a file's content changed on disk.
    async fn notify_file_changed(&self, path: &Path);

    /// Rebuild stale parts of the index. Best-effort; the orchestrator
    /// swallows failures.
    async fn refresh(&self) -> Result<()>;
}

/// An index that knows nothing. Useful as a default handle and in tests;
/// with it, parallel safety degrades to pure file-overlap checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAstService;

#[async_trait]
impl AstService for NullAstService {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn get_dependencies(&self, _path: &Path) -> HashSet<PathBuf> {
        HashSet::new()
    }

    async fn get_dependents(&self, _path: &Path) -> HashSet<PathBuf> {
        HashSet::new()
    }

    async fn notify_file_changed(&self, _path: &Path) {}

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}
