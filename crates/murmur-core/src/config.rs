//! Configuration types for execution, workspace, and persistence settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Complete swarm configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Execution configuration
    pub execution: ExecutionConfig,
    /// Workspace configuration
    pub workspace: WorkspaceConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
}

/// Execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of tasks to execute concurrently
    pub max_concurrent_tasks: usize,
    /// Whether file-overlap conflict detection is enabled
    pub enable_conflict_detection: bool,
    /// How many times a caller should re-snapshot and retry a conflicting
    /// write before escalating to reconciliation
    pub max_write_retries: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            enable_conflict_detection: true,
            max_write_retries: 2,
        }
    }
}

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root path of the shared source tree
    pub root_path: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
        }
    }
}

/// Persistence configuration.
///
/// Either directory may be absent, in which case the corresponding component
/// keeps state in memory only.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for the run's manifest/state/events files
    pub run_dir: Option<PathBuf>,
    /// Directory for the file ledger's versions/claims/write-log
    pub ledger_dir: Option<PathBuf>,
}

impl SwarmConfig {
    /// Load config from a specific file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| CoreError::Config(format!("Failed to read config: {error}")))?;
        toml::from_str(&contents)
            .map_err(|error| CoreError::Config(format!("Failed to parse config: {error}")))
    }

    /// Save config to a specific file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                CoreError::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| CoreError::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Murmur Configuration File\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| CoreError::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_sensible() {
        let config = SwarmConfig::default();
        assert_eq!(config.execution.max_concurrent_tasks, 4);
        assert!(config.execution.enable_conflict_detection);
        assert!(config.persistence.run_dir.is_none());
    }

    #[test]
    fn config_round_trips_through_toml_file() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("create temp dir failed: {error}"),
        };
        let path = dir.path().join("config.toml");

        let mut config = SwarmConfig::default();
        config.execution.max_concurrent_tasks = 8;
        config.workspace.root_path = PathBuf::from("/srv/repo");

        if let Err(error) = config.save_to_file(&path) {
            panic!("save failed: {error}");
        }
        let loaded = match SwarmConfig::load_from_file(&path) {
            Ok(loaded) => loaded,
            Err(error) => panic!("load failed: {error}"),
        };

        assert_eq!(loaded.execution.max_concurrent_tasks, 8);
        assert_eq!(loaded.workspace.root_path, PathBuf::from("/srv/repo"));
    }
}
