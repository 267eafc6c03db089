//! Shared vocabulary for the murmur swarm engine: task specifications,
//! identifiers, run events, configuration, and the crate-wide error type.

pub mod config;
pub mod error;
pub mod event;
pub mod sync;
pub mod types;

pub use config::{ExecutionConfig, PersistenceConfig, SwarmConfig, WorkspaceConfig};
pub use error::{CoreError, Result};
pub use event::{EventKind, SwarmEvent};
pub use sync::IgnoreLock;
pub use types::{
    AgentId, AgentInfo, RunId, TaskId, TaskKind, TaskResult, TaskSpec, TaskStatus,
};
