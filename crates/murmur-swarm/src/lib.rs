//! Swarm execution engine: dependency-aware task scheduling, optimistic
//! file concurrency, and symbol-level reconciliation of divergent edits.
//!
//! The engine coordinates a fleet of code-editing workers over a shared
//! source tree. Three parts carry the correctness guarantees:
//!
//! - [`AotGraph`] — the task dependency DAG, levels, ready batches, and
//!   parallel-safety arbitration;
//! - [`FileLedger`] — per-path compare-and-swap writes so concurrent workers
//!   never silently clobber each other;
//! - [`reconcile`] — three-way merge at function/class granularity for edits
//!   that diverged from a common base, escalating true conflicts instead of
//!   guessing.
//!
//! [`SwarmOrchestrator`] ties them together and drives a run level by level,
//! persisting machine-readable state for external observers after every
//! dispatch and result.

pub mod ast;
pub mod decompose;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod orchestrator;
pub mod reconcile;
pub mod state;
pub mod worker;

pub use ast::{AstService, NullAstService};
pub use decompose::Decomposer;
pub use error::{Result, SwarmError};
pub use graph::{AotGraph, AotNode, ConflictKind, GraphSummary, TaskConflict};
pub use ledger::{ClaimType, FileClaim, FileLedger, FileVersion, WriteLogEntry, WriteResult};
pub use orchestrator::{RunReport, SwarmOrchestrator};
pub use reconcile::{MergeConflict, MergeConflictKind, MergeResult, reconcile};
pub use state::{
    DagEdge, DagNodeState, DagState, RunManifest, RunPhase, RunStateSnapshot, RunStateWriter,
};
pub use worker::{LocalWorkerPool, Worker, WorkerPool};
