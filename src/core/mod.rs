//! Core orchestration logic.
//!
//! This module contains:
//! - SlotStore: Versioned working memory with an execution history
//! - CheckpointManager: Whole-store snapshots and restore
//! - TaskGraph: Dependency graph and deterministic execution plans
//! - Scheduler: Plan execution against registered capabilities
//! - ThoughtChain / ConfidenceGate / BacktrackController: Confidence-gated recovery

pub mod backtrack;
pub mod checkpoint;
pub mod confidence;
pub mod context;
pub mod error;
pub mod graph;
pub mod history_log;
pub mod scheduler;
pub mod shared;
pub mod slot_store;

// Re-export commonly used types
pub use backtrack::BacktrackController;
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointSummary};
pub use confidence::{ConfidenceGate, GateVerdict, ThoughtChain};
pub use context::{MemoryUsage, OrchestrationContext, SessionState};
pub use error::{EngineError, EngineResult, Resource};
pub use graph::{ExecutionPlan, TaskGraph};
pub use history_log::ExecutionLog;
pub use scheduler::Scheduler;
pub use shared::SharedContext;
pub use slot_store::SlotStore;
