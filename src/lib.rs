//! slotflow - Task orchestration over versioned working memory
//!
//! Executes multi-step text-processing plans as a graph of typed tasks
//! against a mutable, versioned slot store.
//!
//! # Architecture
//!
//! The engine is built around three pieces:
//! - A slot store with whole-store checkpoints and an execution history
//! - A dependency graph with a deterministic topological scheduler
//! - A confidence chain that can roll execution back to a checkpoint and replan
//!
//! # Modules
//!
//! - `capabilities`: The capability trait and registry tasks are dispatched to
//! - `config`: Engine settings (file + environment)
//! - `core`: Orchestration logic (SlotStore, TaskGraph, Scheduler, backtracking)
//! - `domain`: Data structures (Slot, Task, HistoryEntry, RunReport)
//! - `logging`: Tracing subscriber setup
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use slotflow::{
//!     CapabilityRegistry, FnCapability, OrchestrationContext, Scheduler, TaskDescriptor, TaskKind,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut registry = CapabilityRegistry::new();
//! registry.register_for_kind(
//!     TaskKind::Analyze,
//!     Arc::new(FnCapability::new("analyze", "word count", |inv| {
//!         let text = inv.input("doc").and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(inv.respond(json!(text.split_whitespace().count())))
//!     })),
//! )?;
//!
//! let mut ctx = OrchestrationContext::new();
//! ctx.add_context("doc", json!("the quick brown fox"))?;
//! ctx.checkpoint("start", "before analysis")?;
//!
//! let report = Scheduler::new(registry)
//!     .run(
//!         vec![TaskDescriptor::new(TaskKind::Analyze).inputs(["doc"]).outputs(["words"])],
//!         &mut ctx,
//!     )
//!     .await?;
//! assert_eq!(report.outputs["words"], json!(4));
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

// Re-export main types at crate root for convenience
pub use capabilities::{Capability, CapabilityOutput, CapabilityRegistry, FnCapability, Invocation};
pub use config::{EngineConfig, FailurePolicy};
pub use core::{
    BacktrackController, CheckpointManager, ConfidenceGate, EngineError, EngineResult,
    ExecutionPlan, GateVerdict, OrchestrationContext, Scheduler, SharedContext, SlotStore,
    TaskGraph, ThoughtChain,
};
pub use domain::{
    HistoryAction, HistoryEntry, RunReport, RunState, Slot, SlotKind, Task, TaskDescriptor,
    TaskKind, TaskStatus, ThoughtStep,
};
