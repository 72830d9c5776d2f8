//! Domain types for the slotflow engine.
//!
//! This module contains the plain data records:
//! - Slot: Versioned working-memory cells
//! - History: Immutable records of mutations and task transitions
//! - Task: Descriptors and resolved tasks
//! - Thought: Confidence chain steps
//! - Run: Execution reports

pub mod history;
pub mod run;
pub mod slot;
pub mod task;
pub mod thought;

// Re-export commonly used types
pub use history::{HistoryAction, HistoryEntry};
pub use run::{RunReport, RunState};
pub use slot::{Slot, SlotKind};
pub use task::{Task, TaskDescriptor, TaskKind, TaskStatus};
pub use thought::ThoughtStep;
