//! Engine error taxonomy.
//!
//! Store and checkpoint errors are synchronous and leave no partial side
//! effects. Graph-construction errors abort a run before any task executes.
//! Capability errors are task-level: they fail one task and block its
//! dependents, and are surfaced in the run report.

use std::fmt;

use thiserror::Error;

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// What a `NotFound` error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Slot,
    Checkpoint,
    ThoughtStep,
    Task,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Slot => "slot",
            Resource::Checkpoint => "checkpoint",
            Resource::ThoughtStep => "thought step",
            Resource::Task => "task",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Slot '{0}' already exists")]
    DuplicateSlot(String),

    #[error("Checkpoint '{0}' already exists")]
    DuplicateCheckpoint(String),

    #[error("Task id '{0}' is declared more than once")]
    DuplicateTask(String),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: Resource, id: String },

    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Task '{task}' reads slot '{slot}' which no earlier task produces and the store does not hold")]
    UnresolvedInput { task: String, slot: String },

    #[error("No capability registered for '{0}'")]
    CapabilityNotFound(String),

    #[error("Capability rejected at registration: {0}")]
    InvalidCapability(String),

    #[error("Task '{task}' failed: {message}")]
    CapabilityFailed { task: String, message: String },

    #[error("Confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("Store is locked by another operation")]
    StoreLocked,
}

impl EngineError {
    pub(crate) fn slot_not_found(id: &str) -> Self {
        Self::NotFound {
            resource: Resource::Slot,
            id: id.to_string(),
        }
    }

    pub(crate) fn checkpoint_not_found(id: &str) -> Self {
        Self::NotFound {
            resource: Resource::Checkpoint,
            id: id.to_string(),
        }
    }

    /// Whether the error aborts a run before execution starts
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            EngineError::CyclicDependency { .. }
                | EngineError::UnresolvedInput { .. }
                | EngineError::DuplicateTask(_)
                | EngineError::NotFound {
                    resource: Resource::Task,
                    ..
                }
        )
    }
}
