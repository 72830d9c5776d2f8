//! Capability interfaces for the function library.
//!
//! A capability performs the actual work of a task kind (extraction,
//! summarization, validation, ...). The engine only knows the contract:
//! slot contents in, slot contents out, or a failure.

pub mod function;
pub mod registry;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::TaskKind;

pub use function::FnCapability;
pub use registry::CapabilityRegistry;

/// Self-description returned by [`Capability::describe`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    /// Human-readable name (must not be empty)
    pub name: String,

    pub description: String,
}

impl CapabilityInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Everything a capability gets to see about the task it runs
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task_id: String,

    pub kind: TaskKind,

    pub description: String,

    pub parameters: Value,

    /// Input slot id -> content
    pub inputs: BTreeMap<String, Value>,

    /// Declared output slot ids
    pub outputs: Vec<String>,
}

impl Invocation {
    pub fn input(&self, slot: &str) -> Option<&Value> {
        self.inputs.get(slot)
    }

    /// Output carrying `value` in every declared output slot
    pub fn respond(&self, value: Value) -> CapabilityOutput {
        let mut output = CapabilityOutput::new();
        for slot in &self.outputs {
            output = output.with(slot.clone(), value.clone());
        }
        output
    }
}

/// Values produced by a capability
#[derive(Debug, Clone, Default)]
pub struct CapabilityOutput {
    /// Output slot id -> content
    pub values: BTreeMap<String, Value>,

    /// Self-reported reliability in [0, 1]
    pub confidence: Option<f64>,

    pub reasoning: Option<String>,
}

impl CapabilityOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: impl Into<String>, value: Value) -> Self {
        self.values.insert(slot.into(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Trait for pluggable task implementations
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name and description; checked at registration
    fn describe(&self) -> CapabilityInfo;

    /// Run the task against its resolved inputs
    ///
    /// The call is atomic from the scheduler's point of view. Bounding its
    /// duration is the implementation's job.
    async fn invoke(&self, invocation: &Invocation) -> Result<CapabilityOutput>;
}
