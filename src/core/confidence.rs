//! Confidence chain and gate.
//!
//! The chain is an ordered log of reasoning steps, each carrying a
//! reliability score. Backtracking truncates the chain: the target step is
//! retained and everything strictly after it is discarded permanently.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::ThoughtStep;

use super::error::{EngineError, EngineResult, Resource};

/// Ordered log of thought steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThoughtChain {
    steps: Vec<ThoughtStep>,

    /// Sequence number for the next step; only ever grows
    #[serde(default)]
    next_seq: u64,
}

impl ThoughtChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; confidence must lie in [0, 1]
    pub fn add_step(
        &mut self,
        description: impl Into<String>,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> EngineResult<&ThoughtStep> {
        self.push(description.into(), reasoning.into(), confidence, None)
    }

    /// Append a step tied to a checkpoint
    pub fn add_step_at_checkpoint(
        &mut self,
        description: impl Into<String>,
        reasoning: impl Into<String>,
        confidence: f64,
        checkpoint_id: impl Into<String>,
    ) -> EngineResult<&ThoughtStep> {
        self.push(
            description.into(),
            reasoning.into(),
            confidence,
            Some(checkpoint_id.into()),
        )
    }

    fn push(
        &mut self,
        description: String,
        reasoning: String,
        confidence: f64,
        checkpoint_id: Option<String>,
    ) -> EngineResult<&ThoughtStep> {
        validate_confidence(confidence)?;

        let step = ThoughtStep {
            id: self.steps.len() as u64,
            seq: self.next_seq,
            description,
            reasoning,
            confidence,
            checkpoint_id,
            created_at: Utc::now(),
        };
        self.steps.push(step);
        self.next_seq += 1;

        Ok(&self.steps[self.steps.len() - 1])
    }

    /// Steps with confidence strictly below `threshold`, in creation order
    pub fn low_confidence_steps(&self, threshold: f64) -> Vec<&ThoughtStep> {
        self.steps
            .iter()
            .filter(|s| s.is_below(threshold))
            .collect()
    }

    /// Keep `step_id` and discard every later step; returns what was removed
    pub fn backtrack_to_step(&mut self, step_id: u64) -> EngineResult<Vec<ThoughtStep>> {
        if step_id >= self.steps.len() as u64 {
            return Err(EngineError::NotFound {
                resource: Resource::ThoughtStep,
                id: step_id.to_string(),
            });
        }

        Ok(self.steps.split_off(step_id as usize + 1))
    }

    /// Position marker: every step added from now on sorts at or after it
    pub fn mark(&self) -> u64 {
        self.next_seq
    }

    /// Discard every step created at or after `mark`
    pub(crate) fn truncate_to(&mut self, mark: u64) -> Vec<ThoughtStep> {
        let keep = self.steps.partition_point(|s| s.seq < mark);
        self.steps.split_off(keep)
    }

    pub fn get(&self, step_id: u64) -> Option<&ThoughtStep> {
        self.steps.get(step_id as usize)
    }

    /// Id of the newest step
    pub fn last_id(&self) -> Option<u64> {
        self.steps.last().map(|s| s.id)
    }

    pub fn steps(&self) -> &[ThoughtStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for ThoughtChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Chain of Thought ===")?;
        let current = self.last_id();
        for step in &self.steps {
            let marker = if Some(step.id) == current { "→" } else { " " };
            writeln!(f, "{} Step {}: {}", marker, step.id, step.description)?;
            writeln!(f, "  Reasoning: {}", step.reasoning)?;
            writeln!(f, "  Confidence: {:.2}", step.confidence)?;
            if let Some(ref checkpoint) = step.checkpoint_id {
                writeln!(f, "  Checkpoint: {}", checkpoint)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_confidence(confidence: f64) -> EngineResult<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfidence(confidence))
    }
}

/// Flags chains containing steps below a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    pub threshold: f64,
}

impl ConfidenceGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn evaluate(&self, chain: &ThoughtChain) -> GateVerdict {
        let low_steps: Vec<u64> = chain
            .low_confidence_steps(self.threshold)
            .iter()
            .map(|s| s.id)
            .collect();

        if low_steps.is_empty() {
            GateVerdict::Pass
        } else {
            GateVerdict::Backtrack { low_steps }
        }
    }
}

/// Outcome of a gate evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Pass,

    /// Some steps are unreliable; the caller should consider backtracking
    Backtrack { low_steps: Vec<u64> },
}
