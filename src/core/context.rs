//! Orchestration context.
//!
//! One explicitly constructed object owns the live slot store, the
//! checkpoints and the thought chain of a session. It is passed by
//! reference to the scheduler; nothing is reached through globals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::EngineConfig;
use crate::domain::{HistoryEntry, Slot, SlotKind, ThoughtStep};

use super::checkpoint::{CheckpointManager, CheckpointSummary};
use super::confidence::{ConfidenceGate, ThoughtChain};
use super::error::EngineResult;
use super::slot_store::SlotStore;

/// Slot and checkpoint counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total_slots: usize,
    pub by_kind: BTreeMap<SlotKind, usize>,
    /// Serialized size of all slot contents
    pub content_bytes: usize,
    pub checkpoints: usize,
}

/// Plain-data export of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub slots: Vec<Slot>,
    pub checkpoints: Vec<CheckpointSummary>,
    pub thoughts: Vec<ThoughtStep>,
    pub history: Vec<HistoryEntry>,
    pub usage: MemoryUsage,
    pub exported_at: DateTime<Utc>,
}

/// Owns all mutable state of an orchestration session
#[derive(Debug, Clone)]
pub struct OrchestrationContext {
    pub(crate) store: SlotStore,
    pub(crate) checkpoints: CheckpointManager,
    pub(crate) thoughts: ThoughtChain,
    config: EngineConfig,
}

impl Default for OrchestrationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationContext {
    /// Create a context with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            store: SlotStore::with_history_limit(config.max_history_entries),
            checkpoints: CheckpointManager::with_max_checkpoints(config.max_checkpoints),
            thoughts: ThoughtChain::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SlotStore {
        &mut self.store
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn thoughts(&self) -> &ThoughtChain {
        &self.thoughts
    }

    pub fn thoughts_mut(&mut self) -> &mut ThoughtChain {
        &mut self.thoughts
    }

    /// Gate using the configured threshold
    pub fn gate(&self) -> ConfidenceGate {
        ConfidenceGate::new(self.config.confidence_threshold)
    }

    /// Seed a caller-provided context slot
    pub fn add_context(&mut self, id: &str, content: Value) -> EngineResult<Slot> {
        self.store.allocate(id, SlotKind::Context, content)
    }

    /// Snapshot the store and mark the current end of the thought chain
    pub fn checkpoint(&mut self, id: &str, description: &str) -> EngineResult<CheckpointSummary> {
        let marker = self.thoughts.mark();
        let checkpoint = self
            .checkpoints
            .create_marked(&mut self.store, id, description, marker)?;
        Ok(checkpoint.summary())
    }

    /// Restore the store only; the thought chain is left alone
    pub fn restore(&mut self, id: &str) -> EngineResult<()> {
        self.checkpoints.restore(&mut self.store, id)?;
        Ok(())
    }

    pub fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            total_slots: self.store.len(),
            by_kind: self.store.count_by_kind(),
            content_bytes: self.store.iter().map(Slot::size_bytes).sum(),
            checkpoints: self.checkpoints.len(),
        }
    }

    /// Export slots, checkpoint metadata, thoughts and history as plain data
    pub fn export_state(&self) -> SessionState {
        info!(slots = self.store.len(), "Exporting session state");
        SessionState {
            slots: self.store.iter().cloned().collect(),
            checkpoints: self.checkpoints.list().iter().map(|c| c.summary()).collect(),
            thoughts: self.thoughts.steps().to_vec(),
            history: self.store.history().entries().cloned().collect(),
            usage: self.usage(),
            exported_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_respects_config() {
        let config = EngineConfig {
            max_checkpoints: 1,
            ..Default::default()
        };
        let mut ctx = OrchestrationContext::with_config(config);
        ctx.add_context("doc", json!("text")).unwrap();

        ctx.checkpoint("a", "").unwrap();
        ctx.checkpoint("b", "").unwrap();

        assert_eq!(ctx.checkpoints().len(), 1);
        assert!(ctx.checkpoints().contains("b"));
    }

    #[test]
    fn test_checkpoint_records_thought_marker() {
        let mut ctx = OrchestrationContext::new();
        ctx.checkpoint("empty", "").unwrap();
        ctx.thoughts_mut().add_step("parse", "", 1.0).unwrap();
        ctx.checkpoint("after_parse", "").unwrap();

        assert_eq!(ctx.checkpoints().get("empty").unwrap().thought_mark(), 0);
        assert_eq!(ctx.checkpoints().get("after_parse").unwrap().thought_mark(), 1);
    }

    #[test]
    fn test_usage_and_export() {
        let mut ctx = OrchestrationContext::new();
        ctx.add_context("doc", json!("text")).unwrap();
        ctx.store_mut()
            .allocate("answer", SlotKind::Output, json!({"ok": true}))
            .unwrap();
        ctx.checkpoint("cp", "before run").unwrap();

        let usage = ctx.usage();
        assert_eq!(usage.total_slots, 2);
        assert_eq!(usage.by_kind[&SlotKind::Context], 1);
        assert_eq!(usage.checkpoints, 1);
        // "text" + {"ok":true}
        assert_eq!(usage.content_bytes, 6 + 11);

        let state = ctx.export_state();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["slots"][1]["id"], "answer");
        assert_eq!(json["checkpoints"][0]["description"], "before run");
        assert_eq!(json["usage"]["by_kind"]["context"], 1);
        assert_eq!(state.history.len(), 3);
    }
}
