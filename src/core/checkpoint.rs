//! Full-store snapshots and atomic restore.
//!
//! A checkpoint owns an independent deep copy of every slot at creation
//! time. Restoring replaces the live slot set wholesale with fresh copies
//! of that snapshot, versions included, so a checkpoint can be restored any
//! number of times with identical results.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{HistoryAction, HistoryEntry, Slot};

use super::error::{EngineError, EngineResult};
use super::slot_store::{fingerprint_slots, SlotStore};

/// An immutable snapshot of the slot store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    id: String,
    description: String,
    created_at: DateTime<Utc>,
    snapshot: Vec<Slot>,
    /// Thought-chain mark taken with the snapshot; steps at or after it are newer
    thought_mark: u64,
}

impl Checkpoint {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Slots captured at creation, in store insertion order
    pub fn slots(&self) -> &[Slot] {
        &self.snapshot
    }

    pub fn thought_mark(&self) -> u64 {
        self.thought_mark
    }

    /// Same digest as [`SlotStore::fingerprint`] over the snapshot
    pub fn fingerprint(&self) -> String {
        fingerprint_slots(&self.snapshot)
    }

    /// Metadata-only view for export
    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            id: self.id.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            slot_count: self.snapshot.len(),
            fingerprint: self.fingerprint(),
        }
    }
}

/// Checkpoint metadata without the snapshot payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub slot_count: usize,
    pub fingerprint: String,
}

/// Owns the checkpoints of a session, independent of the live store
#[derive(Debug, Clone, Default)]
pub struct CheckpointManager {
    checkpoints: HashMap<String, Checkpoint>,

    /// Ids in creation order; front is oldest
    order: VecDeque<String>,

    /// 0 means unbounded
    max_checkpoints: usize,
}

impl CheckpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_checkpoints`, dropping the oldest (0 = unbounded)
    pub fn with_max_checkpoints(max_checkpoints: usize) -> Self {
        Self {
            max_checkpoints,
            ..Self::default()
        }
    }

    /// Snapshot every slot in `store`
    ///
    /// The checkpoint is marked before every thought step, so backtracking to it
    /// clears the whole chain.
    pub fn create(
        &mut self,
        store: &mut SlotStore,
        id: &str,
        description: &str,
    ) -> EngineResult<&Checkpoint> {
        self.create_marked(store, id, description, 0)
    }

    /// Snapshot every slot and remember a thought-chain mark
    pub fn create_marked(
        &mut self,
        store: &mut SlotStore,
        id: &str,
        description: &str,
        thought_mark: u64,
    ) -> EngineResult<&Checkpoint> {
        if self.checkpoints.contains_key(id) {
            return Err(EngineError::DuplicateCheckpoint(id.to_string()));
        }

        if self.max_checkpoints > 0 && self.order.len() >= self.max_checkpoints {
            if let Some(oldest) = self.order.pop_front() {
                self.checkpoints.remove(&oldest);
                warn!(checkpoint = %oldest, "Evicted oldest checkpoint");
                store.record(HistoryEntry::new(HistoryAction::CheckpointEvicted, oldest));
            }
        }

        let checkpoint = Checkpoint {
            id: id.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            snapshot: store.snapshot(),
            thought_mark,
        };

        info!(
            checkpoint = %id,
            slots = checkpoint.snapshot.len(),
            "Checkpoint created"
        );
        store.record(
            HistoryEntry::new(HistoryAction::CheckpointCreated, id)
                .with_detail(format!("slots={}", checkpoint.snapshot.len())),
        );

        self.order.push_back(id.to_string());
        Ok(self.checkpoints.entry(id.to_string()).or_insert(checkpoint))
    }

    /// Replace the live slot set with copies of the checkpoint's snapshot
    pub fn restore(&self, store: &mut SlotStore, id: &str) -> EngineResult<&Checkpoint> {
        let checkpoint = self
            .checkpoints
            .get(id)
            .ok_or_else(|| EngineError::checkpoint_not_found(id))?;

        store.replace_all(checkpoint.snapshot.clone());

        info!(checkpoint = %id, slots = checkpoint.snapshot.len(), "Checkpoint restored");
        store.record(HistoryEntry::new(HistoryAction::CheckpointRestored, id));

        Ok(checkpoint)
    }

    pub fn get(&self, id: &str) -> EngineResult<&Checkpoint> {
        self.checkpoints
            .get(id)
            .ok_or_else(|| EngineError::checkpoint_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.checkpoints.contains_key(id)
    }

    /// Checkpoints ordered by creation time
    pub fn list(&self) -> Vec<&Checkpoint> {
        self.order
            .iter()
            .filter_map(|id| self.checkpoints.get(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
