//! Versioned key-value working memory.
//!
//! Slots are kept in insertion order. Every mutating operation either
//! applies completely or fails without side effects, and appends one entry
//! to the execution history.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{HistoryAction, HistoryEntry, Slot, SlotKind};

use super::error::{EngineError, EngineResult};
use super::history_log::ExecutionLog;

/// Slot store with an attached history log
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    slots: HashMap<String, Slot>,

    /// Slot ids in insertion order
    order: Vec<String>,

    history: ExecutionLog,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose history keeps at most `max_entries` (0 = unbounded)
    pub fn with_history_limit(max_entries: usize) -> Self {
        Self {
            history: ExecutionLog::with_max_entries(max_entries),
            ..Self::default()
        }
    }

    /// Create a new slot; fails if the id is taken
    pub fn allocate(&mut self, id: &str, kind: SlotKind, content: Value) -> EngineResult<Slot> {
        self.allocate_with_metadata(id, kind, content, BTreeMap::new())
    }

    /// Create a new slot with metadata; fails if the id is taken
    pub fn allocate_with_metadata(
        &mut self,
        id: &str,
        kind: SlotKind,
        content: Value,
        metadata: BTreeMap<String, Value>,
    ) -> EngineResult<Slot> {
        if self.slots.contains_key(id) {
            return Err(EngineError::DuplicateSlot(id.to_string()));
        }

        let slot = Slot::new(id, kind, content).with_metadata(metadata);
        self.slots.insert(id.to_string(), slot.clone());
        self.order.push(id.to_string());

        debug!(slot = %id, %kind, "Slot allocated");
        self.record(
            HistoryEntry::new(HistoryAction::SlotAllocated, id)
                .with_detail(format!("kind={}", kind)),
        );

        Ok(slot)
    }

    /// Read a slot
    pub fn read(&self, id: &str) -> EngineResult<&Slot> {
        self.slots.get(id).ok_or_else(|| EngineError::slot_not_found(id))
    }

    /// Look up a slot without failing
    pub fn get(&self, id: &str) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Replace a slot's content; returns the new version
    pub fn update(&mut self, id: &str, content: Value) -> EngineResult<u64> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| EngineError::slot_not_found(id))?;

        slot.replace_content(content);
        let version = slot.version;

        debug!(slot = %id, version, "Slot updated");
        self.record(
            HistoryEntry::new(HistoryAction::SlotUpdated, id)
                .with_detail(format!("version={}", version)),
        );

        Ok(version)
    }

    /// Shallow-merge an object patch into an object slot; replaces otherwise
    pub fn merge(&mut self, id: &str, patch: Value) -> EngineResult<u64> {
        let current = &self.read(id)?.content;

        let merged = match (current, patch) {
            (Value::Object(existing), Value::Object(patch)) => {
                let mut merged = existing.clone();
                merged.extend(patch);
                Value::Object(merged)
            }
            (_, patch) => patch,
        };

        self.update(id, merged)
    }

    /// Apply a pure function to a slot's content; returns the new version
    ///
    /// The read and the write happen under the same `&mut` borrow, so no
    /// other mutation can interleave.
    pub fn transform<F>(&mut self, id: &str, f: F) -> EngineResult<u64>
    where
        F: FnOnce(&Value) -> Value,
    {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| EngineError::slot_not_found(id))?;

        let next = f(&slot.content);
        slot.replace_content(next);
        let version = slot.version;

        debug!(slot = %id, version, "Slot transformed");
        self.record(
            HistoryEntry::new(HistoryAction::SlotTransformed, id)
                .with_detail(format!("version={}", version)),
        );

        Ok(version)
    }

    /// Remove a slot entirely; no tombstone is kept
    pub fn delete(&mut self, id: &str) -> EngineResult<Slot> {
        let slot = self
            .slots
            .remove(id)
            .ok_or_else(|| EngineError::slot_not_found(id))?;
        self.order.retain(|s| s != id);

        debug!(slot = %id, "Slot deleted");
        self.record(HistoryEntry::new(HistoryAction::SlotDeleted, id));

        Ok(slot)
    }

    /// Slots of one kind, in insertion order
    pub fn list_by_kind(&self, kind: SlotKind) -> Vec<&Slot> {
        self.iter().filter(|s| s.kind == kind).collect()
    }

    /// All slots in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.order.iter().filter_map(|id| self.slots.get(id))
    }

    /// Slot ids in insertion order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Slot count per kind (every kind present, possibly zero)
    pub fn count_by_kind(&self) -> BTreeMap<SlotKind, usize> {
        let mut counts: BTreeMap<SlotKind, usize> =
            SlotKind::ALL.iter().map(|k| (*k, 0)).collect();
        for slot in self.slots.values() {
            *counts.entry(slot.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stable digest of the observable store content
    pub fn fingerprint(&self) -> String {
        fingerprint_slots(self.iter())
    }

    /// The execution history log
    pub fn history(&self) -> &ExecutionLog {
        &self.history
    }

    /// Append an entry to the history log
    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.history.append(entry);
    }

    /// Deep copy of every slot in insertion order
    pub(crate) fn snapshot(&self) -> Vec<Slot> {
        self.iter().cloned().collect()
    }

    /// Replace the whole slot set; versions are taken verbatim
    pub(crate) fn replace_all(&mut self, slots: Vec<Slot>) {
        self.order = slots.iter().map(|s| s.id.clone()).collect();
        self.slots = slots.into_iter().map(|s| (s.id.clone(), s)).collect();
    }
}

/// Digest of ordered (id, kind, version, content, metadata) tuples
///
/// First 16 hex chars of SHA-256. Timestamps are excluded so identical
/// contents built at different times compare equal.
pub(crate) fn fingerprint_slots<'a, I>(slots: I) -> String
where
    I: IntoIterator<Item = &'a Slot>,
{
    let mut hasher = Sha256::new();
    for slot in slots {
        let record = serde_json::json!([
            slot.id,
            slot.kind,
            slot.version,
            slot.content,
            slot.metadata,
        ]);
        hasher.update(record.to_string().as_bytes());
        hasher.update(b"\n");
    }
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
