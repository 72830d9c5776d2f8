//! Execution history entries.
//!
//! Every mutation of working memory and every task transition is recorded
//! as an immutable entry in an append-only log. The log is used for
//! diagnostics and for asserting that mutation traces match expectations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the execution history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identifier for this entry
    pub id: Uuid,

    /// When the action happened
    pub timestamp: DateTime<Utc>,

    /// What happened
    pub action: HistoryAction,

    /// Slot, checkpoint, task or run the action applies to
    pub target: String,

    /// Human-readable detail (never slot content)
    pub detail: Option<String>,
}

impl HistoryEntry {
    /// Create a new entry with the current timestamp
    pub fn new(action: HistoryAction, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            target: target.into(),
            detail: None,
        }
    }

    /// Attach a detail message
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Actions recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    SlotAllocated,
    SlotUpdated,
    SlotTransformed,
    SlotDeleted,

    CheckpointCreated,
    CheckpointRestored,
    /// Oldest checkpoint dropped by the retention bound
    CheckpointEvicted,

    RunStarted,
    RunCompleted,
    /// Run stopped with failed or blocked tasks
    RunPartial,

    TaskStarted,
    TaskCompleted,
    TaskFailed,
    /// Task never ran because a dependency failed
    TaskBlocked,

    /// Store restored and thought chain truncated before a retry
    Backtracked,
}

impl HistoryAction {
    /// Whether this action mutated slot contents
    pub fn is_slot_mutation(&self) -> bool {
        matches!(
            self,
            HistoryAction::SlotAllocated
                | HistoryAction::SlotUpdated
                | HistoryAction::SlotTransformed
                | HistoryAction::SlotDeleted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization() {
        let entry = HistoryEntry::new(HistoryAction::SlotAllocated, "notes")
            .with_detail("kind=context");

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: HistoryEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.action, HistoryAction::SlotAllocated);
        assert_eq!(parsed.target, "notes");
        assert_eq!(parsed.detail.as_deref(), Some("kind=context"));
    }

    #[test]
    fn test_action_wire_names() {
        let json = serde_json::to_string(&HistoryAction::CheckpointRestored).unwrap();
        assert_eq!(json, "\"checkpoint_restored\"");
    }

    #[test]
    fn test_slot_mutation_classification() {
        assert!(HistoryAction::SlotTransformed.is_slot_mutation());
        assert!(!HistoryAction::TaskCompleted.is_slot_mutation());
        assert!(!HistoryAction::CheckpointRestored.is_slot_mutation());
    }
}
