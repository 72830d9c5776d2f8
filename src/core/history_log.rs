//! Append-only execution history.
//!
//! Entries are kept in memory in append order. A retention bound drops the
//! oldest entries first; sequence numbers keep counting across drops so a
//! run can slice out exactly the entries it produced.

use std::collections::VecDeque;

use crate::domain::{HistoryAction, HistoryEntry};

/// In-memory history log with optional retention bound
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: VecDeque<HistoryEntry>,

    /// 0 means unbounded
    max_entries: usize,

    /// Total entries ever appended
    appended: u64,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that keeps at most `max_entries` (0 = unbounded)
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Append an entry, evicting the oldest when over the bound
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.appended += 1;

        if self.max_entries > 0 {
            while self.entries.len() > self.max_entries {
                self.entries.pop_front();
            }
        }
    }

    /// Sequence mark to pass to [`since`](Self::since) later
    pub fn mark(&self) -> u64 {
        self.appended
    }

    /// Entries appended after `mark` that are still retained
    pub fn since(&self, mark: u64) -> Vec<HistoryEntry> {
        let newer = self.appended.saturating_sub(mark) as usize;
        let skip = self.entries.len().saturating_sub(newer);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// All retained entries in append order
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Find entries matching a predicate
    pub fn find<F>(&self, predicate: F) -> Vec<&HistoryEntry>
    where
        F: Fn(&HistoryEntry) -> bool,
    {
        self.entries.iter().filter(|e| predicate(e)).collect()
    }

    /// Get the last entry of a specific action
    pub fn last_of(&self, action: HistoryAction) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| e.action == action)
    }

    /// The (action, target) trace, for comparing against expectations
    pub fn trace(&self) -> Vec<(HistoryAction, String)> {
        self.entries
            .iter()
            .map(|e| (e.action, e.target.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_trace_order() {
        let mut log = ExecutionLog::new();
        for i in 0..5 {
            log.append(HistoryEntry::new(HistoryAction::SlotAllocated, format!("s{}", i)));
        }

        let trace = log.trace();
        assert_eq!(trace.len(), 5);
        for (i, (action, target)) in trace.iter().enumerate() {
            assert_eq!(*action, HistoryAction::SlotAllocated);
            assert_eq!(target, &format!("s{}", i));
        }
    }

    #[test]
    fn test_retention_drops_oldest() {
        let mut log = ExecutionLog::with_max_entries(2);
        log.append(HistoryEntry::new(HistoryAction::SlotAllocated, "a"));
        log.append(HistoryEntry::new(HistoryAction::SlotAllocated, "b"));
        log.append(HistoryEntry::new(HistoryAction::SlotDeleted, "a"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries().next().unwrap().target, "b");
        assert_eq!(log.mark(), 3);
    }

    #[test]
    fn test_since_mark() {
        let mut log = ExecutionLog::with_max_entries(3);
        log.append(HistoryEntry::new(HistoryAction::SlotAllocated, "a"));
        let mark = log.mark();
        log.append(HistoryEntry::new(HistoryAction::SlotUpdated, "a"));
        log.append(HistoryEntry::new(HistoryAction::SlotUpdated, "a"));

        let newer = log.since(mark);
        assert_eq!(newer.len(), 2);
        assert!(newer.iter().all(|e| e.action == HistoryAction::SlotUpdated));

        // Older than the retention window: only what is retained comes back
        for _ in 0..5 {
            log.append(HistoryEntry::new(HistoryAction::SlotDeleted, "a"));
        }
        assert_eq!(log.since(mark).len(), 3);
    }

    #[test]
    fn test_last_of() {
        let mut log = ExecutionLog::new();
        log.append(HistoryEntry::new(HistoryAction::CheckpointCreated, "cp1"));
        log.append(HistoryEntry::new(HistoryAction::CheckpointCreated, "cp2"));

        assert_eq!(log.last_of(HistoryAction::CheckpointCreated).unwrap().target, "cp2");
        assert!(log.last_of(HistoryAction::CheckpointRestored).is_none());
    }
}
