//! Memory slots held by the working-memory store.
//!
//! A slot is the unit of working memory that tasks read from and write to.
//! Content is a `serde_json::Value`, which keeps every slot clonable and
//! serializable; slots therefore never hold runtime handles.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A uniquely identified, typed, versioned unit of working memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identifier (unique within a store)
    pub id: String,

    /// Role of the slot in the pipeline
    pub kind: SlotKind,

    /// Slot payload
    pub content: Value,

    /// Free-form annotations (producing task, source, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,

    /// Starts at 1 and increases on every update or transform
    pub version: u64,

    /// Last time the content changed
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// Create a fresh slot at version 1
    pub fn new(id: impl Into<String>, kind: SlotKind, content: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            content,
            metadata: BTreeMap::new(),
            version: 1,
            updated_at: Utc::now(),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replace the content and bump the version
    pub(crate) fn replace_content(&mut self, content: Value) {
        self.content = content;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Serialized size of the content in bytes
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(&self.content)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// Types of slots in working memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Caller-provided context
    Context,

    /// Produced by one task and consumed by another
    Intermediate,

    /// Final output of a plan
    Output,

    /// Citation or evidence attached to an output
    Citation,
}

impl SlotKind {
    /// All slot kinds, in declaration order
    pub const ALL: [SlotKind; 4] = [
        SlotKind::Context,
        SlotKind::Intermediate,
        SlotKind::Output,
        SlotKind::Citation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Context => "context",
            SlotKind::Intermediate => "intermediate",
            SlotKind::Output => "output",
            SlotKind::Citation => "citation",
        }
    }
}

impl Default for SlotKind {
    fn default() -> Self {
        Self::Intermediate
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_creation() {
        let slot = Slot::new("notes", SlotKind::Context, json!("raw text"));

        assert_eq!(slot.id, "notes");
        assert_eq!(slot.kind, SlotKind::Context);
        assert_eq!(slot.version, 1);
        assert!(slot.metadata.is_empty());
    }

    #[test]
    fn test_replace_content_bumps_version() {
        let mut slot = Slot::new("s", SlotKind::Intermediate, json!(1));
        let before = slot.updated_at;

        slot.replace_content(json!(2));
        slot.replace_content(json!(3));

        assert_eq!(slot.content, json!(3));
        assert_eq!(slot.version, 3);
        assert!(slot.updated_at >= before);
    }

    #[test]
    fn test_slot_kind_serialization() {
        let json = serde_json::to_string(&SlotKind::Citation).unwrap();
        assert_eq!(json, "\"citation\"");
        assert_eq!(SlotKind::Citation.to_string(), "citation");
    }
}
