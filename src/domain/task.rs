//! Task descriptors and resolved tasks.
//!
//! Descriptors arrive unordered from an instruction parser (or a YAML/JSON
//! plan file). The task graph resolves them into [`Task`]s with stable ids
//! and declaration indices.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task as supplied by the parser, before graph construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task id; defaults to `task_{index}` when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Kind of work this task performs
    pub kind: TaskKind,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Registry name to invoke instead of the kind name
    #[serde(default)]
    pub capability: Option<String>,

    /// Slots read by this task
    #[serde(default)]
    pub input_slots: Vec<String>,

    /// Slots written by this task
    #[serde(default)]
    pub output_slots: Vec<String>,

    /// Task ids that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Opaque parameters forwarded to the capability
    #[serde(default)]
    pub parameters: Value,
}

impl TaskDescriptor {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.capability = Some(name.into());
        self
    }

    pub fn inputs<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn outputs<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn depends_on<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = tasks.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Parse a descriptor list from YAML (JSON is accepted too)
    pub fn list_from_yaml(content: &str) -> Result<Vec<Self>> {
        serde_yaml::from_str(content).context("Failed to parse task descriptors")
    }

    /// Load a descriptor list from a YAML or JSON file
    pub fn list_from_file(path: &Path) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;

        Self::list_from_yaml(&content)
    }
}

/// A resolved task inside a [`TaskGraph`](crate::core::TaskGraph)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique within a plan
    pub id: String,

    /// Position in the submitted descriptor list (tie-break key)
    pub index: usize,

    pub kind: TaskKind,

    pub description: String,

    /// Registry name override
    pub capability: Option<String>,

    /// Slots read, deduplicated in declaration order
    pub input_slots: Vec<String>,

    /// Slots written, deduplicated in declaration order
    pub output_slots: Vec<String>,

    /// Explicit dependencies, deduplicated in declaration order
    pub depends_on: Vec<String>,

    pub parameters: Value,

    pub status: TaskStatus,
}

impl Task {
    pub(crate) fn from_descriptor(index: usize, descriptor: TaskDescriptor) -> Self {
        Self {
            id: descriptor
                .id
                .unwrap_or_else(|| format!("task_{}", index)),
            index,
            kind: descriptor.kind,
            description: descriptor.description,
            capability: descriptor.capability,
            input_slots: dedup(descriptor.input_slots),
            output_slots: dedup(descriptor.output_slots),
            depends_on: dedup(descriptor.depends_on),
            parameters: descriptor.parameters,
            status: TaskStatus::Pending,
        }
    }

    /// Registry name used to look up this task's capability
    pub fn capability_name(&self) -> &str {
        self.capability
            .as_deref()
            .unwrap_or_else(|| self.kind.as_str())
    }
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

/// Kinds of work a task can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Extract,
    Transform,
    Analyze,
    Generate,
    Validate,
    /// Catch-all for instructions no other kind matches
    Orchestrate,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Extract => "extract",
            TaskKind::Transform => "transform",
            TaskKind::Analyze => "analyze",
            TaskKind::Generate => "generate",
            TaskKind::Validate => "validate",
            TaskKind::Orchestrate => "orchestrate",
        }
    }
}

impl Default for TaskKind {
    fn default() -> Self {
        Self::Orchestrate
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting on dependencies
    Pending,

    /// All dependencies done
    Ready,

    /// Capability in flight
    Running,

    Done,

    Failed,

    /// A dependency failed; never runs
    Blocked,
}

impl TaskStatus {
    /// Whether the task will not change state again in this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Blocked)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PLAN_YAML: &str = r#"
- id: extract_quotes
  kind: extract
  description: Pull quotes out of the article
  input_slots: [article]
  output_slots: [quotes]

- kind: validate
  input_slots: [quotes]
  output_slots: [checked]
  depends_on: [extract_quotes]
  parameters:
    strict: true
"#;

    #[test]
    fn test_descriptor_parsing() {
        let descriptors = TaskDescriptor::list_from_yaml(TEST_PLAN_YAML).unwrap();

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id.as_deref(), Some("extract_quotes"));
        assert_eq!(descriptors[1].kind, TaskKind::Validate);
        assert!(descriptors[1].id.is_none());
        assert_eq!(descriptors[1].parameters["strict"], Value::Bool(true));
    }

    #[test]
    fn test_descriptor_parsing_json() {
        let json = r#"[{"kind": "generate", "output_slots": ["report"]}]"#;
        let descriptors = TaskDescriptor::list_from_yaml(json).unwrap();

        assert_eq!(descriptors[0].kind, TaskKind::Generate);
        assert_eq!(descriptors[0].output_slots, vec!["report".to_string()]);
    }

    #[test]
    fn test_default_task_id_and_dedup() {
        let descriptor = TaskDescriptor::new(TaskKind::Analyze)
            .inputs(["a", "b", "a"])
            .outputs(["c"]);

        let task = Task::from_descriptor(3, descriptor);

        assert_eq!(task.id, "task_3");
        assert_eq!(task.input_slots, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_capability_name_override() {
        let plain = Task::from_descriptor(0, TaskDescriptor::new(TaskKind::Extract));
        let custom = Task::from_descriptor(
            1,
            TaskDescriptor::new(TaskKind::Extract)
                .capability("citation"),
        );

        assert_eq!(plain.capability_name(), "extract");
        assert_eq!(custom.capability_name(), "citation");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
    }
}
