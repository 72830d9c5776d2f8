//! Task Graph Integration Tests
//!
//! Tests for plan determinism, cycle reporting and descriptor loading.

use serde_json::json;
use slotflow::core::{EngineError, SlotStore, TaskGraph};
use slotflow::domain::{SlotKind, TaskDescriptor, TaskKind};

fn seeded_store() -> SlotStore {
    let mut store = SlotStore::new();
    store.allocate("doc", SlotKind::Context, json!("text")).unwrap();
    store
}

#[test]
fn test_plan_is_deterministic_across_builds() {
    let descriptors = || {
        vec![
            TaskDescriptor::new(TaskKind::Generate)
                .id("report")
                .inputs(["summary", "facts"])
                .outputs(["out"]),
            TaskDescriptor::new(TaskKind::Extract)
                .id("facts")
                .inputs(["doc"])
                .outputs(["facts"]),
            TaskDescriptor::new(TaskKind::Transform)
                .id("summary")
                .inputs(["doc"])
                .outputs(["summary"]),
            TaskDescriptor::new(TaskKind::Validate)
                .id("check")
                .inputs(["out"]),
        ]
    };
    let store = seeded_store();

    let first = TaskGraph::build(descriptors(), &store)
        .unwrap()
        .topological_order();
    for _ in 0..10 {
        let again = TaskGraph::build(descriptors(), &store)
            .unwrap()
            .topological_order();
        assert_eq!(again.task_ids(), first.task_ids());
    }

    assert_eq!(first.task_ids(), vec!["facts", "summary", "report", "check"]);
}

#[test]
fn test_every_dependency_precedes_its_dependent() {
    let store = seeded_store();
    let graph = TaskGraph::build(
        vec![
            TaskDescriptor::new(TaskKind::Analyze)
                .id("d")
                .depends_on(["b", "c"]),
            TaskDescriptor::new(TaskKind::Analyze)
                .id("c")
                .depends_on(["a"]),
            TaskDescriptor::new(TaskKind::Analyze)
                .id("b")
                .depends_on(["a"]),
            TaskDescriptor::new(TaskKind::Extract)
                .id("a")
                .inputs(["doc"]),
        ],
        &store,
    )
    .unwrap();
    let plan = graph.topological_order();

    for task in graph.tasks() {
        for dep in graph.dependencies_of(&task.id) {
            assert!(plan.position(dep) < plan.position(&task.id));
        }
    }
    assert_eq!(plan.task_ids(), vec!["a", "c", "b", "d"]);
}

#[test]
fn test_slot_cycle_detected_before_execution() {
    let store = SlotStore::new();
    let err = TaskGraph::build(
        vec![
            TaskDescriptor::new(TaskKind::Transform)
                .id("a")
                .inputs(["y"])
                .outputs(["x"]),
            TaskDescriptor::new(TaskKind::Transform)
                .id("b")
                .inputs(["x"])
                .outputs(["y"]),
        ],
        &store,
    )
    .unwrap_err();

    assert!(err.is_construction_error());
    match err {
        EngineError::CyclicDependency { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn test_default_ids_from_yaml() {
    let yaml = r#"
- kind: extract
  description: pull names
  input_slots: [doc]
  output_slots: [names]
- kind: generate
  input_slots: [names]
  output_slots: [letter]
  parameters:
    tone: formal
"#;

    let descriptors = TaskDescriptor::list_from_yaml(yaml).unwrap();
    let graph = TaskGraph::build(descriptors, &seeded_store()).unwrap();

    assert_eq!(graph.topological_order().task_ids(), vec!["task_0", "task_1"]);
    assert_eq!(graph.dependencies_of("task_1"), vec!["task_0"]);
    assert_eq!(graph.task("task_1").unwrap().parameters["tone"], json!("formal"));
}

#[test]
fn test_unknown_kind_rejected_when_loading() {
    let yaml = r#"
- kind: summon
  output_slots: [x]
"#;
    assert!(TaskDescriptor::list_from_yaml(yaml).is_err());
}
