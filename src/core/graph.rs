//! Task dependency graph and deterministic execution plans.
//!
//! Edges are the union of explicit `depends_on` edges and implicit
//! producer -> consumer edges inferred from shared slot names. Graph
//! construction fails on cycles and unresolved inputs, before anything runs.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Task, TaskDescriptor};

use super::error::{EngineError, EngineResult, Resource};
use super::slot_store::SlotStore;

/// Validated DAG of tasks
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Tasks in declaration order
    tasks: Vec<Task>,

    /// Task id -> declaration index
    index: HashMap<String, usize>,

    /// i -> tasks that must run after i
    successors: Vec<BTreeSet<usize>>,

    /// i -> tasks that must run before i
    predecessors: Vec<BTreeSet<usize>>,
}

impl TaskGraph {
    /// Build and validate a graph against the slots already in `store`
    pub fn build(descriptors: Vec<TaskDescriptor>, store: &SlotStore) -> EngineResult<Self> {
        Self::build_against(descriptors, |slot| store.contains(slot))
    }

    /// Build with an arbitrary "slot exists" predicate
    ///
    /// Used to validate a plan against a checkpoint snapshot before the
    /// snapshot is restored.
    pub(crate) fn build_against<F>(
        descriptors: Vec<TaskDescriptor>,
        has_slot: F,
    ) -> EngineResult<Self>
    where
        F: Fn(&str) -> bool,
    {
        let tasks: Vec<Task> = descriptors
            .into_iter()
            .enumerate()
            .map(|(i, d)| Task::from_descriptor(i, d))
            .collect();

        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(EngineError::DuplicateTask(task.id.clone()));
            }
        }

        let mut writers: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            for slot in &task.output_slots {
                writers.entry(slot.as_str()).or_default().push(i);
            }
        }

        let n = tasks.len();
        let mut successors = vec![BTreeSet::new(); n];
        let mut predecessors = vec![BTreeSet::new(); n];

        for (j, task) in tasks.iter().enumerate() {
            for dep in &task.depends_on {
                let i = *index.get(dep).ok_or_else(|| EngineError::NotFound {
                    resource: Resource::Task,
                    id: dep.clone(),
                })?;
                successors[i].insert(j);
                predecessors[j].insert(i);
            }

            for slot in &task.input_slots {
                // A task rewriting its own input is an in-place transform, not an edge
                let producers: Vec<usize> = writers
                    .get(slot.as_str())
                    .map(|w| w.iter().copied().filter(|&i| i != j).collect())
                    .unwrap_or_default();

                if producers.is_empty() && !has_slot(slot) {
                    return Err(EngineError::UnresolvedInput {
                        task: task.id.clone(),
                        slot: slot.clone(),
                    });
                }

                for i in producers {
                    successors[i].insert(j);
                    predecessors[j].insert(i);
                }
            }
        }

        let graph = Self {
            tasks,
            index,
            successors,
            predecessors,
        };

        if let Some(cycle) = graph.find_cycle() {
            return Err(EngineError::CyclicDependency { cycle });
        }

        Ok(graph)
    }

    /// DFS coloring; returns one cycle as task ids, first id repeated at the end
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.tasks.len();
        let mut color = vec![Color::White; n];

        for root in 0..n {
            if color[root] != Color::White {
                continue;
            }

            // Explicit stack of (node, successors still to visit)
            let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();
            color[root] = Color::Gray;
            stack.push((root, self.successors[root].iter().rev().copied().collect()));

            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                match pending.pop() {
                    Some(next) => match color[next] {
                        Color::White => {
                            color[next] = Color::Gray;
                            let succ = self.successors[next].iter().rev().copied().collect();
                            stack.push((next, succ));
                        }
                        Color::Gray => {
                            let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            let mut cycle: Vec<String> = stack[start..]
                                .iter()
                                .map(|(n, _)| self.tasks[*n].id.clone())
                                .collect();
                            cycle.push(self.tasks[next].id.clone());
                            return Some(cycle);
                        }
                        Color::Black => {}
                    },
                    None => {
                        color[node] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// Kahn's algorithm, ties broken by ascending declaration index
    pub fn topological_order(&self) -> ExecutionPlan {
        let n = self.tasks.len();
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(|p| p.len()).collect();

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(self.tasks[i].clone());
            for &j in &self.successors[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.push(Reverse(j));
                }
            }
        }

        ExecutionPlan {
            plan_id: format!("plan_{}", Uuid::new_v4()),
            tasks: order,
        }
    }

    /// Tasks in declaration order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Direct predecessors (explicit and implicit), in declaration order
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.predecessors)
    }

    /// Direct successors (explicit and implicit), in declaration order
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.successors)
    }

    fn neighbours<'a>(&'a self, id: &str, edges: &'a [BTreeSet<usize>]) -> Vec<&'a str> {
        self.index
            .get(id)
            .map(|&i| edges[i].iter().map(|&j| self.tasks[j].id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Every task reachable from `id`, in declaration order
    pub fn transitive_dependents(&self, id: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            for &j in &self.successors[i] {
                if seen.insert(j) {
                    stack.push(j);
                }
            }
        }

        seen.into_iter()
            .map(|j| self.tasks[j].id.as_str())
            .collect()
    }

    /// Whether any task other than `writer` reads `slot`
    pub fn is_consumed(&self, slot: &str, writer: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.id != writer && t.input_slots.iter().any(|s| s == slot))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Tasks in a valid topological order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: String,

    /// Tasks in execution order
    pub tasks: Vec<Task>,
}

impl ExecutionPlan {
    /// Task ids in execution order
    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    /// Position of a task in the plan
    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Execution Plan ===")?;
        writeln!(f, "Plan ID: {}", self.plan_id)?;
        writeln!(f, "Total Tasks: {}", self.tasks.len())?;

        for (n, task) in self.tasks.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "{}. {} ({})", n + 1, task.id, task.kind)?;
            if !task.description.is_empty() {
                writeln!(f, "   Description: {}", task.description)?;
            }
            let inputs = if task.input_slots.is_empty() {
                "None".to_string()
            } else {
                task.input_slots.join(", ")
            };
            writeln!(f, "   Input Slots: {}", inputs)?;
            writeln!(f, "   Output Slots: {}", task.output_slots.join(", "))?;
            if !task.depends_on.is_empty() {
                writeln!(f, "   Dependencies: {}", task.depends_on.join(", "))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SlotKind, TaskKind};
    use serde_json::json;

    fn desc(id: &str, kind: TaskKind) -> TaskDescriptor {
        TaskDescriptor::new(kind).id(id)
    }

    #[test]
    fn test_explicit_dependency_order() {
        let store = SlotStore::new();
        let graph = TaskGraph::build(
            vec![
                desc("b", TaskKind::Analyze).depends_on(["a"]),
                desc("a", TaskKind::Extract),
            ],
            &store,
        )
        .unwrap();

        assert_eq!(graph.topological_order().task_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_implicit_slot_edges() {
        let mut store = SlotStore::new();
        store.allocate("doc", SlotKind::Context, json!("text")).unwrap();

        let graph = TaskGraph::build(
            vec![
                desc("report", TaskKind::Generate)
                    .inputs(["summary"])
                    .outputs(["out"]),
                desc("summarize", TaskKind::Transform)
                    .inputs(["doc"])
                    .outputs(["summary"]),
            ],
            &store,
        )
        .unwrap();

        assert_eq!(graph.dependencies_of("report"), vec!["summarize"]);
        assert_eq!(graph.topological_order().task_ids(), vec!["summarize", "report"]);
    }

    #[test]
    fn test_independent_tasks_keep_declaration_order() {
        let store = SlotStore::new();
        let graph = TaskGraph::build(
            vec![
                desc("z", TaskKind::Generate).outputs(["s1"]),
                desc("y", TaskKind::Generate).outputs(["s2"]),
                desc("x", TaskKind::Generate).outputs(["s3"]),
            ],
            &store,
        )
        .unwrap();

        assert_eq!(graph.topological_order().task_ids(), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_cycle_is_named() {
        let store = SlotStore::new();
        let err = TaskGraph::build(
            vec![
                desc("a", TaskKind::Analyze).depends_on(["c"]),
                desc("b", TaskKind::Analyze).depends_on(["a"]),
                desc("c", TaskKind::Analyze).depends_on(["b"]),
            ],
            &store,
        )
        .unwrap_err();

        match err {
            EngineError::CyclicDependency { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let store = SlotStore::new();
        let err = TaskGraph::build(vec![desc("a", TaskKind::Analyze).depends_on(["a"])], &store)
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::CyclicDependency {
                cycle: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_in_place_transform_is_not_a_cycle() {
        let mut store = SlotStore::new();
        store.allocate("text", SlotKind::Context, json!(" x ")).unwrap();

        let graph = TaskGraph::build(
            vec![desc("clean", TaskKind::Transform)
                .inputs(["text"])
                .outputs(["text"])],
            &store,
        )
        .unwrap();

        assert!(graph.dependencies_of("clean").is_empty());
    }

    #[test]
    fn test_unresolved_input() {
        let store = SlotStore::new();
        let err = TaskGraph::build(vec![desc("a", TaskKind::Analyze).inputs(["ghost"])], &store)
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::UnresolvedInput {
                task: "a".into(),
                slot: "ghost".into()
            }
        );
    }

    #[test]
    fn test_unknown_dependency_and_duplicate_ids() {
        let store = SlotStore::new();

        let err = TaskGraph::build(vec![desc("a", TaskKind::Analyze).depends_on(["nope"])], &store)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound {
                resource: Resource::Task,
                ..
            }
        ));

        let err = TaskGraph::build(
            vec![desc("a", TaskKind::Analyze), desc("a", TaskKind::Extract)],
            &store,
        )
        .unwrap_err();
        assert_eq!(err, EngineError::DuplicateTask("a".into()));
    }

    #[test]
    fn test_transitive_dependents() {
        let store = SlotStore::new();
        let graph = TaskGraph::build(
            vec![
                desc("a", TaskKind::Extract).outputs(["s1"]),
                desc("b", TaskKind::Analyze).inputs(["s1"]).outputs(["s2"]),
                desc("c", TaskKind::Generate).inputs(["s2"]),
                desc("d", TaskKind::Generate),
            ],
            &store,
        )
        .unwrap();

        assert_eq!(graph.transitive_dependents("a"), vec!["b", "c"]);
        assert!(graph.transitive_dependents("d").is_empty());
        assert!(graph.is_consumed("s1", "a"));
        assert!(!graph.is_consumed("s2", "c"));
    }

    #[test]
    fn test_plan_display() {
        let store = SlotStore::new();
        let graph = TaskGraph::build(
            vec![desc("a", TaskKind::Extract)
                .description("pull quotes")
                .outputs(["q"])],
            &store,
        )
        .unwrap();

        let rendered = graph.topological_order().to_string();
        assert!(rendered.contains("1. a (extract)"));
        assert!(rendered.contains("Input Slots: None"));
        assert!(rendered.contains("Output Slots: q"));
    }
}
