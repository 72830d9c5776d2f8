//! Plan execution.
//!
//! Walks an execution plan in order, resolving each task's input slots,
//! invoking the capability registered for it and writing the declared
//! outputs back. A failed task blocks all of its transitive dependents;
//! nothing is retried automatically.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::capabilities::{CapabilityRegistry, Invocation};
use crate::config::FailurePolicy;
use crate::domain::{
    HistoryAction, HistoryEntry, RunReport, RunState, SlotKind, Task, TaskDescriptor, TaskStatus,
};

use super::confidence::validate_confidence;
use super::context::OrchestrationContext;
use super::error::{EngineError, EngineResult};
use super::graph::TaskGraph;

/// Executes task graphs against an orchestration context
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    registry: CapabilityRegistry,
}

impl Scheduler {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Build a graph from `descriptors` and execute it
    ///
    /// Construction errors abort before any task runs.
    pub async fn run(
        &self,
        descriptors: Vec<TaskDescriptor>,
        ctx: &mut OrchestrationContext,
    ) -> EngineResult<RunReport> {
        let graph = TaskGraph::build(descriptors, ctx.store()).map_err(|e| {
            error!(error = %e, "Plan rejected");
            e
        })?;

        Ok(self.execute(&graph, ctx).await)
    }

    /// Execute a validated graph in topological order
    #[instrument(skip(self, graph, ctx), fields(tasks = graph.len()))]
    pub async fn execute(&self, graph: &TaskGraph, ctx: &mut OrchestrationContext) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mark = ctx.store.history().mark();
        let policy = ctx.config().failure_policy;
        let plan = graph.topological_order();

        info!(%run_id, plan = %plan.plan_id, "Starting run");
        ctx.store.record(
            HistoryEntry::new(HistoryAction::RunStarted, run_id.to_string())
                .with_detail(format!("order={}", plan.task_ids().join(","))),
        );

        let mut statuses: HashMap<String, TaskStatus> = plan
            .tasks
            .iter()
            .map(|t| (t.id.clone(), TaskStatus::Pending))
            .collect();
        let mut outputs = BTreeMap::new();
        let mut failures: Vec<(String, String)> = Vec::new();

        for task in &plan.tasks {
            if statuses.get(&task.id) == Some(&TaskStatus::Blocked) {
                continue;
            }

            let deps_done = graph
                .dependencies_of(&task.id)
                .iter()
                .all(|d| statuses.get(*d) == Some(&TaskStatus::Done));
            if !deps_done {
                self.block(ctx, &mut statuses, &task.id, "dependency not done");
                continue;
            }

            statuses.insert(task.id.clone(), TaskStatus::Ready);
            debug!(task = %task.id, "Task ready");

            statuses.insert(task.id.clone(), TaskStatus::Running);
            debug!(task = %task.id, kind = %task.kind, "Task started");
            ctx.store
                .record(HistoryEntry::new(HistoryAction::TaskStarted, task.id.clone()));

            let task_start = Instant::now();
            let result = self.run_task(task, graph, ctx).await;
            let duration_ms = task_start.elapsed().as_millis() as u64;

            match result {
                Ok(written) => {
                    statuses.insert(task.id.clone(), TaskStatus::Done);
                    ctx.store.record(
                        HistoryEntry::new(HistoryAction::TaskCompleted, task.id.clone())
                            .with_detail(format!("completed in {}ms", duration_ms)),
                    );
                    outputs.extend(written);
                }
                Err(e) => {
                    error!(task = %task.id, error = %e, "Task failed");
                    statuses.insert(task.id.clone(), TaskStatus::Failed);
                    ctx.store.record(
                        HistoryEntry::new(HistoryAction::TaskFailed, task.id.clone())
                            .with_detail(e.to_string()),
                    );
                    failures.push((task.id.clone(), e.to_string()));

                    for dependent in graph.transitive_dependents(&task.id) {
                        let reason = format!("dependency '{}' failed", task.id);
                        self.block(ctx, &mut statuses, dependent, &reason);
                    }

                    if policy == FailurePolicy::Halt {
                        break;
                    }
                }
            }
        }

        self.finish_run(ctx, run_id, plan, statuses, outputs, failures, mark, started_at)
    }

    /// Resolve inputs, invoke the capability and write outputs
    ///
    /// Outputs are validated in full before any slot is written, so a
    /// failing task leaves the store untouched.
    async fn run_task(
        &self,
        task: &Task,
        graph: &TaskGraph,
        ctx: &mut OrchestrationContext,
    ) -> EngineResult<Vec<(String, Value)>> {
        let capability = self.registry.get(task.capability_name())?;

        let mut inputs = BTreeMap::new();
        for slot in &task.input_slots {
            inputs.insert(slot.clone(), ctx.store.read(slot)?.content.clone());
        }

        let invocation = Invocation {
            task_id: task.id.clone(),
            kind: task.kind,
            description: task.description.clone(),
            parameters: task.parameters.clone(),
            inputs,
            outputs: task.output_slots.clone(),
        };

        let mut output = capability
            .invoke(&invocation)
            .await
            .map_err(|e| EngineError::CapabilityFailed {
                task: task.id.clone(),
                message: format!("{:#}", e),
            })?;

        if let Some(missing) = task
            .output_slots
            .iter()
            .find(|s| !output.values.contains_key(*s))
        {
            return Err(EngineError::CapabilityFailed {
                task: task.id.clone(),
                message: format!("did not produce declared output '{}'", missing),
            });
        }

        let confidence = output.confidence.unwrap_or(1.0);
        validate_confidence(confidence)?;

        for extra in output.values.keys().filter(|k| !task.output_slots.contains(k)) {
            warn!(task = %task.id, slot = %extra, "Ignoring undeclared capability output");
        }

        let mut written = Vec::with_capacity(task.output_slots.len());
        for slot in &task.output_slots {
            let value = output.values.remove(slot).unwrap_or(Value::Null);

            if ctx.store.contains(slot) {
                ctx.store.update(slot, value.clone())?;
            } else {
                let kind = if graph.is_consumed(slot, &task.id) {
                    SlotKind::Intermediate
                } else {
                    SlotKind::Output
                };
                let metadata = BTreeMap::from([
                    ("task_id".to_string(), Value::from(task.id.clone())),
                    ("task_kind".to_string(), Value::from(task.kind.as_str())),
                ]);
                ctx.store
                    .allocate_with_metadata(slot, kind, value.clone(), metadata)?;
            }

            written.push((slot.clone(), value));
        }

        if ctx.config().track_confidence {
            let reasoning = output
                .reasoning
                .take()
                .unwrap_or_else(|| format!("wrote {}", task.output_slots.join(", ")));
            ctx.thoughts
                .add_step(format!("{} ({})", task.id, task.kind), reasoning, confidence)?;
        }

        Ok(written)
    }

    /// Mark a task Blocked unless it already reached a terminal state
    fn block(
        &self,
        ctx: &mut OrchestrationContext,
        statuses: &mut HashMap<String, TaskStatus>,
        task_id: &str,
        reason: &str,
    ) {
        let already_terminal = statuses
            .get(task_id)
            .map(|s| s.is_terminal())
            .unwrap_or(false);
        if already_terminal {
            return;
        }

        warn!(task = %task_id, %reason, "Task blocked");
        statuses.insert(task_id.to_string(), TaskStatus::Blocked);
        ctx.store.record(
            HistoryEntry::new(HistoryAction::TaskBlocked, task_id).with_detail(reason),
        );
    }

    /// Assemble the run report and log the run outcome
    #[allow(clippy::too_many_arguments)]
    fn finish_run(
        &self,
        ctx: &mut OrchestrationContext,
        run_id: Uuid,
        mut plan: super::graph::ExecutionPlan,
        statuses: HashMap<String, TaskStatus>,
        outputs: BTreeMap<String, Value>,
        failures: Vec<(String, String)>,
        mark: u64,
        started_at: chrono::DateTime<Utc>,
    ) -> RunReport {
        for task in &mut plan.tasks {
            task.status = statuses
                .get(&task.id)
                .copied()
                .unwrap_or(TaskStatus::Pending);
        }
        let ordered: Vec<(String, TaskStatus)> = plan
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.status))
            .collect();

        let remaining: Vec<String> = ordered
            .iter()
            .filter(|(_, s)| matches!(s, TaskStatus::Pending | TaskStatus::Blocked))
            .map(|(id, _)| id.clone())
            .collect();

        let state = if ordered.iter().all(|(_, s)| *s == TaskStatus::Done) {
            info!(%run_id, "Run completed successfully");
            ctx.store
                .record(HistoryEntry::new(HistoryAction::RunCompleted, run_id.to_string()));
            RunState::Completed
        } else {
            warn!(
                %run_id,
                failed = failures.len(),
                remaining = remaining.len(),
                "Run finished with failed or blocked tasks"
            );
            ctx.store.record(
                HistoryEntry::new(HistoryAction::RunPartial, run_id.to_string())
                    .with_detail(format!(
                        "failed={} remaining={}",
                        failures.len(),
                        remaining.len()
                    )),
            );
            RunState::Partial
        };

        let (thoughts, low_confidence_steps) = if ctx.config().track_confidence {
            let low = ctx
                .thoughts
                .low_confidence_steps(ctx.config().confidence_threshold)
                .iter()
                .map(|s| s.id)
                .collect();
            (Some(ctx.thoughts.steps().to_vec()), low)
        } else {
            (None, Vec::new())
        };

        RunReport {
            run_id,
            plan,
            statuses: ordered,
            outputs,
            failed_task: failures.first().map(|(id, _)| id.clone()),
            failures,
            remaining,
            history: ctx.store.history().since(mark),
            thoughts,
            low_confidence_steps,
            state,
            started_at,
            completed_at: Utc::now(),
        }
    }
}
