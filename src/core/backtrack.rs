//! Checkpoint-restore-and-replan recovery.

use std::collections::HashSet;

use tracing::{info, instrument};

use crate::domain::{HistoryAction, HistoryEntry, RunReport, TaskDescriptor};

use super::confidence::GateVerdict;
use super::context::OrchestrationContext;
use super::error::EngineResult;
use super::graph::TaskGraph;
use super::scheduler::Scheduler;

/// Drives backtrack-and-retry on top of a scheduler
///
/// Nothing here runs on its own: the caller inspects a run (usually via
/// [`should_backtrack`](Self::should_backtrack)) and decides whether to
/// call [`backtrack_and_retry`](Self::backtrack_and_retry).
#[derive(Debug, Clone, Copy)]
pub struct BacktrackController<'s> {
    scheduler: &'s Scheduler,
}

impl<'s> BacktrackController<'s> {
    pub fn new(scheduler: &'s Scheduler) -> Self {
        Self { scheduler }
    }

    /// Evaluate the context's thought chain against its configured threshold
    pub fn should_backtrack(&self, ctx: &OrchestrationContext) -> GateVerdict {
        ctx.gate().evaluate(ctx.thoughts())
    }

    /// Restore `checkpoint_id`, drop every thought step created after it,
    /// then build and execute `new_descriptors`
    ///
    /// The new plan is validated against the checkpoint's slots before the
    /// restore happens, so an unknown checkpoint or a plan that fails to
    /// build leaves the context untouched.
    #[instrument(skip(self, ctx, checkpoint_id, new_descriptors), fields(checkpoint = %checkpoint_id))]
    pub async fn backtrack_and_retry(
        &self,
        ctx: &mut OrchestrationContext,
        checkpoint_id: &str,
        new_descriptors: Vec<TaskDescriptor>,
    ) -> EngineResult<RunReport> {
        let (snapshot_ids, marker) = {
            let checkpoint = ctx.checkpoints.get(checkpoint_id)?;
            let ids: HashSet<String> = checkpoint.slots().iter().map(|s| s.id.clone()).collect();
            (ids, checkpoint.thought_mark())
        };

        let graph = TaskGraph::build_against(new_descriptors, |slot| snapshot_ids.contains(slot))?;

        ctx.checkpoints.restore(&mut ctx.store, checkpoint_id)?;
        let discarded = ctx.thoughts.truncate_to(marker);

        info!(
            discarded_steps = discarded.len(),
            retained_steps = ctx.thoughts.len(),
            "Backtracked; re-executing revised plan"
        );
        ctx.store.record(
            HistoryEntry::new(HistoryAction::Backtracked, checkpoint_id).with_detail(format!(
                "discarded {} thought step(s), replanned {} task(s)",
                discarded.len(),
                graph.len()
            )),
        );

        Ok(self.scheduler.execute(&graph, ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityRegistry, FnCapability};
    use crate::core::EngineError;
    use crate::domain::TaskKind;
    use serde_json::json;
    use std::sync::Arc;

    fn scheduler() -> Scheduler {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_for_kind(
                TaskKind::Analyze,
                Arc::new(FnCapability::new("analyze", "scores by parameter", |inv| {
                    let score = inv.parameters["score"].as_f64().unwrap_or(1.0);
                    Ok(inv.respond(json!(score)).with_confidence(score))
                })),
            )
            .unwrap();
        Scheduler::new(registry)
    }

    fn analyze(id: &str, score: f64) -> TaskDescriptor {
        TaskDescriptor::new(TaskKind::Analyze)
            .id(id)
            .inputs(["doc"])
            .outputs(["verdict"])
            .parameters(json!({ "score": score }))
    }

    #[tokio::test]
    async fn test_failed_plan_build_leaves_context_untouched() {
        let scheduler = scheduler();
        let controller = BacktrackController::new(&scheduler);
        let mut ctx = OrchestrationContext::new();
        ctx.checkpoint("empty", "before doc").unwrap();
        ctx.add_context("doc", json!("text")).unwrap();
        let before = ctx.store().fingerprint();

        // "doc" is not part of the checkpoint, so the plan cannot resolve it
        let err = controller
            .backtrack_and_retry(&mut ctx, "empty", vec![analyze("a", 0.9)])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::UnresolvedInput { .. }));
        assert_eq!(ctx.store().fingerprint(), before);
        assert!(ctx
            .store()
            .history()
            .last_of(HistoryAction::Backtracked)
            .is_none());
    }

    #[tokio::test]
    async fn test_should_backtrack_uses_config_threshold() {
        let scheduler = scheduler();
        let controller = BacktrackController::new(&scheduler);
        let mut ctx = OrchestrationContext::new();
        ctx.add_context("doc", json!("text")).unwrap();

        scheduler.run(vec![analyze("a", 0.5)], &mut ctx).await.unwrap();

        assert_eq!(
            controller.should_backtrack(&ctx),
            GateVerdict::Backtrack { low_steps: vec![0] }
        );
    }
}
