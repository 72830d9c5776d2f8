//! Lock-mediated access to one orchestration context from many tasks.
//!
//! Runs and backtracks hold the write lock for their whole duration.
//! Checkpoint create/restore never wait for it: if anything else holds
//! the lock they fail with [`EngineError::StoreLocked`].

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::domain::{RunReport, TaskDescriptor};

use super::backtrack::BacktrackController;
use super::checkpoint::CheckpointSummary;
use super::context::OrchestrationContext;
use super::error::{EngineError, EngineResult};
use super::scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct SharedContext {
    inner: Arc<RwLock<OrchestrationContext>>,
}

impl SharedContext {
    pub fn new(ctx: OrchestrationContext) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ctx)),
        }
    }

    /// Shared read access; waits for any in-progress run to finish
    pub async fn read(&self) -> RwLockReadGuard<'_, OrchestrationContext> {
        self.inner.read().await
    }

    /// Execute `descriptors` under the write lock
    pub async fn run(
        &self,
        scheduler: &Scheduler,
        descriptors: Vec<TaskDescriptor>,
    ) -> EngineResult<RunReport> {
        let mut ctx = self.inner.write().await;
        scheduler.run(descriptors, &mut ctx).await
    }

    /// Backtrack and re-execute under the write lock
    pub async fn backtrack_and_retry(
        &self,
        scheduler: &Scheduler,
        checkpoint_id: &str,
        new_descriptors: Vec<TaskDescriptor>,
    ) -> EngineResult<RunReport> {
        let mut ctx = self.inner.write().await;
        BacktrackController::new(scheduler)
            .backtrack_and_retry(&mut ctx, checkpoint_id, new_descriptors)
            .await
    }

    /// Create a checkpoint, or fail with `StoreLocked` if the context is busy
    pub fn try_checkpoint(&self, id: &str, description: &str) -> EngineResult<CheckpointSummary> {
        let mut ctx = self.inner.try_write().map_err(|_| {
            debug!(checkpoint = %id, "Checkpoint refused; context is locked");
            EngineError::StoreLocked
        })?;
        ctx.checkpoint(id, description)
    }

    /// Restore a checkpoint, or fail with `StoreLocked` if the context is busy
    pub fn try_restore(&self, id: &str) -> EngineResult<()> {
        let mut ctx = self.inner.try_write().map_err(|_| {
            debug!(checkpoint = %id, "Restore refused; context is locked");
            EngineError::StoreLocked
        })?;
        ctx.restore(id)
    }
}
