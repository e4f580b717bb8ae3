use async_trait::async_trait;

use armada_core::types::{Evaluation, Job};

use crate::error::Result;

/// The capability the periodic dispatcher needs from the rest of the
/// orchestrator: create a run of a job, and report whether earlier runs of a
/// periodic job are still alive.
///
/// Implementations must be `Send + Sync`; they are called from the dispatch
/// loop task and from `force_eval` callers concurrently, never while the
/// dispatcher holds its internal lock, so they may call back into it.
#[async_trait]
pub trait JobEvalDispatcher: Send + Sync {
    /// Register `job` (already derived from its periodic parent) and create an
    /// evaluation for it.
    async fn dispatch_job(&self, job: Job) -> Result<Evaluation>;

    /// Whether any child launched from `parent` still has a non-terminal
    /// evaluation or allocation.
    async fn running_children(&self, parent: &Job) -> Result<bool>;
}
