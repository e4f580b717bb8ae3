use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use armada_core::types::{Allocation, EvalTrigger, Evaluation, Job, NamespacedId};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::{
    derive::{is_child_of, PERIODIC_LAUNCH_SUFFIX},
    dispatcher::JobEvalDispatcher,
    error::Result,
};

#[derive(Debug, Default)]
struct Tables {
    // Ordered so children can be found with a prefix scan over the parent id.
    jobs: BTreeMap<NamespacedId, Job>,
    evals: HashMap<Uuid, Evaluation>,
    allocs: HashMap<Uuid, Allocation>,
}

/// In-process view of jobs, evaluations and allocations.
///
/// Serves as the [`JobEvalDispatcher`] for a single-node deployment: dispatched
/// jobs are registered here together with a pending evaluation, and overlap
/// checks read the same tables.
#[derive(Debug, Default)]
pub struct InMemoryState {
    tables: RwLock<Tables>,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_job(&self, job: Job) {
        self.write().jobs.insert(job.namespaced_id(), job);
    }

    pub fn job(&self, namespace: &str, id: &str) -> Option<Job> {
        self.read()
            .jobs
            .get(&NamespacedId::new(namespace, id))
            .cloned()
    }

    pub fn upsert_evals(&self, evals: impl IntoIterator<Item = Evaluation>) {
        let mut tables = self.write();
        for eval in evals {
            tables.evals.insert(eval.id, eval);
        }
    }

    pub fn upsert_allocs(&self, allocs: impl IntoIterator<Item = Allocation>) {
        let mut tables = self.write();
        for alloc in allocs {
            tables.allocs.insert(alloc.id, alloc);
        }
    }

    pub fn evals_by_job(&self, namespace: &str, job_id: &str) -> Vec<Evaluation> {
        self.read()
            .evals
            .values()
            .filter(|e| e.namespace == namespace && e.job_id == job_id)
            .cloned()
            .collect()
    }

    /// Jobs launched from `parent`, ordered by id.
    pub fn children(&self, parent: &Job) -> Vec<Job> {
        let tables = self.read();
        children_of(&tables, parent).cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn children_of<'a>(tables: &'a Tables, parent: &'a Job) -> impl Iterator<Item = &'a Job> + 'a {
    let start = NamespacedId::new(
        parent.namespace.clone(),
        format!("{}{}", parent.id, PERIODIC_LAUNCH_SUFFIX),
    );
    tables
        .jobs
        .range(start.clone()..)
        .take_while(move |(key, _)| {
            key.namespace == start.namespace && key.id.starts_with(start.id.as_str())
        })
        .map(|(_, job)| job)
        .filter(move |job| is_child_of(job, parent))
}

#[async_trait]
impl JobEvalDispatcher for InMemoryState {
    async fn dispatch_job(&self, job: Job) -> Result<Evaluation> {
        let eval = Evaluation::for_job(&job, EvalTrigger::PeriodicJob);
        let mut tables = self.write();
        debug!(job = %job.namespaced_id(), eval_id = %eval.id, "registered periodic launch");
        tables.jobs.insert(job.namespaced_id(), job);
        tables.evals.insert(eval.id, eval.clone());
        Ok(eval)
    }

    async fn running_children(&self, parent: &Job) -> Result<bool> {
        let tables = self.read();
        for child in children_of(&tables, parent) {
            let live_eval = tables.evals.values().any(|e| {
                e.namespace == child.namespace && e.job_id == child.id && !e.status.is_terminal()
            });
            if live_eval {
                return Ok(true);
            }

            let live_alloc = tables.allocs.values().any(|a| {
                a.namespace == child.namespace && a.job_id == child.id && !a.is_terminal()
            });
            if live_alloc {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
