use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use armada_core::{
    config::PeriodicDispatchConfig,
    types::{Evaluation, Job, NamespacedId},
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::{
    derive::derive_child,
    dispatcher::JobEvalDispatcher,
    error::{PeriodicError, Result},
    heap::DispatchHeap,
    launch::LaunchTimeTable,
    schedule::{next_launch, parse_time_zone},
};

/// Tracks periodic jobs and launches a child job each time one comes due.
///
/// All bookkeeping (registry, heap, launch table) lives behind one lock. A
/// single background task, started by [`set_enabled(true)`](Self::set_enabled),
/// sleeps until the earliest launch or until `add`/`remove` signal a change.
/// The [`JobEvalDispatcher`] is only ever called with the lock released.
pub struct PeriodicDispatch {
    shared: Arc<Shared>,
}

struct Shared {
    dispatcher: Arc<dyn JobEvalDispatcher>,
    default_tz: Tz,
    call_timeout: Duration,
    state: Mutex<DispatchState>,
    /// "Something changed, recompute your deadline." Carries no payload.
    update: Notify,
}

#[derive(Default)]
struct DispatchState {
    enabled: bool,
    tracked: HashMap<NamespacedId, Arc<Job>>,
    heap: DispatchHeap,
    launches: LaunchTimeTable,
    /// Present while the loop runs; sending `true` stops it.
    shutdown: Option<watch::Sender<bool>>,
}

impl DispatchState {
    fn untrack(&mut self, key: &NamespacedId) -> bool {
        self.heap.remove(key);
        self.tracked.remove(key).is_some()
    }

    fn flush(&mut self) {
        self.tracked.clear();
        self.heap.clear();
        self.launches.clear();
    }
}

impl PeriodicDispatch {
    /// Create a disabled dispatcher. Call [`set_enabled`](Self::set_enabled)
    /// from within a Tokio runtime to start launching.
    pub fn new(dispatcher: Arc<dyn JobEvalDispatcher>, config: &PeriodicDispatchConfig) -> Self {
        let default_tz = parse_time_zone(&config.default_time_zone).unwrap_or_else(|e| {
            warn!("{e}; cron schedules without a time zone will use UTC");
            Tz::UTC
        });

        Self {
            shared: Arc::new(Shared {
                dispatcher,
                default_tz,
                call_timeout: Duration::from_millis(config.dispatch_timeout_ms),
                state: Mutex::new(DispatchState::default()),
                update: Notify::new(),
            }),
        }
    }

    /// Start or stop the dispatcher. Repeating the current state is a no-op.
    ///
    /// Disabling stops the loop and forgets every tracked job and launch;
    /// callers re-populate with [`add`](Self::add) after enabling again.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.shared.lock();
        if state.enabled == enabled {
            return;
        }
        state.enabled = enabled;

        if enabled {
            let (tx, rx) = watch::channel(false);
            state.shutdown = Some(tx);
            tokio::spawn(run(Arc::clone(&self.shared), rx));
            info!("periodic dispatch enabled");
        } else {
            if let Some(tx) = state.shutdown.take() {
                let _ = tx.send(true);
            }
            state.flush();
            info!("periodic dispatch disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    /// Start tracking `job`, update it if already tracked, or untrack it if it
    /// is no longer an active periodic job.
    ///
    /// A malformed schedule is rejected before anything changes.
    pub fn add(&self, job: Job) -> Result<()> {
        let key = job.namespaced_id();

        let Some(periodic) = job.periodic.as_ref().filter(|_| job.is_periodic_active()) else {
            if self.shared.lock().untrack(&key) {
                debug!(job = %key, "job is no longer an active periodic job; untracked");
                self.shared.update.notify_one();
            }
            return Ok(());
        };

        let next = next_launch(periodic, Utc::now(), self.shared.default_tz)?;
        let job = Arc::new(job);

        let mut state = self.shared.lock();
        if state.tracked.get(&key).is_some_and(|tracked| *tracked == job) {
            return Ok(());
        }

        if state.tracked.insert(key.clone(), Arc::clone(&job)).is_some() {
            debug!(job = %key, "periodic job updated");
        } else {
            state.launches.forget(&key);
            debug!(job = %key, "periodic job tracked");
        }

        match next {
            Some(next) => state.heap.push(job, next),
            None => {
                state.heap.remove(&key);
                debug!(job = %key, "periodic job has no future launch");
            }
        }
        drop(state);

        self.shared.update.notify_one();
        Ok(())
    }

    /// Stop tracking a job. Unknown jobs are ignored.
    pub fn remove(&self, namespace: &str, id: &str) -> Result<()> {
        let key = NamespacedId::new(namespace, id);
        if self.shared.lock().untrack(&key) {
            debug!(job = %key, "periodic job untracked");
            self.shared.update.notify_one();
        }
        Ok(())
    }

    /// Launch a tracked job right now, outside its schedule.
    ///
    /// Goes through the same overlap check as a scheduled launch; returns
    /// `Ok(None)` when the launch was skipped because children are still
    /// running. The job's next scheduled launch is left untouched.
    pub async fn force_eval(&self, namespace: &str, id: &str) -> Result<Option<Evaluation>> {
        let job = {
            let state = self.shared.lock();
            if !state.enabled {
                return Err(PeriodicError::Disabled);
            }
            state
                .tracked
                .get(&NamespacedId::new(namespace, id))
                .cloned()
                .ok_or_else(|| PeriodicError::JobNotTracked {
                    namespace: namespace.to_string(),
                    id: id.to_string(),
                })?
        };

        // Whole seconds, so the child id encodes the launch exactly.
        let now = Utc::now();
        let launch = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        self.shared.launch(&job, launch).await
    }

    /// Snapshot of every tracked job definition.
    pub fn tracked(&self) -> Vec<Job> {
        self.shared
            .lock()
            .tracked
            .values()
            .map(|job| Job::clone(job))
            .collect()
    }

    /// The most recent launch of a job.
    pub fn launch_time(&self, namespace: &str, id: &str) -> Result<DateTime<Utc>> {
        self.shared
            .lock()
            .launches
            .get(&NamespacedId::new(namespace, id))
            .ok_or_else(|| PeriodicError::LaunchNotFound {
                namespace: namespace.to_string(),
                id: id.to_string(),
            })
    }

    /// When a tracked job will next launch, if it is scheduled at all.
    pub fn scheduled_launch(&self, namespace: &str, id: &str) -> Option<DateTime<Utc>> {
        self.shared
            .lock()
            .heap
            .get(&NamespacedId::new(namespace, id))
            .map(|entry| entry.next)
    }
}

impl Drop for PeriodicDispatch {
    fn drop(&mut self) {
        if let Some(tx) = self.shared.lock().shutdown.take() {
            let _ = tx.send(true);
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How long until the earliest launch; `None` when nothing is scheduled.
    fn next_wait(&self) -> Option<Duration> {
        let state = self.lock();
        state
            .heap
            .peek_instant()
            .map(|next| (next - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Pop every launch that is due and reschedule each job.
    ///
    /// Follow-up launches are computed from the launch instant rather than
    /// from now, so instants missed while the process was stalled are still
    /// produced, in order, within this same pass.
    fn take_due(&self, shutdown: &watch::Receiver<bool>) -> Vec<(NamespacedId, DateTime<Utc>)> {
        let mut state = self.lock();
        if !state.enabled || *shutdown.borrow() {
            return Vec::new();
        }

        let now = Utc::now();
        let mut due = Vec::new();
        while state.heap.peek_instant().is_some_and(|next| next <= now) {
            let Some(entry) = state.heap.pop() else {
                break;
            };
            let key = entry.key().clone();

            match self.following_launch(&entry.job, entry.next) {
                Some(next) => state.heap.push(Arc::clone(&entry.job), next),
                None => debug!(job = %key, "periodic job has no future launch"),
            }
            due.push((key, entry.next));
        }
        due
    }

    fn following_launch(&self, job: &Job, launch: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let periodic = job.periodic.as_ref()?;
        match next_launch(periodic, launch, self.default_tz) {
            Ok(next) => next,
            Err(e) => {
                error!(job = %job.namespaced_id(), error = %e, "failed to compute next periodic launch");
                None
            }
        }
    }

    fn tracked_job(&self, key: &NamespacedId) -> Option<Arc<Job>> {
        self.lock().tracked.get(key).cloned()
    }

    /// Run the dispatch decision for one launch of `job`.
    async fn launch(&self, job: &Job, launch: DateTime<Utc>) -> Result<Option<Evaluation>> {
        let key = job.namespaced_id();

        if job.periodic.as_ref().is_some_and(|p| p.prohibit_overlap) {
            let running = self.call(self.dispatcher.running_children(job)).await?;
            if running {
                debug!(job = %key, %launch, "skipping launch: previous run still active");
                return Ok(None);
            }
        }

        let child = derive_child(job, launch);
        let eval = self.call(self.dispatcher.dispatch_job(child)).await?;

        {
            // A disable that raced this launch has already flushed the table.
            let mut state = self.lock();
            if state.enabled {
                state.launches.record(key.clone(), launch);
            }
        }
        debug!(job = %key, %launch, eval_id = %eval.id, "periodic job launched");
        Ok(Some(eval))
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| PeriodicError::Timeout {
                ms: self.call_timeout.as_millis() as u64,
            })?
    }
}

/// Dispatch loop. Runs until the dispatcher is disabled or dropped.
async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    info!("periodic dispatch loop started");

    loop {
        let wait = shared.next_wait();
        let deadline = async move {
            match wait {
                Some(wait) => tokio::time::sleep(wait).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = shared.update.notified() => {}
            _ = deadline => {
                for (key, launch) in shared.take_due(&shutdown) {
                    // Removed or replaced-by-ineligible between pop and now.
                    let Some(job) = shared.tracked_job(&key) else {
                        continue;
                    };
                    if let Err(e) = shared.launch(&job, launch).await {
                        error!(job = %key, %launch, error = %e, "periodic launch failed");
                    }
                }
            }
        }
    }

    info!("periodic dispatch loop stopped");
}
