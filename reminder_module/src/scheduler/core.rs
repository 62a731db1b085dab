use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use super::executor::JobExecutor;
use super::schedule::first_fire_time;
use super::state::{DueJob, Persist, Registry, WorkerSlots};
use super::store::SqliteJobStore;
use super::types::{
    FireRecord, Job, JobArgs, JobCallback, JobState, JobStoreError, JobSummary, Recurrence,
    Trigger,
};

pub const DEFAULT_MAX_WORKERS: usize = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Width of the worker pool that executes due jobs.
    pub max_workers: usize,
    pub poll_interval: Duration,
    /// Mirror the registry to this SQLite file; `None` keeps it in memory only.
    pub persist_path: Option<PathBuf>,
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            persist_path: None,
        }
    }
}

struct Shared {
    registry: Mutex<Registry>,
    executor: Arc<dyn JobExecutor>,
    persistence: Option<SqliteJobStore>,
    slots: WorkerSlots,
}

struct JobStoreControl {
    stop: Arc<AtomicBool>,
    sender: Option<Sender<DueJob>>,
    handles: Vec<thread::JoinHandle<()>>,
}

/// Registry of one-shot and recurring jobs keyed by id.
///
/// Registration, cancellation and listing are safe from any thread. After
/// [`JobStore::start`] a poll thread claims due jobs and hands them to a
/// bounded worker pool; [`JobStore::run_due_at`] drives the same firing logic
/// synchronously against an arbitrary clock.
pub struct JobStore {
    shared: Arc<Shared>,
    config: JobStoreConfig,
    control: Mutex<Option<JobStoreControl>>,
}

impl JobStore {
    /// Builds the store and restores persisted jobs. A persistence file that
    /// cannot be opened or read leaves the store volatile.
    pub fn new(config: JobStoreConfig, executor: Arc<dyn JobExecutor>) -> Self {
        let persistence = config.persist_path.as_ref().and_then(|path| {
            match SqliteJobStore::new(path.clone()) {
                Ok(store) => Some(store),
                Err(err) => {
                    warn!(
                        "cannot open job store {} ({}); jobs will not survive a restart",
                        path.display(),
                        err
                    );
                    None
                }
            }
        });
        let mut registry = Registry::default();
        if let Some(store) = &persistence {
            match store.load_jobs() {
                Ok(jobs) => {
                    if !jobs.is_empty() {
                        info!(
                            "restored {} job(s) from {}",
                            jobs.len(),
                            store.path().display()
                        );
                    }
                    for job in jobs {
                        registry.insert(job);
                    }
                }
                Err(err) => warn!(
                    "failed to restore jobs from {}: {}",
                    store.path().display(),
                    err
                ),
            }
        }
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(registry),
                executor,
                persistence,
                slots: WorkerSlots::new(config.max_workers),
            }),
            config,
            control: Mutex::new(None),
        }
    }

    pub fn in_memory(executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                executor,
                persistence: None,
                slots: WorkerSlots::new(DEFAULT_MAX_WORKERS),
            }),
            config: JobStoreConfig::default(),
            control: Mutex::new(None),
        }
    }

    /// Registers a job that fires once at `fire_time`. An existing job with
    /// the same id is replaced, so re-registration never double-fires.
    pub fn schedule_once(
        &self,
        id: &str,
        fire_time: DateTime<Utc>,
        callback: JobCallback,
        args: JobArgs,
    ) -> Result<(), JobStoreError> {
        let trigger = Trigger::OneShot { fire_time };
        self.register(id, trigger, callback, args)
    }

    /// Registers a job that fires at `start_time` and then every
    /// `recurrence.interval()`. Monthly means a fixed 30 days.
    pub fn schedule_recurring(
        &self,
        id: &str,
        start_time: DateTime<Utc>,
        recurrence: Recurrence,
        callback: JobCallback,
        args: JobArgs,
    ) -> Result<(), JobStoreError> {
        let next_fire_time =
            first_fire_time(start_time, recurrence, Utc::now()).ok_or_else(|| {
                JobStoreError::TimeOutOfRange(format!(
                    "no {} tick of {} after now",
                    recurrence.as_str(),
                    start_time
                ))
            })?;
        let trigger = Trigger::Recurring {
            start_time,
            recurrence,
            next_fire_time,
        };
        self.register(id, trigger, callback, args)
    }

    fn register(
        &self,
        id: &str,
        trigger: Trigger,
        callback: JobCallback,
        args: JobArgs,
    ) -> Result<(), JobStoreError> {
        if id.trim().is_empty() {
            return Err(JobStoreError::InvalidId);
        }
        let job = Job {
            id: id.to_string(),
            trigger,
            callback,
            args,
            state: JobState::Scheduled,
            created_at: Utc::now(),
            last_fired_at: None,
            fire_count: 0,
            generation: 0,
        };
        let mut registry = self.registry();
        if registry.insert(job.clone()).is_some() {
            info!("replaced existing job {}", id);
        }
        self.persist(Persist::Upsert(job));
        Ok(())
    }

    /// Removes a job that has not started yet. An invocation already handed
    /// to a worker still completes but the job is not re-armed.
    pub fn cancel(&self, id: &str) -> Result<JobSummary, JobStoreError> {
        let mut registry = self.registry();
        let mut job = registry
            .remove(id)
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;
        if registry.is_running(id) {
            info!("job {} cancelled while firing; it will not be re-armed", id);
        }
        self.persist(Persist::Delete(id.to_string()));
        job.state = JobState::Cancelled;
        Ok(job.summary())
    }

    /// Summaries of the jobs matching `predicate`, soonest first.
    pub fn list_jobs<F>(&self, mut predicate: F) -> Vec<JobSummary>
    where
        F: FnMut(&Job) -> bool,
    {
        let registry = self.registry();
        let mut jobs: Vec<&Job> = registry.jobs.values().filter(|job| predicate(job)).collect();
        jobs.sort_by(|a, b| {
            a.trigger
                .next_fire_time()
                .cmp(&b.trigger.next_fire_time())
                .then_with(|| a.id.cmp(&b.id))
        });
        jobs.into_iter().map(Job::summary).collect()
    }

    pub fn get_job(&self, id: &str) -> Option<JobSummary> {
        self.registry().jobs.get(id).map(Job::summary)
    }

    pub fn len(&self) -> usize {
        self.registry().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fires every job due at `now` on the calling thread and returns one
    /// record per invocation. Jobs already claimed by the worker pool are
    /// skipped.
    pub fn run_due_at(&self, now: DateTime<Utc>) -> Vec<FireRecord> {
        let claimed: Vec<DueJob> = {
            let mut registry = self.registry();
            let ids = registry.due_ids(now);
            ids.iter().filter_map(|id| registry.claim(id)).collect()
        };
        claimed
            .iter()
            .map(|due| {
                let succeeded = invoke(self.shared.executor.as_ref(), due);
                finish(&self.shared, due, succeeded, now)
            })
            .collect()
    }

    /// Starts the poll thread and worker pool. Calling it twice is an error.
    pub fn start(&self) -> Result<(), JobStoreError> {
        let mut control = self
            .control
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if control.is_some() {
            return Err(JobStoreError::AlreadyRunning);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = unbounded::<DueJob>();
        let worker_count = self.shared.slots.max();
        let mut handles = Vec::with_capacity(worker_count + 1);

        for worker_index in 0..worker_count {
            let shared = self.shared.clone();
            let receiver: Receiver<DueJob> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("job-worker-{}", worker_index))
                .spawn(move || {
                    for due in receiver {
                        let succeeded = invoke(shared.executor.as_ref(), &due);
                        finish(&shared, &due, succeeded, Utc::now());
                        shared.slots.release();
                    }
                })?;
            handles.push(handle);
        }

        {
            let shared = self.shared.clone();
            let stop = stop.clone();
            let sender = sender.clone();
            let poll_interval = self.config.poll_interval;
            let handle = thread::Builder::new()
                .name("job-poller".to_string())
                .spawn(move || {
                    let mut last_capacity_deferral: Option<usize> = None;
                    while !stop.load(Ordering::Relaxed) {
                        dispatch_due(&shared, &sender, Utc::now(), &mut last_capacity_deferral);
                        thread::sleep(poll_interval);
                    }
                })?;
            handles.push(handle);
        }

        info!(
            "job store started with {} worker(s), polling every {:?}",
            worker_count, self.config.poll_interval
        );
        *control = Some(JobStoreControl {
            stop,
            sender: Some(sender),
            handles,
        });
        Ok(())
    }

    /// Stops polling and waits for in-flight jobs to finish.
    pub fn stop(&self) {
        let control = self
            .control
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        let Some(mut control) = control else {
            return;
        };
        control.stop.store(true, Ordering::Relaxed);
        // Workers exit once the poller's sender is gone too.
        control.sender.take();
        for handle in control.handles.drain(..) {
            if handle.join().is_err() {
                warn!("job store thread panicked during shutdown");
            }
        }
        info!("job store stopped");
    }

    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .map(|control| control.is_some())
            .unwrap_or(false)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock_registry(&self.shared)
    }

    fn persist(&self, change: Persist) {
        persist_change(&self.shared, change);
    }
}

impl Drop for JobStore {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_registry(shared: &Shared) -> MutexGuard<'_, Registry> {
    shared
        .registry
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn persist_change(shared: &Shared, change: Persist) {
    let Some(store) = &shared.persistence else {
        return;
    };
    let result = match &change {
        Persist::Upsert(job) => store.upsert_job(job),
        Persist::Delete(id) => store.delete_job(id),
        Persist::Nothing => Ok(()),
    };
    if let Err(err) = result {
        warn!("job persistence failed; keeping in-memory state: {}", err);
    }
}

fn dispatch_due(
    shared: &Shared,
    sender: &Sender<DueJob>,
    now: DateTime<Utc>,
    last_capacity_deferral: &mut Option<usize>,
) {
    let claimed: Vec<DueJob> = {
        let mut registry = lock_registry(shared);
        let ids = registry.due_ids(now);
        let total = ids.len();
        let mut claimed = Vec::with_capacity(total);
        for (index, id) in ids.iter().enumerate() {
            if !shared.slots.try_acquire() {
                let remaining = total.saturating_sub(index);
                if *last_capacity_deferral != Some(remaining) {
                    info!(
                        "job store at capacity ({} running); deferring {} due job(s)",
                        registry.running_count(),
                        remaining
                    );
                    *last_capacity_deferral = Some(remaining);
                }
                break;
            }
            match registry.claim(id) {
                Some(due) => claimed.push(due),
                None => shared.slots.release(),
            }
        }
        if claimed.len() == total {
            *last_capacity_deferral = None;
        }
        claimed
    };

    for due in claimed {
        if let Err(err) = sender.send(due) {
            let due = err.into_inner();
            error!("worker pool closed; releasing job {}", due.id);
            finish(shared, &due, false, now);
            shared.slots.release();
        }
    }
}

/// Runs the callback, turning errors and panics into a logged failure.
fn invoke(executor: &dyn JobExecutor, due: &DueJob) -> bool {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        executor.execute(due.callback, &due.args)
    }));
    match outcome {
        Ok(Ok(())) => {
            info!(
                "fired job {} ({}) for user {}",
                due.id, due.callback, due.args.user_id
            );
            true
        }
        Ok(Err(err)) => {
            warn!("job {} ({}) failed: {}", due.id, due.callback, err);
            false
        }
        Err(_) => {
            error!("job {} ({}) panicked", due.id, due.callback);
            false
        }
    }
}

/// Persists under the registry lock so a racing cancel's delete cannot be
/// overwritten by a stale re-arm.
fn finish(shared: &Shared, due: &DueJob, succeeded: bool, now: DateTime<Utc>) -> FireRecord {
    let mut registry = lock_registry(shared);
    let (record, change) = registry.complete(due, succeeded, now);
    persist_change(shared, change);
    record
}
