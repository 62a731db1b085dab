use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::schedule::next_fire_after;
use super::types::{FireRecord, Job, JobArgs, JobCallback, JobState, Trigger};

/// A job claimed for execution, detached from the registry.
#[derive(Debug, Clone)]
pub(super) struct DueJob {
    pub(super) id: String,
    pub(super) generation: u64,
    pub(super) fire_time: DateTime<Utc>,
    pub(super) callback: JobCallback,
    pub(super) args: JobArgs,
}

/// Registry mutation that must be mirrored to the persistent store.
pub(super) enum Persist {
    Upsert(Job),
    Delete(String),
    Nothing,
}

#[derive(Default)]
pub(super) struct Registry {
    pub(super) jobs: HashMap<String, Job>,
    running: HashSet<String>,
    next_generation: u64,
}

impl Registry {
    pub(super) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Adds `job`, replacing any job registered under the same id.
    pub(super) fn insert(&mut self, mut job: Job) -> Option<Job> {
        job.generation = self.next_generation();
        self.jobs.insert(job.id.clone(), job)
    }

    pub(super) fn remove(&mut self, id: &str) -> Option<Job> {
        self.jobs.remove(id)
    }

    pub(super) fn is_running(&self, id: &str) -> bool {
        self.running.contains(id)
    }

    pub(super) fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Ids of due jobs that are not already executing, earliest first.
    pub(super) fn due_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut due: Vec<&Job> = self
            .jobs
            .values()
            .filter(|job| job.is_due(now) && !self.running.contains(&job.id))
            .collect();
        due.sort_by(|a, b| {
            a.trigger
                .next_fire_time()
                .cmp(&b.trigger.next_fire_time())
                .then_with(|| a.id.cmp(&b.id))
        });
        due.into_iter().map(|job| job.id.clone()).collect()
    }

    pub(super) fn claim(&mut self, id: &str) -> Option<DueJob> {
        let job = self.jobs.get(id)?;
        if self.running.contains(id) {
            return None;
        }
        let due = DueJob {
            id: job.id.clone(),
            generation: job.generation,
            fire_time: job.trigger.next_fire_time(),
            callback: job.callback,
            args: job.args.clone(),
        };
        self.running.insert(due.id.clone());
        Some(due)
    }

    /// Records the end of an invocation. A job cancelled or replaced while it
    /// was running is left alone, so a racing cancel is never undone.
    pub(super) fn complete(
        &mut self,
        due: &DueJob,
        succeeded: bool,
        finished_at: DateTime<Utc>,
    ) -> (FireRecord, Persist) {
        self.running.remove(&due.id);
        let mut record = FireRecord {
            job_id: due.id.clone(),
            fire_time: due.fire_time,
            succeeded,
            state: JobState::Cancelled,
            next_fire_time: None,
        };

        let current = match self.jobs.get_mut(&due.id) {
            Some(job) if job.generation == due.generation => job,
            _ => return (record, Persist::Nothing),
        };
        current.last_fired_at = Some(finished_at);
        if succeeded {
            current.fire_count += 1;
        }

        let next = match current.trigger {
            Trigger::OneShot { .. } => None,
            Trigger::Recurring { recurrence, .. } => {
                let next = next_fire_after(due.fire_time, recurrence, finished_at);
                if next.is_none() {
                    warn!("job {} has no representable next fire time; retiring it", due.id);
                }
                next
            }
        };
        match next {
            None => {
                // One-shot and retired recurring jobs are evicted.
                record.state = JobState::Fired;
                self.jobs.remove(&due.id);
                (record, Persist::Delete(due.id.clone()))
            }
            Some(next) => {
                if let Trigger::Recurring { next_fire_time, .. } = &mut current.trigger {
                    *next_fire_time = next;
                }
                current.state = JobState::Scheduled;
                record.state = JobState::Scheduled;
                record.next_fire_time = Some(next);
                (record, Persist::Upsert(current.clone()))
            }
        }
    }
}

/// Bounds how many claimed jobs may be in flight on the worker pool.
pub(super) struct WorkerSlots {
    max: usize,
    in_flight: Mutex<usize>,
}

impl WorkerSlots {
    pub(super) fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            in_flight: Mutex::new(0),
        }
    }

    pub(super) fn try_acquire(&self) -> bool {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if *in_flight >= self.max {
            return false;
        }
        *in_flight += 1;
        true
    }

    pub(super) fn release(&self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if *in_flight > 0 {
            *in_flight -= 1;
        }
    }

    pub(super) fn max(&self) -> usize {
        self.max
    }
}
