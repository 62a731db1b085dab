use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::types::{Job, JobArgs, JobCallback, JobState, JobStoreError, Recurrence, Trigger};
use super::utils::{format_datetime, parse_datetime, parse_optional_datetime, trigger_columns};

mod schema;

use schema::JOB_STORE_SCHEMA;

struct JobRow {
    id: String,
    callback: String,
    args_json: String,
    trigger_type: String,
    fire_time: Option<String>,
    start_time: Option<String>,
    recurrence: Option<String>,
    next_fire_time: String,
    created_at: String,
    last_fired_at: Option<String>,
    fire_count: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job, JobStoreError> {
        let callback: JobCallback = self.callback.parse()?;
        let args: JobArgs = serde_json::from_str(&self.args_json)?;
        let trigger = match self.trigger_type.as_str() {
            "one_shot" => {
                let fire_time = self
                    .fire_time
                    .ok_or_else(|| JobStoreError::Storage("missing fire_time".to_string()))?;
                Trigger::OneShot {
                    fire_time: parse_datetime(&fire_time)?,
                }
            }
            "recurring" => {
                let start_time = self
                    .start_time
                    .ok_or_else(|| JobStoreError::Storage("missing start_time".to_string()))?;
                let recurrence: Recurrence = self
                    .recurrence
                    .ok_or_else(|| JobStoreError::Storage("missing recurrence".to_string()))?
                    .parse()?;
                Trigger::Recurring {
                    start_time: parse_datetime(&start_time)?,
                    recurrence,
                    next_fire_time: parse_datetime(&self.next_fire_time)?,
                }
            }
            other => {
                return Err(JobStoreError::Storage(format!(
                    "unknown trigger type {}",
                    other
                )))
            }
        };
        Ok(Job {
            id: self.id,
            trigger,
            callback,
            args,
            state: JobState::Scheduled,
            created_at: parse_datetime(&self.created_at)?,
            last_fired_at: parse_optional_datetime(self.last_fired_at.as_deref())?,
            fire_count: self.fire_count.max(0) as u64,
            generation: 0,
        })
    }
}

/// SQLite mirror of the job registry, reloaded when the store is rebuilt.
#[derive(Debug)]
pub(crate) struct SqliteJobStore {
    path: PathBuf,
}

impl SqliteJobStore {
    pub(crate) fn new(path: PathBuf) -> Result<Self, JobStoreError> {
        let store = Self { path };
        let _ = store.open()?;
        Ok(store)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Rows that fail to decode are logged and skipped.
    pub(crate) fn load_jobs(&self) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, callback, args_json, trigger_type, fire_time, start_time, recurrence,
                    next_fire_time, created_at, last_fired_at, fire_count
             FROM jobs
             ORDER BY next_fire_time",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(JobRow {
                id: row.get(0)?,
                callback: row.get(1)?,
                args_json: row.get(2)?,
                trigger_type: row.get(3)?,
                fire_time: row.get(4)?,
                start_time: row.get(5)?,
                recurrence: row.get(6)?,
                next_fire_time: row.get(7)?,
                created_at: row.get(8)?,
                last_fired_at: row.get(9)?,
                fire_count: row.get(10)?,
            })
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            let decoded = row.map_err(JobStoreError::from).and_then(|row| {
                let id = row.id.clone();
                row.into_job().map_err(|err| {
                    JobStoreError::Storage(format!("job {}: {}", id, err))
                })
            });
            match decoded {
                Ok(job) => jobs.push(job),
                Err(err) => warn!(
                    "skipping unreadable job row in {}: {}",
                    self.path.display(),
                    err
                ),
            }
        }
        Ok(jobs)
    }

    pub(crate) fn upsert_job(&self, job: &Job) -> Result<(), JobStoreError> {
        let conn = self.open()?;
        let (trigger_type, fire_time, start_time, recurrence, next_fire_time) =
            trigger_columns(&job.trigger);
        conn.execute(
            "INSERT INTO jobs (id, callback, args_json, trigger_type, fire_time, start_time,
                               recurrence, next_fire_time, created_at, last_fired_at, fire_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                 callback = excluded.callback,
                 args_json = excluded.args_json,
                 trigger_type = excluded.trigger_type,
                 fire_time = excluded.fire_time,
                 start_time = excluded.start_time,
                 recurrence = excluded.recurrence,
                 next_fire_time = excluded.next_fire_time,
                 created_at = excluded.created_at,
                 last_fired_at = excluded.last_fired_at,
                 fire_count = excluded.fire_count",
            params![
                job.id,
                job.callback.as_str(),
                serde_json::to_string(&job.args)?,
                trigger_type,
                fire_time,
                start_time,
                recurrence,
                next_fire_time,
                format_datetime(job.created_at),
                job.last_fired_at.map(format_datetime),
                job.fire_count as i64
            ],
        )?;
        Ok(())
    }

    pub(crate) fn delete_job(&self, id: &str) -> Result<(), JobStoreError> {
        let conn = self.open()?;
        conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn open(&self) -> Result<Connection, JobStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(JOB_STORE_SCHEMA)?;
        Ok(conn)
    }
}
