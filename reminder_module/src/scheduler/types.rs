use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The side effect a job performs when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCallback {
    SendReminder,
    SendPush,
    SendEmail,
}

impl JobCallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCallback::SendReminder => "send_reminder",
            JobCallback::SendPush => "send_push",
            JobCallback::SendEmail => "send_email",
        }
    }
}

impl fmt::Display for JobCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobCallback {
    type Err = JobStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "send_reminder" => Ok(JobCallback::SendReminder),
            "send_push" => Ok(JobCallback::SendPush),
            "send_email" => Ok(JobCallback::SendEmail),
            other => Err(JobStoreError::Storage(format!(
                "unknown job callback {}",
                other
            ))),
        }
    }
}

/// Ordered payload handed to the callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobArgs {
    pub user_id: String,
    /// Push and email notifications are not tied to a task.
    #[serde(default)]
    pub task_id: Option<String>,
    pub title: String,
    pub body: String,
}

/// Fixed repeat intervals for recurring jobs.
///
/// `Monthly` is a flat 30 days, not calendar-month arithmetic: a monthly job
/// started on Jan 31 next fires on Mar 2, not Feb 28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    OneShot,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    Fired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    OneShot {
        fire_time: DateTime<Utc>,
    },
    Recurring {
        start_time: DateTime<Utc>,
        recurrence: Recurrence,
        next_fire_time: DateTime<Utc>,
    },
}

impl Trigger {
    pub fn kind(&self) -> JobKind {
        match self {
            Trigger::OneShot { .. } => JobKind::OneShot,
            Trigger::Recurring { .. } => JobKind::Recurring,
        }
    }

    pub fn next_fire_time(&self) -> DateTime<Utc> {
        match self {
            Trigger::OneShot { fire_time } => *fire_time,
            Trigger::Recurring { next_fire_time, .. } => *next_fire_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub trigger: Trigger,
    pub callback: JobCallback,
    pub args: JobArgs,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub fire_count: u64,
    /// Bumped on every (re)registration so completions of a replaced or
    /// cancelled job cannot touch its successor.
    pub(crate) generation: u64,
}

impl Job {
    pub(crate) fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Scheduled && self.trigger.next_fire_time() <= now
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            kind: self.trigger.kind(),
            callback: self.callback,
            next_fire_time: match self.state {
                JobState::Scheduled => Some(self.trigger.next_fire_time()),
                JobState::Fired | JobState::Cancelled => None,
            },
            args: self.args.clone(),
            state: self.state,
        }
    }
}

/// What `list_jobs` reports for each registered job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub kind: JobKind,
    pub callback: JobCallback,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub args: JobArgs,
    pub state: JobState,
}

/// Outcome of one invocation, returned by [`super::JobStore::run_due_at`].
#[derive(Debug, Clone, PartialEq)]
pub struct FireRecord {
    pub job_id: String,
    pub fire_time: DateTime<Utc>,
    pub succeeded: bool,
    /// `Fired` once a job is done for good, `Scheduled` when a recurring job
    /// was re-armed, `Cancelled` when it was removed while running.
    pub state: JobState,
    /// Set when a recurring job was re-armed.
    pub next_fire_time: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("job id must not be empty")]
    InvalidId,
    #[error("unknown recurrence pattern: {0}")]
    UnknownRecurrence(String),
    #[error("time out of range: {0}")]
    TimeOutOfRange(String),
    #[error("job store is already running")]
    AlreadyRunning,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("job execution failed: {0}")]
    JobFailed(String),
}
