use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::doc;
use tracing::{info, warn};

use crate::document_store::{id_filter, Collections};
use crate::scheduler::{JobArgs, JobCallback, JobStore, JobSummary, Recurrence};

use super::calendar::build_calendar_url;
use super::errors::ReminderError;
use super::records::{bson_datetime, reminder_key, ReminderRecord};
use super::suggestions::ReminderRecommendation;
use super::time::parse_iso_datetime;

pub const DEFAULT_AI_TASK_ID: &str = "default";
pub const DEFAULT_AI_TITLE: &str = "Reminder";
const DEFAULT_AI_TASK_NAME: &str = "Task";

pub fn reminder_body(task_text: &str) -> String {
    format!("Reminder for: {}", task_text)
}

/// Turns reminder requests into jobs plus their audit records.
///
/// The `try_*` methods return typed errors; the plain methods are the
/// boundary form that logs the failure and reports `false`.
pub struct ReminderScheduler {
    jobs: Arc<JobStore>,
    collections: Collections,
}

impl ReminderScheduler {
    pub fn new(jobs: Arc<JobStore>, collections: Collections) -> Self {
        Self { jobs, collections }
    }

    pub fn job_store(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    pub fn try_schedule_reminder(
        &self,
        reminder_time: &str,
        user_id: &str,
        task_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, ReminderError> {
        let fire_time = parse_iso_datetime(reminder_time)?;
        let job_id = format!("reminder_{}_{}_{}", user_id, task_id, reminder_time.trim());
        let record = ReminderRecord {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            reminder_time: fire_time,
            calendar_url: build_calendar_url(title, body, fire_time, None)?,
            recurrence: None,
        };
        self.collections.reminders.update_one(
            reminder_key(user_id, task_id),
            record.schedule_update(),
            true,
        )?;
        self.jobs.schedule_once(
            &job_id,
            fire_time,
            JobCallback::SendReminder,
            task_args(user_id, task_id, title, body),
        )?;
        info!("scheduled reminder {} for {}", job_id, fire_time);
        Ok(job_id)
    }

    pub fn schedule_reminder(
        &self,
        reminder_time: &str,
        user_id: &str,
        task_id: &str,
        title: &str,
        body: &str,
    ) -> bool {
        report(
            "reminder",
            self.try_schedule_reminder(reminder_time, user_id, task_id, title, body),
        )
    }

    pub fn try_schedule_recurring_reminder(
        &self,
        start_time: &str,
        user_id: &str,
        task_id: &str,
        title: &str,
        body: &str,
        pattern: &str,
    ) -> Result<String, ReminderError> {
        let recurrence: Recurrence = pattern.parse()?;
        let start = parse_iso_datetime(start_time)?;
        let job_id = format!(
            "recurring_{}_{}_{}_{}",
            recurrence.as_str(),
            user_id,
            task_id,
            start_time.trim()
        );
        let record = ReminderRecord {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            reminder_time: start,
            calendar_url: build_calendar_url(title, body, start, None)?,
            recurrence: Some(recurrence),
        };
        self.collections.reminders.update_one(
            reminder_key(user_id, task_id),
            record.schedule_update(),
            true,
        )?;
        self.jobs.schedule_recurring(
            &job_id,
            start,
            recurrence,
            JobCallback::SendReminder,
            task_args(user_id, task_id, title, body),
        )?;
        info!("scheduled {} reminder {} starting {}", recurrence.as_str(), job_id, start);
        Ok(job_id)
    }

    pub fn schedule_recurring_reminder(
        &self,
        start_time: &str,
        user_id: &str,
        task_id: &str,
        title: &str,
        body: &str,
        pattern: &str,
    ) -> bool {
        report(
            "recurring reminder",
            self.try_schedule_recurring_reminder(
                start_time, user_id, task_id, title, body, pattern,
            ),
        )
    }

    pub fn try_schedule_push_notification(
        &self,
        notification_time: &str,
        user_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, ReminderError> {
        self.schedule_user_notification(
            "push",
            JobCallback::SendPush,
            notification_time,
            user_id,
            title,
            body,
        )
    }

    pub fn schedule_push_notification(
        &self,
        notification_time: &str,
        user_id: &str,
        title: &str,
        body: &str,
    ) -> bool {
        report(
            "push notification",
            self.try_schedule_push_notification(notification_time, user_id, title, body),
        )
    }

    pub fn try_schedule_email_notification(
        &self,
        notification_time: &str,
        user_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, ReminderError> {
        self.schedule_user_notification(
            "email",
            JobCallback::SendEmail,
            notification_time,
            user_id,
            title,
            body,
        )
    }

    pub fn schedule_email_notification(
        &self,
        notification_time: &str,
        user_id: &str,
        title: &str,
        body: &str,
    ) -> bool {
        report(
            "email notification",
            self.try_schedule_email_notification(notification_time, user_id, title, body),
        )
    }

    fn schedule_user_notification(
        &self,
        prefix: &str,
        callback: JobCallback,
        notification_time: &str,
        user_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, ReminderError> {
        let fire_time = parse_iso_datetime(notification_time)?;
        let job_id = format!("{}_{}_{}", prefix, user_id, notification_time.trim());
        let args = JobArgs {
            user_id: user_id.to_string(),
            task_id: None,
            title: title.to_string(),
            body: body.to_string(),
        };
        self.jobs.schedule_once(&job_id, fire_time, callback, args)?;
        info!("scheduled {} notification {} for {}", prefix, job_id, fire_time);
        Ok(job_id)
    }

    pub fn cancel_reminder(&self, job_id: &str) -> bool {
        match self.jobs.cancel(job_id) {
            Ok(_) => {
                info!("cancelled job {}", job_id);
                true
            }
            Err(err) => {
                warn!("failed to cancel job {}: {}", job_id, err);
                false
            }
        }
    }

    /// Pending jobs of any kind that belong to `user_id`, soonest first.
    pub fn get_scheduled_reminders(&self, user_id: &str) -> Vec<JobSummary> {
        self.jobs.list_jobs(|job| job.args.user_id == user_id)
    }

    /// Schedules one reminder per time attached to a created or edited task.
    /// Returns how many were scheduled.
    pub fn schedule_task_reminders<S: AsRef<str>>(
        &self,
        user_id: &str,
        task_id: &str,
        task_text: &str,
        reminder_times: &[S],
    ) -> usize {
        let body = reminder_body(task_text);
        reminder_times
            .iter()
            .filter(|time| {
                self.schedule_reminder(time.as_ref(), user_id, task_id, task_text, &body)
            })
            .count()
    }

    pub fn schedule_ai_reminders(
        &self,
        recommendations: &[ReminderRecommendation],
        user_id: &str,
    ) -> usize {
        recommendations
            .iter()
            .filter(|rec| {
                let task_id = rec.task_id.as_deref().unwrap_or(DEFAULT_AI_TASK_ID);
                let title = rec.task.as_deref().unwrap_or(DEFAULT_AI_TITLE);
                let body = reminder_body(rec.task.as_deref().unwrap_or(DEFAULT_AI_TASK_NAME));
                self.schedule_reminder(&rec.reminder_iso, user_id, task_id, title, &body)
            })
            .count()
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> bool {
        let update = doc! { "$set": { "read": true, "read_at": bson_datetime(Utc::now()) } };
        match self
            .collections
            .notifications
            .update_one(id_filter(notification_id), update, false)
        {
            Ok(outcome) => outcome.matched > 0,
            Err(err) => {
                warn!("failed to mark notification {} read: {}", notification_id, err);
                false
            }
        }
    }
}

fn task_args(user_id: &str, task_id: &str, title: &str, body: &str) -> JobArgs {
    JobArgs {
        user_id: user_id.to_string(),
        task_id: Some(task_id.to_string()),
        title: title.to_string(),
        body: body.to_string(),
    }
}

fn report(what: &str, result: Result<String, ReminderError>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => {
            warn!("error scheduling {}: {}", what, err);
            false
        }
    }
}
