use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use tracing::{info, warn};

use crate::document_store::{id_filter, Collections};
use crate::scheduler::{JobArgs, JobCallback, JobExecutor, JobStoreError};

use super::records::{
    bson_datetime, reminder_key, NotificationKind, NotificationRecord, REMINDER_METHOD,
};

pub const REMINDED_STATUS: &str = "reminded";

/// Which of a firing's independent writes went through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    pub task_updated: bool,
    pub reminder_marked: bool,
    pub notification_written: bool,
}

impl FireReport {
    fn attempted(&self, callback: JobCallback) -> usize {
        match callback {
            JobCallback::SendReminder => 3,
            JobCallback::SendPush | JobCallback::SendEmail => 1,
        }
    }

    fn succeeded(&self) -> usize {
        [self.task_updated, self.reminder_marked, self.notification_written]
            .iter()
            .filter(|ok| **ok)
            .count()
    }
}

/// Performs the side effects of fired reminder, push and email jobs.
///
/// Each write is attempted on its own; a failure is logged and the remaining
/// writes still run.
#[derive(Clone)]
pub struct NotificationExecutor {
    collections: Collections,
}

impl NotificationExecutor {
    pub fn new(collections: Collections) -> Self {
        Self { collections }
    }

    pub fn fire_reminder(
        &self,
        user_id: &str,
        task_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> FireReport {
        info!("reminder: {} - {} for user {}", title, body, user_id);
        let mut report = FireReport::default();

        match self.collections.tasks.update_one(
            id_filter(task_id),
            doc! { "$set": { "status": REMINDED_STATUS } },
            false,
        ) {
            Ok(outcome) => {
                if outcome.matched == 0 {
                    info!("reminder fired for unknown task {}", task_id);
                }
                report.task_updated = true;
            }
            Err(err) => warn!("failed to mark task {} reminded: {}", task_id, err),
        }

        match self.collections.reminders.update_one(
            reminder_key(user_id, task_id),
            doc! { "$set": {
                "title": title,
                "body": body,
                "method": REMINDER_METHOD,
                "sent_at": bson_datetime(now),
            } },
            true,
        ) {
            Ok(_) => report.reminder_marked = true,
            Err(err) => warn!(
                "failed to record reminder for user {} task {}: {}",
                user_id, task_id, err
            ),
        }

        report.notification_written =
            self.write_notification(NotificationKind::Reminder, user_id, title, body, now);
        report
    }

    pub fn fire_push(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> FireReport {
        info!("push notification: {} - {} for user {}", title, body, user_id);
        FireReport {
            notification_written: self.write_notification(
                NotificationKind::Push,
                user_id,
                title,
                body,
                now,
            ),
            ..FireReport::default()
        }
    }

    pub fn fire_email(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> FireReport {
        info!("email notification: {} - {} for user {}", title, body, user_id);
        FireReport {
            notification_written: self.write_notification(
                NotificationKind::Email,
                user_id,
                title,
                body,
                now,
            ),
            ..FireReport::default()
        }
    }

    fn write_notification(
        &self,
        kind: NotificationKind,
        user_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let record = NotificationRecord::new(kind, user_id, title, body, now);
        match self.collections.notifications.insert_one(record.to_document()) {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "failed to store {} notification for user {}: {}",
                    kind.as_str(),
                    user_id,
                    err
                );
                false
            }
        }
    }
}

impl JobExecutor for NotificationExecutor {
    fn execute(&self, callback: JobCallback, args: &JobArgs) -> Result<(), JobStoreError> {
        let now = Utc::now();
        let report = match callback {
            JobCallback::SendReminder => {
                let task_id = args.task_id.as_deref().ok_or_else(|| {
                    JobStoreError::JobFailed(format!(
                        "reminder for user {} has no task id",
                        args.user_id
                    ))
                })?;
                self.fire_reminder(&args.user_id, task_id, &args.title, &args.body, now)
            }
            JobCallback::SendPush => self.fire_push(&args.user_id, &args.title, &args.body, now),
            JobCallback::SendEmail => self.fire_email(&args.user_id, &args.title, &args.body, now),
        };
        if report.succeeded() == 0 {
            return Err(JobStoreError::JobFailed(format!(
                "all {} write(s) for {} failed",
                report.attempted(callback),
                callback
            )));
        }
        Ok(())
    }
}
