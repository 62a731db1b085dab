use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::scheduler::Recurrence;

/// Delivery channel recorded on reminder documents.
pub const REMINDER_METHOD: &str = "in-app";

pub(crate) fn bson_datetime(value: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(value))
}

/// The `(user_id, task_id)` key reminder records are upserted under.
pub fn reminder_key(user_id: &str, task_id: &str) -> Document {
    doc! { "user_id": user_id, "task_id": task_id }
}

/// Audit record for one task reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderRecord {
    pub user_id: String,
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub reminder_time: DateTime<Utc>,
    pub calendar_url: String,
    pub recurrence: Option<Recurrence>,
}

impl ReminderRecord {
    /// `$set` applied when the reminder is (re)scheduled. `sent_at` goes back
    /// to null until the job fires.
    pub fn schedule_update(&self) -> Document {
        let mut fields = doc! {
            "title": self.title.as_str(),
            "body": self.body.as_str(),
            "method": REMINDER_METHOD,
            "reminder_time": bson_datetime(self.reminder_time),
            "calendar_url": self.calendar_url.as_str(),
            "sent_at": Bson::Null,
        };
        if let Some(recurrence) = self.recurrence {
            fields.insert("recurrence", recurrence.as_str());
        }
        doc! { "$set": fields }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Push,
    Email,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Push => "push",
            NotificationKind::Email => "email",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(
        kind: NotificationKind,
        user_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            kind,
            created_at: now,
        }
    }

    pub fn to_document(&self) -> Document {
        doc! {
            "user_id": self.user_id.as_str(),
            "title": self.title.as_str(),
            "body": self.body.as_str(),
            "type": self.kind.as_str(),
            "created_at": bson_datetime(self.created_at),
            "read": false,
            "read_at": Bson::Null,
        }
    }
}
