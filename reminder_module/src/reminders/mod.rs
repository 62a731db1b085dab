//! Reminder scheduling, notification delivery and task personalization on
//! top of the job store and document collections.

mod calendar;
mod errors;
mod notifier;
mod personalization;
mod records;
mod scheduler;
mod suggestions;
mod time;

pub use calendar::build_calendar_url;
pub use errors::ReminderError;
pub use notifier::{FireReport, NotificationExecutor, REMINDED_STATUS};
pub use personalization::{profile_signals, score_documents, task_signals, Personalizer, RankedTask};
pub use records::{
    reminder_key, NotificationKind, NotificationRecord, ReminderRecord, REMINDER_METHOD,
};
pub use scheduler::{reminder_body, ReminderScheduler, DEFAULT_AI_TASK_ID, DEFAULT_AI_TITLE};
pub use suggestions::{
    parse_suggestion, AiSuggestion, AppliedSuggestion, CategorizedTask, ReminderRecommendation,
    SchedulePlanItem, SuggestionApplier,
};
pub use time::parse_iso_datetime;
