pub mod config;
pub mod document_store;
pub mod reminders;
pub mod scheduler;

pub use config::ServiceConfig;
pub use document_store::{Collections, DocumentStore, StoreBackend, StoreError};
pub use reminders::{
    build_calendar_url, parse_suggestion, AiSuggestion, NotificationExecutor, Personalizer,
    ReminderError, ReminderScheduler, SuggestionApplier,
};
pub use scheduler::{
    JobArgs, JobCallback, JobExecutor, JobStore, JobStoreConfig, JobStoreError, JobSummary,
    Recurrence,
};
