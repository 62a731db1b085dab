mod core;
mod executor;
mod schedule;
mod state;
mod store;
mod types;
mod utils;

pub use core::{JobStore, JobStoreConfig, DEFAULT_MAX_WORKERS, DEFAULT_POLL_INTERVAL};
pub use executor::JobExecutor;
pub use types::{
    FireRecord, Job, JobArgs, JobCallback, JobKind, JobState, JobStoreError, JobSummary,
    Recurrence, Trigger,
};
