use super::types::{JobArgs, JobCallback, JobStoreError};

/// Runs the side effect behind a [`JobCallback`].
///
/// Called from worker threads without the registry lock held.
pub trait JobExecutor: Send + Sync {
    fn execute(&self, callback: JobCallback, args: &JobArgs) -> Result<(), JobStoreError>;
}
