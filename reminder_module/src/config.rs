use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::{JobStoreConfig, DEFAULT_MAX_WORKERS};

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";
pub const DEFAULT_MONGO_DB: &str = "taskflow_ai";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub mongo_uri: String,
    pub mongo_db: String,
    /// Skip MongoDB entirely and keep every collection in memory.
    pub mongo_disabled: bool,
    /// SQLite file for the job registry; jobs are volatile when unset.
    pub job_store_path: Option<PathBuf>,
    pub scheduler_poll_interval: Duration,
    pub scheduler_max_workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            mongo_db: DEFAULT_MONGO_DB.to_string(),
            mongo_disabled: false,
            job_store_path: None,
            scheduler_poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            scheduler_max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mongo_uri =
            env_var_non_empty("MONGO_URI").unwrap_or_else(|| DEFAULT_MONGO_URI.to_string());
        let mongo_db =
            env_var_non_empty("MONGO_DB").unwrap_or_else(|| DEFAULT_MONGO_DB.to_string());
        let mongo_disabled = env_flag("MONGO_DISABLED", false);
        let job_store_path = env_var_non_empty("JOB_STORE_PATH").map(resolve_path);
        let scheduler_poll_interval = env::var("SCHEDULER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        let scheduler_max_workers = env::var("SCHEDULER_MAX_WORKERS")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_WORKERS);

        Self {
            mongo_uri,
            mongo_db,
            mongo_disabled,
            job_store_path,
            scheduler_poll_interval,
            scheduler_max_workers,
        }
    }

    pub fn job_store_config(&self) -> JobStoreConfig {
        JobStoreConfig {
            max_workers: self.scheduler_max_workers,
            poll_interval: self.scheduler_poll_interval,
            persist_path: self.job_store_path.clone(),
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Err(_) => default,
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_path(raw: String) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}
