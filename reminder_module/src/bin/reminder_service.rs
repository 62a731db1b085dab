use std::sync::Arc;

use reminder_module::{Collections, JobStore, NotificationExecutor, ServiceConfig};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = ServiceConfig::from_env();
    // The MongoDB sync client drives its own runtime, so connect before
    // entering tokio.
    let collections = Collections::connect(&config);
    info!("document backend: {:?}", collections.backend());

    let executor = Arc::new(NotificationExecutor::new(collections));
    let jobs = JobStore::new(config.job_store_config(), executor);
    info!("{} job(s) pending", jobs.len());
    jobs.start()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;

    info!("shutdown requested");
    jobs.stop();
    Ok(())
}
