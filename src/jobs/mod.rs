//! Scheduled background jobs

pub mod auto_register;

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::db::Database;
use crate::services::media_root::MediaRoot;
use crate::services::registrar::RegistrationService;

/// Start the background job scheduler. The auto-registration job runs at
/// the top of every hour; whether it does anything is decided per tick from
/// the stored settings.
pub async fn start_scheduler(
    db: Database,
    registrar: Arc<RegistrationService>,
    root: MediaRoot,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let db = db.clone();
        let registrar = registrar.clone();
        let root = root.clone();
        Box::pin(async move {
            if let Err(e) = auto_register::run(&db, &registrar, &root).await {
                error!(error = %e, "Auto-registration job failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Job scheduler started");

    Ok(scheduler)
}
