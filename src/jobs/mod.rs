//! Background job scheduling

use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::sync::scheduler::SyncScheduler;

/// Initialize and start the job scheduler.
///
/// The periodic sync is a plain run request against the listener's
/// scheduler, so it coalesces with webhook-triggered runs like any other
/// trigger.
pub async fn start_scheduler(
    sync_trigger: SyncScheduler,
    interval: Duration,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(interval, move |_uuid, _l| {
        let trigger = sync_trigger.clone();
        Box::pin(async move {
            info!("Requesting scheduled sync");
            trigger.request_run();
        })
    })?;
    scheduler.add(job).await?;

    scheduler.start().await?;

    info!(interval_secs = interval.as_secs(), "Job scheduler started");
    Ok(scheduler)
}
