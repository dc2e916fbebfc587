//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring maintenance jobs.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Driver location pings older than this are pruned nightly.
const LOCATION_RETENTION_DAYS: i64 = 7;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(pool: PgPool) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let pool = Arc::new(pool);

    register_campaign_expiry_job(&scheduler, Arc::clone(&pool)).await?;
    register_location_prune_job(&scheduler, pool).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Hourly at minute 5 (`0 5 * * * *`): deactivate referral campaigns whose
/// end date has passed.
async fn register_campaign_expiry_job(
    scheduler: &JobScheduler,
    pool: Arc<PgPool>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 5 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        Box::pin(async move {
            run_campaign_expiry(&pool).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_campaign_expiry(pool: &PgPool) {
    match jeffy_db::expire_campaigns(pool, Utc::now()).await {
        Ok(0) => tracing::debug!("scheduler: no referral campaigns to expire"),
        Ok(count) => tracing::info!(count, "scheduler: expired referral campaigns"),
        Err(e) => tracing::error!(error = %e, "scheduler: campaign expiry failed"),
    }
}

/// Nightly at 03:30 UTC (`0 30 3 * * *`): delete stale driver pings.
async fn register_location_prune_job(
    scheduler: &JobScheduler,
    pool: Arc<PgPool>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 30 3 * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        Box::pin(async move {
            run_location_prune(&pool).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_location_prune(pool: &PgPool) {
    let cutoff = Utc::now() - Duration::days(LOCATION_RETENTION_DAYS);
    match jeffy_db::prune_driver_locations(pool, cutoff).await {
        Ok(removed) => tracing::info!(removed, %cutoff, "scheduler: pruned driver locations"),
        Err(e) => tracing::error!(error = %e, "scheduler: driver location prune failed"),
    }
}
