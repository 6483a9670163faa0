//! Background job scheduler.
//!
//! Registers the housekeeping jobs: expiring unpaid orders (which releases
//! their reserved stock) and purging dead sessions.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Revoked or expired sessions are kept this long for the account screen.
const SESSION_RETENTION_DAYS: i64 = 7;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<oja_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_order_expiry_job(&scheduler, pool.clone(), &config).await?;
    register_session_purge_job(&scheduler, pool).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Every five minutes (`0 */5 * * * *`), cancel orders that have sat in
/// `pending_payment` longer than `PENDING_ORDER_TTL_MINUTES`.
async fn register_order_expiry_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: &oja_core::AppConfig,
) -> Result<(), JobSchedulerError> {
    let ttl_minutes = i64::try_from(config.pending_order_ttl_minutes).unwrap_or(i64::MAX / 60);
    let pool = Arc::new(pool);

    let job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            let cutoff = Utc::now() - Duration::minutes(ttl_minutes);
            match oja_db::expire_pending_orders(&pool, cutoff).await {
                Ok(0) => tracing::debug!("scheduler: no stale pending orders"),
                Ok(expired) => {
                    tracing::info!(expired, "scheduler: expired stale pending orders");
                }
                Err(e) => tracing::error!(error = %e, "scheduler: order expiry failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(ttl_minutes, "scheduler: registered order expiry job");
    Ok(())
}

/// Hourly (`0 0 * * * *`) deletion of sessions that ended more than a week ago.
async fn register_session_purge_job(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            let cutoff = Utc::now() - Duration::days(SESSION_RETENTION_DAYS);
            match oja_db::purge_stale_sessions(&pool, cutoff).await {
                Ok(purged) => tracing::info!(purged, "scheduler: purged stale sessions"),
                Err(e) => tracing::error!(error = %e, "scheduler: session purge failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
