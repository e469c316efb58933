//! Cron trigger for scheduled matching rounds.
//!
//! The cron expression is evaluated in the configured fixed UTC offset; the
//! round's scheduled date is "today" in that same offset.

use crate::config::runtime::ScheduleConfig;
use roulette_core::processors::{RoundCoordinator, RoundError, RoundRequest};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Start the round trigger. Returns `None` when scheduling is disabled.
pub async fn start_scheduler(
    schedule: &ScheduleConfig,
    coordinator: Arc<RoundCoordinator>,
) -> anyhow::Result<Option<JobScheduler>> {
    if !schedule.enabled {
        tracing::info!("Scheduled rounds disabled");
        return Ok(None);
    }

    let scheduler = JobScheduler::new().await?;
    let offset_seconds = schedule.utc_offset.local_minus_utc();
    let round_job = Job::new_async_tz(
        schedule.cron.as_str(),
        schedule.utc_offset,
        move |_uuid, _lock| {
            let coordinator = coordinator.clone();
            Box::pin(async move {
                run_scheduled_round(&coordinator, offset_seconds).await;
            })
        },
    )?;

    scheduler.add(round_job).await?;
    scheduler.start().await?;

    tracing::info!(
        cron = %schedule.cron,
        utc_offset = %schedule.utc_offset,
        "Round scheduler started"
    );
    Ok(Some(scheduler))
}

async fn run_scheduled_round(coordinator: &RoundCoordinator, offset_seconds: i32) {
    let offset = time::UtcOffset::from_whole_seconds(offset_seconds).unwrap_or(time::UtcOffset::UTC);
    let today = time::OffsetDateTime::now_utc().to_offset(offset).date();

    match coordinator.execute(RoundRequest::scheduled(today)).await {
        Ok(report) => tracing::info!(
            round_id = %report.round.id,
            pairings = report.pairings.len(),
            notifications = report.notifications_enqueued,
            "Scheduled round completed"
        ),
        Err(RoundError::RoundInProgress) => {
            tracing::warn!("Scheduled round skipped: another round is in progress")
        }
        Err(e) => tracing::error!(
            round_id = ?e.round_id(),
            error = %e,
            "Scheduled round failed"
        ),
    }
}
