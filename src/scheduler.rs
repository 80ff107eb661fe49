//! Cron-driven auto scrape.
//!
//! When `AUTO_SCRAPE_ENABLED` is set, runs the full adapter set on
//! `SCRAPE_CRON_SCHEDULE`. An overlapping tick is skipped, not queued;
//! the running scrape keeps its slot.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::Trigger;
use crate::scrapers::{ScrapeError, Scraper};

/// Build and start the scheduler when enabled. Returns None otherwise.
pub async fn start(
    settings: &Settings,
    scraper: Arc<Scraper>,
) -> anyhow::Result<Option<JobScheduler>> {
    if !settings.auto_scrape_enabled {
        return Ok(None);
    }

    let schedule = settings.scrape_cron_schedule.clone();
    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let scraper = scraper.clone();
        Box::pin(async move {
            match scraper.clone().start_all(Trigger::Scheduled, Some("cron".to_string())) {
                Ok(_) => info!("scheduled scrape run started"),
                Err(ScrapeError::AlreadyRunning) => {
                    info!("scheduled scrape skipped; a run is still active")
                }
                Err(e) => warn!("scheduled scrape failed to start: {}", e),
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("auto scrape scheduled: {}", schedule);
    Ok(Some(scheduler))
}
