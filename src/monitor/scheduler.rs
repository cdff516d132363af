use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::dispatcher::{Dispatcher, SubmitOutcome};
use crate::db::AoiStore;

/// What one scheduler firing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringReport {
    Dispatched { accepted: usize, duplicates: usize },
    /// A previous firing was still enumerating.
    Skipped,
    /// The AOI store could not be listed.
    Failed,
}

/// Periodic trigger that submits one check per active AOI.
pub struct Scheduler {
    aois: Arc<dyn AoiStore>,
    dispatcher: Arc<Dispatcher>,
    firing: Mutex<()>,
}

impl Scheduler {
    pub fn new(aois: Arc<dyn AoiStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            aois,
            dispatcher,
            firing: Mutex::new(()),
        }
    }

    /// Enumerate active AOIs and submit each to the dispatcher.
    ///
    /// Overlapping firings are dropped rather than queued.
    pub async fn fire(&self) -> FiringReport {
        let Ok(_firing) = self.firing.try_lock() else {
            tracing::warn!("Previous scheduler firing still running, skipping");
            metrics::counter!("aoi_scheduler_firings_total", "result" => "skipped").increment(1);
            return FiringReport::Skipped;
        };

        tracing::info!("Scheduler firing: fetching active AOIs");

        let aois = match self.aois.list_active().await {
            Ok(aois) => aois,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list active AOIs, skipping this firing");
                metrics::counter!("aoi_scheduler_firings_total", "result" => "failed").increment(1);
                return FiringReport::Failed;
            }
        };

        let mut accepted = 0;
        let mut duplicates = 0;
        for aoi in aois.iter().filter(|aoi| aoi.is_active()) {
            match self.dispatcher.submit(aoi.id) {
                SubmitOutcome::Accepted => {
                    tracing::debug!(aoi_id = %aoi.id, aoi_name = %aoi.name, "Dispatched AOI check");
                    accepted += 1;
                }
                SubmitOutcome::RejectedDuplicate => duplicates += 1,
            }
        }

        tracing::info!(accepted, duplicates, "Scheduler firing complete");
        metrics::counter!("aoi_scheduler_firings_total", "result" => "dispatched").increment(1);

        FiringReport::Dispatched { accepted, duplicates }
    }

    /// Register [`Scheduler::fire`] on a six-field cron schedule (UTC) and start it.
    pub async fn start(self: Arc<Self>, schedule: &str) -> Result<JobScheduler, SchedulerError> {
        let sched = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Cron(format!("creating scheduler: {:?}", e)))?;

        let scheduler = Arc::clone(&self);
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let scheduler = Arc::clone(&scheduler);
            Box::pin(async move {
                scheduler.fire().await;
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule(format!("'{}': {:?}", schedule, e)))?;

        sched
            .add(job)
            .await
            .map_err(|e| SchedulerError::Cron(format!("adding job: {:?}", e)))?;
        sched
            .start()
            .await
            .map_err(|e| SchedulerError::Cron(format!("starting scheduler: {:?}", e)))?;

        tracing::info!(schedule, "AOI check schedule started");
        Ok(sched)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid check schedule {0}")]
    InvalidSchedule(String),

    #[error("Cron scheduler error: {0}")]
    Cron(String),
}
