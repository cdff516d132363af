use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::Instrument;

use super::dispatcher::InFlightGuard;
use super::pipeline::PipelineError;
use crate::models::aoi::AoiId;
use crate::models::job::{Job, JobOutcome, JobState};

/// The per-AOI work a pool executes.
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run(&self, aoi_id: AoiId) -> Result<JobOutcome, PipelineError>;
}

/// Bounded-concurrency executor for AOI checks.
///
/// Each job runs on its own task, so a failure or panic stays with that job.
pub struct WorkerPool {
    runner: Arc<dyn CheckRunner>,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(runner: Arc<dyn CheckRunner>, max_concurrent: usize) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Jobs currently allowed to start without waiting.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue a job. The guard is held until the job reaches a terminal state.
    pub fn spawn(&self, job: Job, guard: InFlightGuard) {
        let runner = Arc::clone(&self.runner);
        let permits = Arc::clone(&self.permits);
        let span = tracing::info_span!("aoi_check", aoi_id = %job.aoi_id);

        tokio::spawn(
            async move {
                let _guard = guard;
                execute(runner, permits, job).await;
            }
            .instrument(span),
        );
    }

    /// Run one job and wait for its terminal state. Bounded by the pool's
    /// permits but does not consult the in-flight gate.
    pub async fn run(&self, job: Job) -> JobState {
        execute(Arc::clone(&self.runner), Arc::clone(&self.permits), job).await
    }
}

async fn execute(runner: Arc<dyn CheckRunner>, permits: Arc<Semaphore>, mut job: Job) -> JobState {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            tracing::error!("Worker pool closed, dropping job");
            return JobState::Failed;
        }
    };

    job.state = JobState::Running;
    let queued_ms = (chrono::Utc::now() - job.submitted_at).num_milliseconds();
    tracing::info!(queued_ms, "Starting AOI check");

    let start = Instant::now();
    let aoi_id = job.aoi_id;
    // A panic unwinds the inner task only, so it is still counted below.
    let check = tokio::spawn(async move { runner.run(aoi_id).await }.in_current_span());
    job.state = match check.await {
        Ok(Ok(outcome)) => {
            if let JobOutcome::Alerted { area_sq_meters } = outcome {
                tracing::info!(area_sq_meters, "AOI check raised an alert");
            }
            outcome.state()
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "AOI check failed");
            JobState::Failed
        }
        Err(e) => {
            tracing::error!(error = %e, "AOI check panicked");
            JobState::Failed
        }
    };
    let elapsed = start.elapsed();

    metrics::histogram!("aoi_check_duration_seconds").record(elapsed.as_secs_f64());
    metrics::counter!("aoi_checks_completed_total", "outcome" => job.state.to_string()).increment(1);

    tracing::info!(
        outcome = %job.state,
        duration_ms = elapsed.as_millis() as u64,
        "AOI check finished"
    );

    job.state
}
