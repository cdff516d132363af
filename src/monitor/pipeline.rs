use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::pool::CheckRunner;
use crate::db::{AoiStore, ChangeRecordStore, StoreError};
use crate::models::aoi::{Aoi, AoiId};
use crate::models::change::{AnalysisWindow, ChangeResult, NewChangeRecord};
use crate::models::job::JobOutcome;
use crate::services::detector::{ChangeDetector, DetectorError};
use crate::services::notifier::{ChangeAlert, Delivery, Notifier};

/// Fixed inputs shared by every check.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub baseline: AnalysisWindow,
    pub recent: AnalysisWindow,
    pub detector_timeout: Duration,
    /// Upper bound on one alert delivery, thumbnails included.
    pub notify_timeout: Duration,
}

/// Detector, then record and notify when the change is significant.
pub struct ChangePipeline {
    aois: Arc<dyn AoiStore>,
    detector: Arc<dyn ChangeDetector>,
    records: Arc<dyn ChangeRecordStore>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl ChangePipeline {
    pub fn new(
        aois: Arc<dyn AoiStore>,
        detector: Arc<dyn ChangeDetector>,
        records: Arc<dyn ChangeRecordStore>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            aois,
            detector,
            records,
            notifier,
            settings,
        }
    }

    /// Check one AOI end to end.
    ///
    /// `last_checked_at` is only touched once the detector has answered.
    pub async fn check(&self, aoi_id: AoiId) -> Result<JobOutcome, PipelineError> {
        let aoi = self
            .aois
            .get(aoi_id)
            .await?
            .ok_or(PipelineError::AoiNotFound(aoi_id))?;

        tracing::debug!(aoi_name = %aoi.name, "Running change detection");
        let result = self.detect(&aoi).await?;
        let checked_at = Utc::now();

        if !result.significant_change_detected {
            self.aois.update_last_checked(aoi.id, checked_at).await?;
            tracing::info!(
                aoi_name = %aoi.name,
                area_sq_meters = result.area_sq_meters,
                "No significant change"
            );
            return Ok(JobOutcome::NoChange);
        }

        let record = NewChangeRecord::from_result(aoi.id, aoi.user_id, checked_at, &result);
        let area_sq_meters = record.area_sq_meters;
        let record_id = self.records.insert(record).await?;

        tracing::info!(
            aoi_name = %aoi.name,
            record_id = %record_id,
            area_sq_meters,
            "Significant change recorded"
        );

        let touched = self.aois.update_last_checked(aoi.id, checked_at).await;
        if let Err(e) = &touched {
            tracing::error!(error = %e, "Failed to update last checked time after recording change");
        }

        // The record is already durable; a failed alert does not undo it.
        let alert = ChangeAlert {
            record_id,
            aoi_id: aoi.id,
            aoi_name: aoi.name.clone(),
            change_type: aoi.change_type,
            area_sq_meters,
            before: result.before,
            after: result.after,
            preferences: aoi.notifications,
        };
        let send = self.notifier.send(aoi.owner_email.as_deref(), &alert);
        match tokio::time::timeout(self.settings.notify_timeout, send).await {
            Ok(Ok(Delivery::Sent)) => tracing::debug!(record_id = %record_id, "Alert delivered"),
            Ok(Ok(Delivery::Skipped)) => tracing::debug!(record_id = %record_id, "Alert skipped"),
            Ok(Err(e)) => {
                metrics::counter!("aoi_alerts_failed_total").increment(1);
                tracing::warn!(record_id = %record_id, error = %e, "Failed to send change alert");
            }
            Err(_) => {
                metrics::counter!("aoi_alerts_failed_total").increment(1);
                tracing::warn!(
                    record_id = %record_id,
                    timeout_secs = self.settings.notify_timeout.as_secs_f64(),
                    "Change alert timed out"
                );
            }
        }

        touched?;
        Ok(JobOutcome::Alerted { area_sq_meters })
    }

    async fn detect(&self, aoi: &Aoi) -> Result<ChangeResult, PipelineError> {
        let timeout = self.settings.detector_timeout;
        let call = self
            .detector
            .detect(&aoi.geometry, self.settings.baseline, self.settings.recent);

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PipelineError::Detector(DetectorError::Timeout(timeout))),
        }
    }
}

#[async_trait]
impl CheckRunner for ChangePipeline {
    async fn run(&self, aoi_id: AoiId) -> Result<JobOutcome, PipelineError> {
        self.check(aoi_id).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("AOI {0} not found")]
    AoiNotFound(AoiId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Change detection failed: {0}")]
    Detector(#[from] DetectorError),
}
