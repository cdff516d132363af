use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::aoi::AoiId;

/// Lifecycle of a single AOI check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    CompletedNoChange,
    CompletedWithAlert,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::CompletedNoChange | JobState::CompletedWithAlert | JobState::Failed
        )
    }
}

/// Terminal result of a successful pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOutcome {
    NoChange,
    Alerted { area_sq_meters: f64 },
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::NoChange => JobState::CompletedNoChange,
            JobOutcome::Alerted { .. } => JobState::CompletedWithAlert,
        }
    }
}

/// Ephemeral unit of work. Never persisted.
#[derive(Debug, Clone)]
pub struct Job {
    pub aoi_id: AoiId,
    pub submitted_at: DateTime<Utc>,
    pub state: JobState,
}

impl Job {
    pub fn new(aoi_id: AoiId) -> Self {
        Self {
            aoi_id,
            submitted_at: Utc::now(),
            state: JobState::Queued,
        }
    }
}
