use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

use crate::models::change::{AnalysisWindow, ChangeThresholds};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Operator HTTP bind address for health and metrics.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the manual trigger queue
    pub redis_url: String,

    /// Six-field cron expression (with seconds), evaluated in UTC.
    #[serde(default = "default_check_schedule")]
    pub check_schedule: String,

    /// Upper bound on concurrently running AOI checks.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    #[serde(default = "default_detector_timeout_secs")]
    pub detector_timeout_secs: u64,

    /// Upper bound on one alert delivery, thumbnail rendering included.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    /// Base URL of the remote geospatial compute service
    pub detector_url: String,

    pub detector_api_token: String,

    #[serde(default = "default_min_change_area")]
    pub min_change_area_sq_meters: f64,

    #[serde(default = "default_ndvi_drop_threshold")]
    pub ndvi_drop_threshold: f64,

    #[serde(default = "default_baseline_start")]
    pub baseline_start: NaiveDate,

    #[serde(default = "default_baseline_end")]
    pub baseline_end: NaiveDate,

    #[serde(default = "default_recent_start")]
    pub recent_start: NaiveDate,

    #[serde(default = "default_recent_end")]
    pub recent_end: NaiveDate,

    /// SendGrid API key. Email alerts are skipped when unset.
    #[serde(default)]
    pub sendgrid_api_key: Option<String>,

    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    #[serde(default = "default_trigger_poll_interval_ms")]
    pub trigger_poll_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_check_schedule() -> String {
    "0 30 1 * * *".to_string()
}

fn default_max_concurrent_checks() -> usize {
    4
}

fn default_detector_timeout_secs() -> u64 {
    300
}

fn default_notify_timeout_secs() -> u64 {
    60
}

fn default_min_change_area() -> f64 {
    500.0
}

fn default_ndvi_drop_threshold() -> f64 {
    0.25
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

fn default_baseline_start() -> NaiveDate {
    date(2019, 1, 8)
}

fn default_baseline_end() -> NaiveDate {
    date(2023, 3, 14)
}

fn default_recent_start() -> NaiveDate {
    date(2024, 11, 1)
}

fn default_recent_end() -> NaiveDate {
    date(2025, 4, 30)
}

fn default_sender_email() -> String {
    "alerts@aoi-watch.local".to_string()
}

fn default_trigger_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler or pool cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_checks == 0 {
            return Err(ConfigError::Invalid(
                "MAX_CONCURRENT_CHECKS must be at least 1".to_string(),
            ));
        }
        if self.check_schedule.split_whitespace().count() != 6 {
            return Err(ConfigError::Invalid(format!(
                "CHECK_SCHEDULE must have six fields (sec min hour dom mon dow), got '{}'",
                self.check_schedule
            )));
        }
        if let Err(e) = tokio_cron_scheduler::Job::new(self.check_schedule.as_str(), |_, _| {}) {
            return Err(ConfigError::Invalid(format!(
                "CHECK_SCHEDULE '{}' is not a valid cron expression: {:?}",
                self.check_schedule, e
            )));
        }
        if self.detector_timeout_secs == 0 || self.notify_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "DETECTOR_TIMEOUT_SECS and NOTIFY_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if !self.baseline_window().is_valid() || !self.recent_window().is_valid() {
            return Err(ConfigError::Invalid(
                "analysis window start must not be after its end".to_string(),
            ));
        }
        if self.baseline_end > self.recent_start {
            return Err(ConfigError::Invalid(
                "baseline window must end before the recent window starts".to_string(),
            ));
        }
        if !(self.min_change_area_sq_meters >= 0.0) || !(self.ndvi_drop_threshold > 0.0) {
            return Err(ConfigError::Invalid(
                "change thresholds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn baseline_window(&self) -> AnalysisWindow {
        AnalysisWindow::new(self.baseline_start, self.baseline_end)
    }

    pub fn recent_window(&self) -> AnalysisWindow {
        AnalysisWindow::new(self.recent_start, self.recent_end)
    }

    pub fn thresholds(&self) -> ChangeThresholds {
        ChangeThresholds {
            min_area_sq_meters: self.min_change_area_sq_meters,
            ndvi_drop: self.ndvi_drop_threshold,
        }
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_secs(self.detector_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn trigger_poll_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_poll_interval_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
