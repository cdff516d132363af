use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Identifier of a monitored area.
pub type AoiId = Uuid;

/// Lifecycle status of an AOI. Only `Active` areas are picked up by the scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AoiStatus {
    Active,
    Paused,
}

/// How often the owner asked for the area to be checked.
///
/// Stored for the CRUD layer; the scheduler applies one global cadence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MonitoringFrequency {
    Daily,
    Weekly,
    Monthly,
}

/// Land-cover change classifier selected by the owner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
    Deforestation,
    Urbanization,
    WaterBody,
    Agriculture,
}

impl ChangeType {
    /// Human-readable label used in alerts.
    pub fn describe(&self) -> &'static str {
        match self {
            ChangeType::Deforestation => "Deforestation (NDVI Drop)",
            ChangeType::Urbanization => "Urbanization",
            ChangeType::WaterBody => "Water Body Change",
            ChangeType::Agriculture => "Agricultural Change",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub email_alerts: bool,
    pub in_app_notifications: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_alerts: true,
            in_app_notifications: true,
        }
    }
}

/// A user-defined Area of Interest.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Aoi {
    #[garde(skip)]
    pub id: AoiId,

    #[garde(skip)]
    pub user_id: Uuid,

    /// Contact address of the owning user, joined from the users table.
    #[garde(skip)]
    pub owner_email: Option<String>,

    #[garde(length(min = 1, max = 200))]
    pub name: String,

    /// GeoJSON geometry object (Polygon or MultiPolygon).
    #[garde(skip)]
    pub geometry: serde_json::Value,

    #[garde(skip)]
    pub change_type: ChangeType,

    #[garde(skip)]
    pub monitoring_frequency: MonitoringFrequency,

    /// Reserved for per-area sensitivity; the pipeline applies global thresholds.
    #[garde(range(min = 0, max = 100))]
    pub confidence_threshold: i32,

    #[garde(skip)]
    pub notifications: NotificationPreferences,

    #[garde(skip)]
    pub status: AoiStatus,

    #[garde(skip)]
    pub last_checked_at: Option<DateTime<Utc>>,

    #[garde(skip)]
    pub created_at: DateTime<Utc>,

    #[garde(skip)]
    pub updated_at: DateTime<Utc>,
}

impl Aoi {
    pub fn is_active(&self) -> bool {
        self.status == AoiStatus::Active
    }
}
