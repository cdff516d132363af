use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aoi::AoiId;

/// Inclusive date range over which a median composite is built.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// Visualization parameters applied to the composite before thumbnailing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualizationParams {
    pub bands: Vec<String>,
    pub min: f64,
    pub max: f64,
}

impl Default for VisualizationParams {
    fn default() -> Self {
        Self {
            bands: vec!["B4".to_string(), "B3".to_string(), "B2".to_string()],
            min: 0.0,
            max: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThumbnailParams {
    pub dimensions: u32,
    pub format: String,
}

impl Default for ThumbnailParams {
    fn default() -> Self {
        Self {
            dimensions: 512,
            format: "png".to_string(),
        }
    }
}

/// Everything needed to regenerate a before/after image on demand.
///
/// Rendered images are never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageryDescriptor {
    pub collection: String,
    pub geometry: serde_json::Value,
    pub window: AnalysisWindow,
    pub visualization: VisualizationParams,
    pub thumbnail: ThumbnailParams,
}

/// Output of a single change-detector call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeResult {
    pub significant_change_detected: bool,
    pub area_sq_meters: f64,
    pub before: ImageryDescriptor,
    pub after: ImageryDescriptor,
}

/// Global significance thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeThresholds {
    /// Minimum changed area; the comparison is strict.
    pub min_area_sq_meters: f64,
    /// Per-pixel NDVI loss that marks a pixel as changed.
    pub ndvi_drop: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            min_area_sq_meters: 500.0,
            ndvi_drop: 0.25,
        }
    }
}

impl ChangeThresholds {
    pub fn is_significant(&self, area_sq_meters: f64) -> bool {
        area_sq_meters.is_finite() && area_sq_meters > self.min_area_sq_meters
    }
}

/// A persisted detection event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: Uuid,
    pub aoi_id: AoiId,
    pub user_id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub area_sq_meters: f64,
    pub before: ImageryDescriptor,
    pub after: ImageryDescriptor,
    pub is_read: bool,
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewChangeRecord {
    pub aoi_id: AoiId,
    pub user_id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub area_sq_meters: f64,
    pub before: ImageryDescriptor,
    pub after: ImageryDescriptor,
}

impl NewChangeRecord {
    /// Records always start unread.
    pub fn from_result(aoi_id: AoiId, user_id: Uuid, detected_at: DateTime<Utc>, result: &ChangeResult) -> Self {
        Self {
            aoi_id,
            user_id,
            detected_at,
            area_sq_meters: result.area_sq_meters.max(0.0),
            before: result.before.clone(),
            after: result.after.clone(),
        }
    }
}
