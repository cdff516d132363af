//! Sample AOIs for core tests.

#![allow(dead_code)]

use aoi_watch::models::aoi::{
    Aoi, AoiStatus, ChangeType, MonitoringFrequency, NotificationPreferences,
};
use chrono::Utc;
use uuid::Uuid;

/// A small square polygon; the offset keeps each AOI's geometry distinct.
pub fn square(offset: f64) -> serde_json::Value {
    let (x, y) = (77.5 + offset, 12.9 + offset);
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [[[x, y], [x + 0.01, y], [x + 0.01, y + 0.01], [x, y + 0.01], [x, y]]]
    })
}

pub fn aoi(name: &str, status: AoiStatus, offset: f64) -> Aoi {
    Aoi {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        owner_email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        name: name.to_string(),
        geometry: square(offset),
        change_type: ChangeType::Deforestation,
        monitoring_frequency: MonitoringFrequency::Daily,
        confidence_threshold: 75,
        notifications: NotificationPreferences::default(),
        status,
        last_checked_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn active(name: &str) -> Aoi {
    aoi(name, AoiStatus::Active, 0.0)
}

/// `count` active AOIs with distinct geometries.
pub fn active_set(count: usize) -> Vec<Aoi> {
    (0..count)
        .map(|i| aoi(&format!("Forest {}", i), AoiStatus::Active, i as f64 * 0.1))
        .collect()
}
