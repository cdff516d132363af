use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use super::{AoiStore, StoreError};
use crate::models::aoi::{Aoi, AoiId, AoiStatus, ChangeType, MonitoringFrequency, NotificationPreferences};

const AOI_COLUMNS: &str = r#"
    a.id, a.user_id, u.email AS owner_email, a.name, a.geometry, a.change_type,
    a.monitoring_frequency, a.confidence_threshold, a.email_alerts,
    a.in_app_notifications, a.status, a.last_checked_at, a.created_at, a.updated_at
"#;

/// AOI store backed by the `aois` table.
#[derive(Clone)]
pub struct PgAoiStore {
    pool: PgPool,
}

impl PgAoiStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_enum<T: FromStr>(column: &str, value: &str) -> Result<T, StoreError> {
    T::from_str(value).map_err(|_| StoreError::Decode(format!("unknown {} '{}'", column, value)))
}

fn aoi_from_row(r: &PgRow) -> Result<Aoi, StoreError> {
    let change_type: String = r.try_get("change_type")?;
    let frequency: String = r.try_get("monitoring_frequency")?;
    let status: String = r.try_get("status")?;

    Ok(Aoi {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        owner_email: r.try_get("owner_email")?,
        name: r.try_get("name")?,
        geometry: r.try_get("geometry")?,
        change_type: parse_enum::<ChangeType>("change_type", &change_type)?,
        monitoring_frequency: parse_enum::<MonitoringFrequency>("monitoring_frequency", &frequency)?,
        confidence_threshold: r.try_get("confidence_threshold")?,
        notifications: NotificationPreferences {
            email_alerts: r.try_get("email_alerts")?,
            in_app_notifications: r.try_get("in_app_notifications")?,
        },
        status: parse_enum::<AoiStatus>("status", &status)?,
        last_checked_at: r.try_get("last_checked_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl AoiStore for PgAoiStore {
    async fn list_active(&self) -> Result<Vec<Aoi>, StoreError> {
        let sql = format!(
            "SELECT {AOI_COLUMNS} FROM aois a LEFT JOIN users u ON u.id = a.user_id \
             WHERE a.status = 'active' ORDER BY a.created_at ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(aoi_from_row).collect()
    }

    async fn get(&self, id: AoiId) -> Result<Option<Aoi>, StoreError> {
        let sql = format!(
            "SELECT {AOI_COLUMNS} FROM aois a LEFT JOIN users u ON u.id = a.user_id WHERE a.id = $1"
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        row.as_ref().map(aoi_from_row).transpose()
    }

    async fn update_last_checked(&self, id: AoiId, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE aois
            SET last_checked_at = $1
            WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
