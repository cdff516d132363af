use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ChangeRecordStore, StoreError};
use crate::models::aoi::AoiId;
use crate::models::change::{ChangeRecord, ImageryDescriptor, NewChangeRecord};

/// Change record store backed by the `change_records` table.
#[derive(Clone)]
pub struct PgChangeRecordStore {
    pool: PgPool,
}

impl PgChangeRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeRecordStore for PgChangeRecordStore {
    async fn insert(&self, record: NewChangeRecord) -> Result<Uuid, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO change_records
                (aoi_id, user_id, detected_at, area_sq_meters, before_image_params, after_image_params, is_read)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING id
            "#,
        )
        .bind(record.aoi_id)
        .bind(record.user_id)
        .bind(record.detected_at)
        .bind(record.area_sq_meters)
        .bind(Json(&record.before))
        .bind(Json(&record.after))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn list_by_aoi(&self, aoi_id: AoiId) -> Result<Vec<ChangeRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aoi_id, user_id, detected_at, area_sq_meters,
                   before_image_params, after_image_params, is_read
            FROM change_records
            WHERE aoi_id = $1
            ORDER BY detected_at DESC
            "#,
        )
        .bind(aoi_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let before: Json<ImageryDescriptor> = r.try_get("before_image_params")?;
                let after: Json<ImageryDescriptor> = r.try_get("after_image_params")?;
                Ok(ChangeRecord {
                    id: r.try_get("id")?,
                    aoi_id: r.try_get("aoi_id")?,
                    user_id: r.try_get("user_id")?,
                    detected_at: r.try_get("detected_at")?,
                    area_sq_meters: r.try_get("area_sq_meters")?,
                    before: before.0,
                    after: after.0,
                    is_read: r.try_get("is_read")?,
                })
            })
            .collect()
    }
}
