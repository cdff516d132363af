use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::aoi::{Aoi, AoiId};
use crate::models::change::{ChangeRecord, NewChangeRecord};

pub mod aoi_queries;
pub mod change_queries;

pub use aoi_queries::PgAoiStore;
pub use change_queries::PgChangeRecordStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Durable records of monitored areas.
#[async_trait]
pub trait AoiStore: Send + Sync {
    /// All AOIs whose status is `active`.
    async fn list_active(&self) -> Result<Vec<Aoi>, StoreError>;

    async fn get(&self, id: AoiId) -> Result<Option<Aoi>, StoreError>;

    async fn update_last_checked(&self, id: AoiId, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Persisted detection events.
#[async_trait]
pub trait ChangeRecordStore: Send + Sync {
    async fn insert(&self, record: NewChangeRecord) -> Result<Uuid, StoreError>;

    /// Newest first.
    async fn list_by_aoi(&self, aoi_id: AoiId) -> Result<Vec<ChangeRecord>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored document is malformed: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
