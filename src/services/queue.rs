use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::models::aoi::AoiId;

const TRIGGER_KEY: &str = "aoi_watch:triggers";

/// Manual check request pushed by the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualTrigger {
    pub aoi_id: AoiId,
    pub requested_at: DateTime<Utc>,
}

impl ManualTrigger {
    pub fn new(aoi_id: AoiId) -> Self {
        Self {
            aoi_id,
            requested_at: Utc::now(),
        }
    }
}

/// Redis list of manual AOI check requests.
///
/// Triggers only request a check; the dispatcher still decides whether it runs.
pub struct TriggerQueue {
    client: redis::Client,
}

impl TriggerQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Request a check for an AOI outside the regular schedule.
    pub async fn enqueue(&self, trigger: &ManualTrigger) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(trigger)?;
        conn.lpush::<_, _, ()>(TRIGGER_KEY, &payload).await?;
        Ok(())
    }

    /// Pop the oldest pending trigger, if any.
    pub async fn dequeue(&self) -> Result<Option<ManualTrigger>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.rpop(TRIGGER_KEY, None).await?;

        match result {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Number of triggers waiting to be consumed.
    pub async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let depth: u64 = conn.llen(TRIGGER_KEY).await?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
