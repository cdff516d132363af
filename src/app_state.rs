use sqlx::PgPool;
use std::sync::Arc;

use crate::monitor::Dispatcher;
use crate::services::queue::TriggerQueue;

/// Shared state for the operator routes.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub triggers: Arc<TriggerQueue>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(db: PgPool, triggers: Arc<TriggerQueue>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            db,
            triggers,
            dispatcher,
        }
    }
}
