use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::EngineError;
use crate::models::EventDescriptor;

#[async_trait]
pub trait EventResolver: Send + Sync {
    async fn resolve(&self, event_id: &str) -> Result<Option<EventDescriptor>, EngineError>;
}

pub struct PgEventResolver {
    pool: PgPool,
}

impl PgEventResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventResolver for PgEventResolver {
    async fn resolve(&self, event_id: &str) -> Result<Option<EventDescriptor>, EngineError> {
        let row = sqlx::query("SELECT id, title FROM feedback_analytics.events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| EventDescriptor {
            id: row.get("id"),
            title: row.get("title"),
        }))
    }
}

/// Fixed event list for tests and demos.
pub struct StaticEventResolver {
    events: Vec<EventDescriptor>,
}

impl StaticEventResolver {
    pub fn new(events: Vec<EventDescriptor>) -> Self {
        Self { events }
    }

    pub fn single(id: &str) -> Self {
        Self::new(vec![EventDescriptor {
            id: id.to_string(),
            title: id.to_string(),
        }])
    }
}

#[async_trait]
impl EventResolver for StaticEventResolver {
    async fn resolve(&self, event_id: &str) -> Result<Option<EventDescriptor>, EngineError> {
        Ok(self.events.iter().find(|e| e.id == event_id).cloned())
    }
}
