use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::EngineError;
use crate::models::{FeedbackRecord, Sentiment};

/// Narrow persistence contract for feedback records. Appends are atomic per
/// record; `read_all` returns records in unspecified order.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append(&self, record: FeedbackRecord) -> Result<FeedbackRecord, EngineError>;
    async fn read_all(&self, event_id: &str) -> Result<Vec<FeedbackRecord>, EngineError>;
    /// Administrative: removes every record for an event.
    async fn delete_event(&self, event_id: &str) -> Result<u64, EngineError>;
}

pub struct PgFeedbackStore {
    pool: PgPool,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn append(&self, record: FeedbackRecord) -> Result<FeedbackRecord, EngineError> {
        sqlx::query(
            r#"
            INSERT INTO feedback_analytics.feedback
            (id, event_id, activity, star_rating, comment,
             sentiment, sentiment_score, sentiment_confidence, language, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(&record.event_id)
        .bind(&record.activity)
        .bind(record.star_rating)
        .bind(&record.comment)
        .bind(record.sentiment.as_str())
        .bind(record.sentiment_score)
        .bind(record.sentiment_confidence)
        .bind(&record.language)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn read_all(&self, event_id: &str) -> Result<Vec<FeedbackRecord>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, activity, star_rating, comment,
                   sentiment, sentiment_score, sentiment_confidence, language, submitted_at
            FROM feedback_analytics.feedback
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let sentiment: String = row.get("sentiment");
            records.push(FeedbackRecord {
                id: row.get("id"),
                event_id: row.get("event_id"),
                activity: row.get("activity"),
                star_rating: row.get("star_rating"),
                comment: row.get("comment"),
                sentiment: Sentiment::from_str(&sentiment)
                    .unwrap_or(Sentiment::Neutral),
                sentiment_score: row.get("sentiment_score"),
                sentiment_confidence: row.get("sentiment_confidence"),
                language: row.get("language"),
                timestamp: row.get("submitted_at"),
            });
        }

        Ok(records)
    }

    async fn delete_event(&self, event_id: &str) -> Result<u64, EngineError> {
        let result = sqlx::query("DELETE FROM feedback_analytics.feedback WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Process-local store used by tests and demos.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn append(&self, record: FeedbackRecord) -> Result<FeedbackRecord, EngineError> {
        let mut records = self.records.lock().expect("feedback store lock poisoned");
        records.push(record.clone());
        Ok(record)
    }

    async fn read_all(&self, event_id: &str) -> Result<Vec<FeedbackRecord>, EngineError> {
        let records = self.records.lock().expect("feedback store lock poisoned");
        Ok(records
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn delete_event(&self, event_id: &str) -> Result<u64, EngineError> {
        let mut records = self.records.lock().expect("feedback store lock poisoned");
        let before = records.len();
        records.retain(|r| r.event_id != event_id);
        Ok((before - records.len()) as u64)
    }
}
