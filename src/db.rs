use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::classifier::{SentimentClassifier, SentimentVerdict, BASELINE_LANGUAGE};
use crate::models::FeedbackRecord;
use crate::store::{FeedbackStore, PgFeedbackStore};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_event(pool: &PgPool, id: &str, title: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO feedback_analytics.events (id, title)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title
        "#,
    )
    .bind(id)
    .bind(title)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    upsert_event(pool, "nuit-chercheurs-2026", "Nuit des Chercheurs 2026").await?;
    upsert_event(pool, "product-summit", "Product Summit").await?;

    let samples = vec![
        (
            "nuit-chercheurs-2026",
            "Astronomy stand",
            5,
            "Absolutely amazing demonstrations, the kids loved it",
            2i64,
        ),
        (
            "nuit-chercheurs-2026",
            "Astronomy stand",
            4,
            "Great talk, a bit crowded though",
            5,
        ),
        (
            "nuit-chercheurs-2026",
            "Chemistry lab",
            2,
            "Terrible organisation, the queue was way too long",
            26,
        ),
        ("product-summit", "Keynote", 5, "", 1),
        (
            "product-summit",
            "Roadmap Q&A",
            3,
            "The session started late",
            8,
        ),
    ];

    let classifier = SentimentClassifier::preloaded();
    let store = PgFeedbackStore::new(pool.clone());
    let now = Utc::now();

    for (event_id, activity, rating, comment, hours_ago) in samples {
        let verdict = if comment.trim().is_empty() {
            SentimentVerdict::neutral(0.0, BASELINE_LANGUAGE)
        } else {
            classifier.classify(comment)
        };
        store
            .append(FeedbackRecord {
                id: Uuid::new_v4(),
                event_id: event_id.to_string(),
                activity: activity.to_string(),
                star_rating: rating,
                comment: comment.to_string(),
                sentiment: verdict.sentiment,
                sentiment_score: verdict.score,
                sentiment_confidence: verdict.confidence,
                language: verdict.language,
                timestamp: now - Duration::hours(hours_ago),
            })
            .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        event_id: String,
        activity: String,
        star_rating: i32,
        comment: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
    }

    let classifier = SentimentClassifier::preloaded();
    let store = PgFeedbackStore::new(pool.clone());
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if !(1..=5).contains(&row.star_rating) {
            anyhow::bail!(
                "row {}: star_rating must be between 1 and 5, got {}",
                inserted + 1,
                row.star_rating
            );
        }

        upsert_event(pool, &row.event_id, &row.event_id).await?;

        let comment = row.comment.unwrap_or_default();
        let verdict = if comment.trim().is_empty() {
            SentimentVerdict::neutral(0.0, BASELINE_LANGUAGE)
        } else {
            classifier.classify(&comment)
        };

        store
            .append(FeedbackRecord {
                id: Uuid::new_v4(),
                event_id: row.event_id,
                activity: row.activity,
                star_rating: row.star_rating,
                comment,
                sentiment: verdict.sentiment,
                sentiment_score: verdict.score,
                sentiment_confidence: verdict.confidence,
                language: verdict.language,
                timestamp: row.submitted_at.unwrap_or_else(Utc::now),
            })
            .await?;
        inserted += 1;
    }

    Ok(inserted)
}
