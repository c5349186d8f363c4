use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::classifier::{SentimentClassifier, SentimentVerdict, BASELINE_LANGUAGE};
use crate::error::EngineError;
use crate::events::EventResolver;
use crate::models::{FeedbackRecord, NewFeedback};
use crate::store::FeedbackStore;

/// Bounded wait for the model load before degrading to neutral.
pub const CLASSIFIER_WAIT: Duration = Duration::from_secs(2);

pub struct FeedbackIngestor {
    store: Arc<dyn FeedbackStore>,
    events: Arc<dyn EventResolver>,
    classifier: SentimentClassifier,
}

impl FeedbackIngestor {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        events: Arc<dyn EventResolver>,
        classifier: SentimentClassifier,
    ) -> Self {
        Self {
            store,
            events,
            classifier,
        }
    }

    pub async fn submit(&self, input: NewFeedback) -> Result<FeedbackRecord, EngineError> {
        if input.activity.trim().is_empty() {
            return Err(EngineError::Validation(
                "activity must not be empty".to_string(),
            ));
        }
        if !(1..=5).contains(&input.star_rating) {
            return Err(EngineError::Validation(format!(
                "starRating must be between 1 and 5, got {}",
                input.star_rating
            )));
        }
        if self.events.resolve(&input.event_id).await?.is_none() {
            return Err(EngineError::EventNotFound(input.event_id));
        }

        let comment = input.comment.unwrap_or_default();
        let verdict = if comment.trim().is_empty() {
            SentimentVerdict::neutral(0.0, BASELINE_LANGUAGE)
        } else {
            self.classifier
                .classify_with_wait(&comment, CLASSIFIER_WAIT)
                .await
        };

        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            event_id: input.event_id,
            activity: input.activity,
            star_rating: input.star_rating,
            comment,
            sentiment: verdict.sentiment,
            sentiment_score: verdict.score,
            sentiment_confidence: verdict.confidence,
            language: verdict.language,
            timestamp: Utc::now(),
        };

        let stored = self.store.append(record).await?;
        info!(
            "stored feedback {} for event {} ({})",
            stored.id,
            stored.event_id,
            stored.sentiment.as_str()
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StaticEventResolver;
    use crate::models::Sentiment;
    use crate::store::MemoryFeedbackStore;

    fn ingestor() -> FeedbackIngestor {
        FeedbackIngestor::new(
            Arc::new(MemoryFeedbackStore::new()),
            Arc::new(StaticEventResolver::single("conf-2026")),
            SentimentClassifier::preloaded(),
        )
    }

    fn input(rating: i32, comment: Option<&str>) -> NewFeedback {
        NewFeedback {
            event_id: "conf-2026".to_string(),
            activity: "Keynote".to_string(),
            star_rating: rating,
            comment: comment.map(String::from),
        }
    }

    #[tokio::test]
    async fn rejects_out_of_range_ratings() {
        let ingestor = ingestor();
        for rating in [0, 6] {
            let err = ingestor.submit(input(rating, None)).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }
        for rating in [1, 5] {
            assert!(ingestor.submit(input(rating, None)).await.is_ok());
        }
    }

    #[tokio::test]
    async fn rejects_blank_activity() {
        let ingestor = ingestor();
        let mut bad = input(3, None);
        bad.activity = "  ".to_string();
        let err = ingestor.submit(bad).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_event() {
        let ingestor = ingestor();
        let mut bad = input(3, None);
        bad.event_id = "nope".to_string();
        let err = ingestor.submit(bad).await.unwrap_err();
        assert!(matches!(err, EngineError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn empty_comment_defaults_to_neutral_without_inference() {
        let classifier = SentimentClassifier::preloaded();
        let ingestor = FeedbackIngestor::new(
            Arc::new(MemoryFeedbackStore::new()),
            Arc::new(StaticEventResolver::single("conf-2026")),
            classifier.clone(),
        );

        let stored = ingestor.submit(input(4, Some(""))).await.unwrap();
        assert_eq!(stored.sentiment, Sentiment::Neutral);
        assert_eq!(stored.sentiment_score, 0.5);
        assert_eq!(stored.sentiment_confidence, 0.0);
        assert_eq!(stored.language, BASELINE_LANGUAGE);
        assert_eq!(classifier.status().analysis_count, 0);
    }

    #[tokio::test]
    async fn comment_is_classified_and_attached() {
        let ingestor = ingestor();
        let stored = ingestor
            .submit(input(5, Some("Fantastic talk, really enjoyed it")))
            .await
            .unwrap();
        assert_eq!(stored.sentiment, Sentiment::Positive);
        assert!(stored.sentiment_score > 0.5);
        assert!(stored.sentiment_confidence > 0.0);
    }
}
