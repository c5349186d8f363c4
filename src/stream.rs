use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::analytics::compute_snapshot;
use crate::models::{AnalyticsSnapshot, RecentSentiment, SentimentBreakdown};
use crate::store::FeedbackStore;

/// Snapshot recompute-and-push cadence per subscriber.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(10);
/// Idle keep-alive cadence so intermediaries do not time the stream out.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
pub const LATEST_FEEDBACK_LIMIT: usize = 5;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Connected {
        event_id: String,
    },
    Update {
        timestamp: DateTime<Utc>,
        data: SnapshotDelta,
    },
    Ping {
        timestamp: DateTime<Utc>,
    },
    Error {
        timestamp: DateTime<Utc>,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDelta {
    pub total_feedback: u64,
    pub average_rating: f64,
    pub sentiment_breakdown: SentimentBreakdown,
    pub latest_feedback: Vec<RecentSentiment>,
}

impl SnapshotDelta {
    fn from_snapshot(snapshot: &AnalyticsSnapshot) -> Self {
        Self {
            total_feedback: snapshot.total_feedback,
            average_rating: snapshot.average_rating,
            sentiment_breakdown: snapshot.sentiment_breakdown,
            latest_feedback: snapshot
                .trend
                .recent_sentiment
                .iter()
                .take(LATEST_FEEDBACK_LIMIT)
                .cloned()
                .collect(),
        }
    }
}

pub struct AnalyticsBroadcaster {
    store: Arc<dyn FeedbackStore>,
}

impl AnalyticsBroadcaster {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    /// Opens one stream for one subscriber. The returned subscription owns
    /// the push task; dropping it tears the whole stream down.
    pub fn subscribe(&self, event_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(stream_to_subscriber(
            Arc::clone(&self.store),
            event_id.to_string(),
            tx,
        ));
        Subscription { events: rx, task }
    }
}

pub struct Subscription {
    events: mpsc::Receiver<StreamEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn stream_to_subscriber(
    store: Arc<dyn FeedbackStore>,
    event_id: String,
    tx: mpsc::Sender<StreamEvent>,
) {
    if tx
        .send(StreamEvent::Connected {
            event_id: event_id.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    // Initial delta so the client never waits for the first tick.
    if push_update(store.as_ref(), &event_id, &tx).await.is_err() {
        return;
    }

    let mut updates = interval_at(Instant::now() + UPDATE_INTERVAL, UPDATE_INTERVAL);
    updates.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut keepalive = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = updates.tick() => {
                if push_update(store.as_ref(), &event_id, &tx).await.is_err() {
                    break;
                }
            }
            _ = keepalive.tick() => {
                if tx.send(StreamEvent::Ping { timestamp: Utc::now() }).await.is_err() {
                    break;
                }
            }
            _ = tx.closed() => break,
        }
    }

    info!("subscriber for event {event_id} disconnected");
}

/// A failed recompute becomes an inline error event; the stream stays open.
async fn push_update(
    store: &dyn FeedbackStore,
    event_id: &str,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<(), mpsc::error::SendError<StreamEvent>> {
    match compute_snapshot(store, event_id).await {
        Ok(snapshot) => {
            tx.send(StreamEvent::Update {
                timestamp: snapshot.last_updated,
                data: SnapshotDelta::from_snapshot(&snapshot),
            })
            .await
        }
        Err(err) => {
            error!("snapshot recompute failed for event {event_id}: {err}");
            tx.send(StreamEvent::Error {
                timestamp: Utc::now(),
                message: err.to_string(),
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::error::EngineError;
    use crate::models::{FeedbackRecord, Sentiment};
    use crate::store::MemoryFeedbackStore;

    struct FailingStore;

    #[async_trait]
    impl FeedbackStore for FailingStore {
        async fn append(&self, _record: FeedbackRecord) -> Result<FeedbackRecord, EngineError> {
            Err(EngineError::StoreUnavailable(sqlx::Error::PoolClosed))
        }

        async fn read_all(&self, _event_id: &str) -> Result<Vec<FeedbackRecord>, EngineError> {
            Err(EngineError::StoreUnavailable(sqlx::Error::PoolClosed))
        }

        async fn delete_event(&self, _event_id: &str) -> Result<u64, EngineError> {
            Err(EngineError::StoreUnavailable(sqlx::Error::PoolClosed))
        }
    }

    fn record(event_id: &str, rating: i32) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4(),
            event_id: event_id.to_string(),
            activity: "Keynote".to_string(),
            star_rating: rating,
            comment: String::new(),
            sentiment: Sentiment::Positive,
            sentiment_score: 0.8,
            sentiment_confidence: 0.8,
            language: "en".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_receives_connected_then_initial_delta() {
        let store = Arc::new(MemoryFeedbackStore::new());
        store.append(record("e1", 5)).await.unwrap();
        store.append(record("e1", 3)).await.unwrap();

        let broadcaster = AnalyticsBroadcaster::new(store);
        let mut sub = broadcaster.subscribe("e1");

        assert_eq!(
            sub.next_event().await.unwrap(),
            StreamEvent::Connected {
                event_id: "e1".to_string()
            }
        );
        match sub.next_event().await.unwrap() {
            StreamEvent::Update { data, .. } => {
                assert_eq!(data.total_feedback, 2);
                assert!((data.average_rating - 4.0).abs() < 1e-9);
                assert_eq!(data.latest_feedback.len(), 2);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_ticks_interleave_updates_and_keepalives() {
        let store = Arc::new(MemoryFeedbackStore::new());
        let broadcaster = AnalyticsBroadcaster::new(store);
        let mut sub = broadcaster.subscribe("e1");

        // connected + initial delta
        sub.next_event().await.unwrap();
        sub.next_event().await.unwrap();

        // Next 35 seconds: updates at 10/20/30, keep-alive at 30.
        let mut updates = 0;
        let mut pings = 0;
        for _ in 0..4 {
            match sub.next_event().await.unwrap() {
                StreamEvent::Update { .. } => updates += 1,
                StreamEvent::Ping { .. } => pings += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(updates, 3);
        assert_eq!(pings, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_tears_down_both_timers() {
        let store: Arc<dyn FeedbackStore> = Arc::new(MemoryFeedbackStore::new());
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(stream_to_subscriber(store, "e1".to_string(), tx));

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        drop(rx);

        // The push task owns both intervals; it must finish once the
        // receiver is gone, with no further timer fires.
        tokio::time::timeout(Duration::from_secs(60), task)
            .await
            .expect("stream task leaked after disconnect")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_is_reported_inline_and_stream_survives() {
        let broadcaster = AnalyticsBroadcaster::new(Arc::new(FailingStore));
        let mut sub = broadcaster.subscribe("e1");

        sub.next_event().await.unwrap();
        match sub.next_event().await.unwrap() {
            StreamEvent::Error { message, .. } => {
                assert!(message.contains("unavailable"));
            }
            other => panic!("expected inline error, got {other:?}"),
        }

        // Stream keeps ticking after the failure.
        match sub.next_event().await.unwrap() {
            StreamEvent::Error { .. } | StreamEvent::Ping { .. } => {}
            other => panic!("expected a later push, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_are_independent() {
        let store = Arc::new(MemoryFeedbackStore::new());
        store.append(record("e1", 4)).await.unwrap();
        let broadcaster = AnalyticsBroadcaster::new(store);

        let mut first = broadcaster.subscribe("e1");
        let mut second = broadcaster.subscribe("e1");
        first.next_event().await.unwrap();
        second.next_event().await.unwrap();

        drop(first);
        match second.next_event().await.unwrap() {
            StreamEvent::Update { data, .. } => assert_eq!(data.total_feedback, 1),
            other => panic!("expected update, got {other:?}"),
        }
    }
}
