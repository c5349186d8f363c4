use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::models::{
    ActivityStats, AnalyticsSnapshot, FeedbackRecord, RecentSentiment, SentimentBreakdown,
    TimeWindowCounts, TrendSeries,
};
use crate::store::FeedbackStore;

pub const HOURLY_BUCKETS: usize = 24;
pub const DAILY_BUCKETS: usize = 7;
pub const RECENT_SENTIMENT_LIMIT: usize = 10;

/// Reads the full record set for an event and folds it into a snapshot.
/// Stateless over its inputs; safe to call concurrently.
pub async fn compute_snapshot(
    store: &dyn FeedbackStore,
    event_id: &str,
) -> Result<AnalyticsSnapshot, EngineError> {
    let records = store.read_all(event_id).await?;
    Ok(fold_snapshot(&records, Utc::now()))
}

pub fn fold_snapshot(records: &[FeedbackRecord], now: DateTime<Utc>) -> AnalyticsSnapshot {
    if records.is_empty() {
        return empty_snapshot(now);
    }

    struct ActivityAcc {
        count: u64,
        rating_total: i64,
        sentiments: SentimentBreakdown,
    }

    let mut rating_total = 0i64;
    let mut sentiment_breakdown = SentimentBreakdown::default();
    let mut activities: BTreeMap<String, ActivityAcc> = BTreeMap::new();
    let mut rating_distribution: BTreeMap<u8, u64> = (1..=5).map(|r| (r, 0)).collect();
    let mut language_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut time_windows = TimeWindowCounts::default();
    let mut hourly = vec![0u64; HOURLY_BUCKETS];
    let mut daily = vec![0u64; DAILY_BUCKETS];

    for record in records {
        rating_total += record.star_rating as i64;
        sentiment_breakdown.record(record.sentiment);

        let activity = activities
            .entry(record.activity.clone())
            .or_insert(ActivityAcc {
                count: 0,
                rating_total: 0,
                sentiments: SentimentBreakdown::default(),
            });
        activity.count += 1;
        activity.rating_total += record.star_rating as i64;
        activity.sentiments.record(record.sentiment);

        let rating = record.star_rating.clamp(1, 5) as u8;
        *rating_distribution.entry(rating).or_insert(0) += 1;

        *language_distribution
            .entry(record.language.clone())
            .or_insert(0) += 1;

        let age_secs = now.signed_duration_since(record.timestamp).num_seconds();
        if age_secs < 24 * 3600 {
            time_windows.last_24_hours += 1;
        }
        if age_secs < 7 * 24 * 3600 {
            time_windows.last_7_days += 1;
        }
        if age_secs < 30 * 24 * 3600 {
            time_windows.last_30_days += 1;
        }

        // Trend buckets are ordered oldest first, so the most recent hour
        // lands in the final slot.
        let hour_bucket = age_secs.div_euclid(3600);
        if (0..HOURLY_BUCKETS as i64).contains(&hour_bucket) {
            hourly[HOURLY_BUCKETS - 1 - hour_bucket as usize] += 1;
        }
        let day_bucket = age_secs.div_euclid(24 * 3600);
        if (0..DAILY_BUCKETS as i64).contains(&day_bucket) {
            daily[DAILY_BUCKETS - 1 - day_bucket as usize] += 1;
        }
    }

    let total = records.len() as u64;
    let activity_breakdown = activities
        .into_iter()
        .map(|(name, acc)| {
            (
                name,
                ActivityStats {
                    count: acc.count,
                    average_rating: acc.rating_total as f64 / acc.count as f64,
                    sentiments: acc.sentiments,
                },
            )
        })
        .collect();

    let mut recent: Vec<&FeedbackRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    let recent_sentiment = recent
        .into_iter()
        .take(RECENT_SENTIMENT_LIMIT)
        .map(|r| RecentSentiment {
            sentiment: r.sentiment,
            star_rating: r.star_rating,
            timestamp: r.timestamp,
        })
        .collect();

    AnalyticsSnapshot {
        total_feedback: total,
        average_rating: rating_total as f64 / total as f64,
        sentiment_breakdown,
        activity_breakdown,
        rating_distribution,
        language_distribution,
        time_windows,
        trend: TrendSeries {
            hourly,
            daily,
            recent_sentiment,
        },
        last_updated: now,
    }
}

fn empty_snapshot(now: DateTime<Utc>) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        total_feedback: 0,
        average_rating: 0.0,
        sentiment_breakdown: SentimentBreakdown::default(),
        activity_breakdown: BTreeMap::new(),
        rating_distribution: BTreeMap::new(),
        language_distribution: BTreeMap::new(),
        time_windows: TimeWindowCounts::default(),
        trend: TrendSeries {
            hourly: vec![0; HOURLY_BUCKETS],
            daily: vec![0; DAILY_BUCKETS],
            recent_sentiment: Vec::new(),
        },
        last_updated: now,
    }
}
