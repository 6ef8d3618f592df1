//! Deferred promotion attempts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::VisitRecord;
use crate::domain::time_bucket::MonthKey;

/// Everything needed to promote one URL.
///
/// `record` is a snapshot taken when the threshold was crossed; `month`
/// locates the live record so it can be marked promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    pub url: String,
    pub title: String,
    pub month: MonthKey,
    pub record: VisitRecord,
}

/// A promotion waiting in the retry queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEntry {
    #[serde(flatten)]
    pub request: PromotionRequest,
    pub enqueued_at: DateTime<Utc>,
    /// Failed attempts so far, immediate retries included.
    pub attempts: u32,
}

impl RetryEntry {
    pub fn new(request: PromotionRequest, enqueued_at: DateTime<Utc>, attempts: u32) -> Self {
        Self {
            request,
            enqueued_at,
            attempts,
        }
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Time since the entry was first queued.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.enqueued_at
    }

    /// Whether the cool-down has elapsed and the entry may be retried.
    pub fn is_due(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.age(now) > cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn entry(at: DateTime<Utc>) -> RetryEntry {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        RetryEntry::new(
            PromotionRequest {
                url: "https://example.com/".to_string(),
                title: "Example".to_string(),
                month: MonthKey::from_date(day),
                record: VisitRecord::new("Example", day),
            },
            at,
            3,
        )
    }

    #[test]
    fn test_is_due_after_cooldown_only() {
        let queued = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let entry = entry(queued);

        assert!(!entry.is_due(queued + Duration::minutes(59), Duration::hours(1)));
        assert!(!entry.is_due(queued + Duration::hours(1), Duration::hours(1)));
        assert!(entry.is_due(queued + Duration::minutes(61), Duration::hours(1)));
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let queued = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let json = serde_json::to_value(entry(queued)).unwrap();

        assert_eq!(json["url"], "https://example.com/");
        assert_eq!(json["month"], "2025-06");
        assert_eq!(json["attempts"], 3);
        assert!(json["record"]["dailyVisits"].is_object());
    }
}
