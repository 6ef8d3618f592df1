//! Counts visits and decides when a URL crosses the promotion threshold.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::application::services::{AggregateStore, SettingsService};
use crate::domain::entities::{PromotionRequest, VisitRecord};
use crate::domain::repositories::StorageError;
use crate::domain::time_bucket::{MonthKey, day_key};
use crate::utils::tracking_url::canonical_url;

/// Why a visit was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Tracking is switched off in settings.
    Disabled,
    /// Unsupported scheme, malformed URL, or excluded by the user.
    NotEligible,
}

/// Result of [`VisitAggregator::record_visit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionDecision {
    /// The visit was not counted.
    Ignored(IgnoreReason),
    /// Counted; nothing further to do.
    NoPromotion,
    /// Counted, but today's visits reached the daily exclude threshold, so
    /// this day never triggers a promotion.
    DailyLimitReached { today_visits: u32 },
    /// Counted and the threshold is newly crossed; the caller should promote.
    PromoteNow(PromotionRequest),
}

enum Step {
    Counted,
    DailyLimit(u32),
    Promote(VisitRecord),
}

/// Applies visit events to the [`AggregateStore`].
///
/// The whole read-modify-write for one visit runs inside
/// [`AggregateStore::upsert`] and is therefore serialised per URL. The
/// promotion itself is left to the caller so that no bookmark I/O happens
/// while the record is locked.
pub struct VisitAggregator {
    store: Arc<AggregateStore>,
    settings: Arc<SettingsService>,
}

impl VisitAggregator {
    pub fn new(store: Arc<AggregateStore>, settings: Arc<SettingsService>) -> Self {
        Self { store, settings }
    }

    /// Records one visit observed at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the updated record cannot be persisted; the
    /// visit is not counted in that case.
    pub async fn record_visit(
        &self,
        url: &str,
        title: &str,
        at: DateTime<Utc>,
    ) -> Result<PromotionDecision, StorageError> {
        let settings = self.settings.current();
        if !settings.enabled {
            trace!(url = %url, "Tracking disabled, ignoring visit");
            return Ok(PromotionDecision::Ignored(IgnoreReason::Disabled));
        }

        let Ok(url) = canonical_url(url) else {
            trace!(url = %url, "Ignoring non-trackable URL");
            return Ok(PromotionDecision::Ignored(IgnoreReason::NotEligible));
        };
        if !self.settings.filter().is_eligible(&url) {
            trace!(url = %url, "URL excluded from tracking");
            return Ok(PromotionDecision::Ignored(IgnoreReason::NotEligible));
        }

        let month = MonthKey::from_datetime(at);
        let today = day_key(at);
        let threshold = settings.threshold;
        let exclude_daily_threshold = settings.exclude_daily_threshold;
        let latest_title = title.to_string();

        let step = self
            .store
            .upsert(
                month,
                &url,
                || VisitRecord::new(title, today),
                |record| {
                    record.title = latest_title;
                    let today_visits = record.record_visit(today);

                    if today_visits >= exclude_daily_threshold {
                        Step::DailyLimit(today_visits)
                    } else if record.total_count >= threshold && !record.promoted {
                        Step::Promote(record.clone())
                    } else {
                        Step::Counted
                    }
                },
            )
            .await?;

        counter!("visits_recorded_total").increment(1);

        let decision = match step {
            Step::Counted => PromotionDecision::NoPromotion,
            Step::DailyLimit(today_visits) => {
                debug!(url = %url, today_visits, "Daily exclude threshold reached");
                PromotionDecision::DailyLimitReached { today_visits }
            }
            Step::Promote(record) => {
                debug!(
                    url = %url,
                    total = record.total_count,
                    month = %month,
                    "Promotion threshold crossed"
                );
                PromotionDecision::PromoteNow(PromotionRequest {
                    title: record.title.clone(),
                    url,
                    month,
                    record,
                })
            }
        };

        Ok(decision)
    }
}
