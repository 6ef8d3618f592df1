//! Periodic re-attempts of queued promotions.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::{PromotionExecutor, RetryPolicy, RetryQueue};
use crate::domain::entities::RetryEntry;
use crate::domain::repositories::StorageError;

/// Summary of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Entries whose cool-down had elapsed and were tried.
    pub attempted: usize,
    /// Entries removed because the bookmark now exists.
    pub resolved: usize,
    /// Entries still queued after the pass.
    pub kept: usize,
    /// Entries evicted by the retry policy.
    pub dropped: usize,
}

/// Re-attempts queued promotions once their cool-down has elapsed.
///
/// Each due entry gets exactly one attempt per pass, without immediate
/// retries. The queue stays locked for the whole pass, so an entry is never
/// removed before its attempt has resolved.
pub struct RetryQueueDrainer {
    queue: Arc<RetryQueue>,
    executor: Arc<PromotionExecutor>,
    policy: RetryPolicy,
}

impl RetryQueueDrainer {
    pub fn new(
        queue: Arc<RetryQueue>,
        executor: Arc<PromotionExecutor>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            executor,
            policy,
        }
    }

    /// Runs one drain pass as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the updated queue cannot be persisted.
    pub async fn drain(&self, now: DateTime<Utc>) -> Result<DrainReport, StorageError> {
        let guard = self.queue.lock().await;
        let pending = guard.entries().to_vec();
        if pending.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut report = DrainReport::default();
        let mut kept: Vec<RetryEntry> = Vec::with_capacity(pending.len());

        for mut entry in pending {
            if self.evict(&entry, now) {
                report.dropped += 1;
                continue;
            }
            if !entry.is_due(now, self.policy.cooldown) {
                kept.push(entry);
                continue;
            }

            report.attempted += 1;
            match self.executor.attempt(&entry.request).await {
                Ok(outcome) => {
                    info!(
                        url = %entry.url(),
                        outcome = outcome.as_str(),
                        attempts = entry.attempts,
                        "Queued promotion resolved"
                    );
                    counter!("promotions_total", "outcome" => outcome.as_str()).increment(1);
                    report.resolved += 1;
                }
                Err(e) => {
                    entry.attempts = entry.attempts.saturating_add(1);
                    if self.evict(&entry, now) {
                        report.dropped += 1;
                    } else {
                        warn!(
                            url = %entry.url(),
                            attempts = entry.attempts,
                            error = %e,
                            "Queued promotion failed again"
                        );
                        kept.push(entry);
                    }
                }
            }
        }

        report.kept = kept.len();
        guard.commit(kept).await?;

        debug!(report = ?report, "Retry queue drained");
        Ok(report)
    }

    fn evict(&self, entry: &RetryEntry, now: DateTime<Utc>) -> bool {
        let Some(reason) = self.policy.eviction_reason(entry, now) else {
            return false;
        };
        warn!(
            url = %entry.url(),
            attempts = entry.attempts,
            enqueued_at = %entry.enqueued_at,
            reason = reason.as_str(),
            "Dropping queued promotion"
        );
        counter!("retry_queue_dropped_total", "reason" => reason.as_str()).increment(1);
        true
    }
}
