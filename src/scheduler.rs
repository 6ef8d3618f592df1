//! Periodic alarm driver.
//!
//! Fires each [`Alarm`] on its own interval and hands it to
//! [`Engine::handle_alarm`] until shutdown is signalled.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

use crate::application::services::Engine;
use crate::domain::alarm::Alarm;

/// Period of each alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmIntervals {
    pub cleanup: Duration,
    pub retry_queue: Duration,
    pub storage_check: Duration,
}

impl Default for AlarmIntervals {
    fn default() -> Self {
        Self {
            cleanup: Duration::from_secs(7 * 24 * 60 * 60),
            retry_queue: Duration::from_secs(60 * 60),
            storage_check: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// First tick after one full period, missed ticks skipped.
fn alarm_interval(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

/// Runs until `shutdown` flips to `true` or its sender is dropped.
///
/// Alarm handlers run inline, so a slow cleanup delays the next drain
/// rather than overlapping with it.
pub async fn run_scheduler(
    engine: Arc<Engine>,
    intervals: AlarmIntervals,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cleanup = alarm_interval(intervals.cleanup);
    let mut retry_queue = alarm_interval(intervals.retry_queue);
    let mut storage_check = alarm_interval(intervals.storage_check);

    info!(
        cleanup_secs = intervals.cleanup.as_secs(),
        retry_queue_secs = intervals.retry_queue.as_secs(),
        storage_check_secs = intervals.storage_check.as_secs(),
        "Alarm scheduler started"
    );

    loop {
        let alarm = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Alarm scheduler shutting down");
                    break;
                }
                continue;
            }
            _ = cleanup.tick() => Alarm::Cleanup,
            _ = retry_queue.tick() => Alarm::RetryQueue,
            _ = storage_check.tick() => Alarm::StorageCheck,
        };

        match engine.handle_alarm(alarm, Utc::now()).await {
            Ok(report) => debug!(alarm = %alarm, report = ?report, "Alarm handled"),
            Err(e) => error!(alarm = %alarm, error = %e, "Alarm failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::EngineOptions;
    use crate::domain::entities::{PromotionRequest, RetryEntry, VisitRecord};
    use crate::domain::repositories::BookmarkManager;
    use crate::domain::time_bucket::MonthKey;
    use crate::infrastructure::bookmarks::InMemoryBookmarks;
    use crate::infrastructure::notify::LogNotifier;
    use crate::infrastructure::storage::MemoryStore;

    #[tokio::test]
    async fn test_scheduler_drains_retry_queue_and_stops() {
        let bookmarks = Arc::new(InMemoryBookmarks::new());
        let engine = Arc::new(
            Engine::bootstrap(
                Arc::new(MemoryStore::default()),
                bookmarks.clone(),
                Arc::new(LogNotifier),
                EngineOptions::default(),
            )
            .await
            .unwrap(),
        );

        let enqueued_at = Utc::now() - chrono::Duration::hours(2);
        let day = enqueued_at.date_naive();
        engine
            .retry_queue()
            .enqueue(RetryEntry::new(
                PromotionRequest {
                    url: "https://queued.test/".to_string(),
                    title: "Queued".to_string(),
                    month: MonthKey::from_date(day),
                    record: VisitRecord::new("Queued", day),
                },
                enqueued_at,
                1,
            ))
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let intervals = AlarmIntervals {
            cleanup: Duration::from_secs(3600),
            retry_queue: Duration::from_millis(20),
            storage_check: Duration::from_secs(3600),
        };
        let scheduler = tokio::spawn(run_scheduler(engine.clone(), intervals, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), scheduler)
            .await
            .unwrap()
            .unwrap();

        assert!(engine.retry_queue().is_empty());
        assert_eq!(bookmarks.search_by_url("https://queued.test/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_stops_when_sender_dropped() {
        let engine = Arc::new(
            Engine::bootstrap(
                Arc::new(MemoryStore::default()),
                Arc::new(InMemoryBookmarks::new()),
                Arc::new(LogNotifier),
                EngineOptions::default(),
            )
            .await
            .unwrap(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = tokio::spawn(run_scheduler(engine, AlarmIntervals::default(), shutdown_rx));

        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(5), scheduler)
            .await
            .unwrap()
            .unwrap();
    }
}
