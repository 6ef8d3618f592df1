//! The visit-aggregation and promotion engine.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::services::{
    AggregateStore, CleanupOutcome, CleanupTrigger, DrainReport, IgnoreReason, PromotionDecision,
    PromotionExecutor, PromotionOutcome, PromotionPolicy, RetentionManager, RetryPolicy, RetryQueue,
    RetryQueueDrainer, SettingsService, StatsService, StorageCheck, StorageUsage, VisitAggregator,
};
use crate::application::services::retention_manager::DEFAULT_HIGH_WATER_RATIO;
use crate::domain::alarm::Alarm;
use crate::domain::repositories::{BookmarkManager, KeyValueStore, Notifier, StorageError};
use crate::domain::visit_event::VisitEvent;

/// Tunables that are not user settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub promotion: PromotionPolicy,
    pub retry: RetryPolicy,
    /// Usage fraction of the quota above which cleanup is forced.
    pub high_water_ratio: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            promotion: PromotionPolicy::default(),
            retry: RetryPolicy::default(),
            high_water_ratio: DEFAULT_HIGH_WATER_RATIO,
        }
    }
}

/// What happened to one visit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum VisitOutcome {
    Ignored(IgnoreReason),
    Recorded,
    DailyLimitReached,
    /// Threshold crossed while a queued promotion for the URL is pending.
    PendingRetry,
    Promoted(PromotionOutcome),
    /// The visit could not be stored and was discarded.
    Dropped,
}

/// Result of one alarm run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "alarm", content = "result", rename_all = "camelCase")]
pub enum AlarmReport {
    Cleanup(CleanupOutcome),
    RetryQueue(DrainReport),
    StorageCheck(StorageCheck),
}

/// Result of [`Engine::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
    pub records_removed: usize,
    pub retries_removed: usize,
}

/// Wires the engine components over a set of collaborators.
///
/// Visit flow: [`VisitAggregator`] (per-URL serialised) decides, then
/// [`PromotionExecutor`] acts outside the aggregate lock. Alarms run the
/// [`RetentionManager`] and the [`RetryQueueDrainer`] concurrently with
/// visit processing.
pub struct Engine {
    settings: Arc<SettingsService>,
    store: Arc<AggregateStore>,
    retry_queue: Arc<RetryQueue>,
    aggregator: VisitAggregator,
    executor: Arc<PromotionExecutor>,
    drainer: RetryQueueDrainer,
    retention: RetentionManager,
    stats: StatsService,
}

impl Engine {
    /// Seeds default configuration if missing, loads persisted state and
    /// makes sure the auto-bookmark folder exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if persisted state cannot be read or the
    /// defaults cannot be written.
    pub async fn bootstrap(
        storage: Arc<dyn KeyValueStore>,
        bookmarks: Arc<dyn BookmarkManager>,
        notifier: Arc<dyn Notifier>,
        options: EngineOptions,
    ) -> Result<Self, StorageError> {
        let settings = Arc::new(SettingsService::with_defaults(storage.clone()));
        if !settings.seed_defaults().await? {
            settings.reload().await;
        }

        let store = Arc::new(AggregateStore::load(storage.clone()).await?);
        let retry_queue = Arc::new(RetryQueue::load(storage.clone()).await?);

        let executor = Arc::new(PromotionExecutor::new(
            bookmarks,
            notifier,
            store.clone(),
            retry_queue.clone(),
            settings.clone(),
            options.promotion,
        ));
        if let Err(e) = executor.ensure_root_folder().await {
            warn!(
                error = %e,
                "Could not create auto-bookmark folder, will retry on first promotion"
            );
        }

        let engine = Self {
            aggregator: VisitAggregator::new(store.clone(), settings.clone()),
            drainer: RetryQueueDrainer::new(retry_queue.clone(), executor.clone(), options.retry),
            retention: RetentionManager::new(
                store.clone(),
                settings.clone(),
                storage,
                options.high_water_ratio,
            ),
            stats: StatsService::new(store.clone()),
            settings,
            store,
            retry_queue,
            executor,
        };

        info!("Engine ready");
        Ok(engine)
    }

    /// Processes one visit event end to end. Never fails: storage problems
    /// are logged and the visit is dropped.
    pub async fn handle_visit(&self, event: &VisitEvent) -> VisitOutcome {
        let decision = match self.record_visit(event).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(url = %event.url, error = %e, "Visit dropped, storage write failed");
                counter!("visits_dropped_total").increment(1);
                return VisitOutcome::Dropped;
            }
        };

        match decision {
            PromotionDecision::Ignored(reason) => VisitOutcome::Ignored(reason),
            PromotionDecision::NoPromotion => VisitOutcome::Recorded,
            PromotionDecision::DailyLimitReached { .. } => VisitOutcome::DailyLimitReached,
            PromotionDecision::PromoteNow(request) => {
                if self.retry_queue.contains(&request.url) {
                    debug!(
                        url = %request.url,
                        "Promotion already queued, leaving it to the drainer"
                    );
                    return VisitOutcome::PendingRetry;
                }
                VisitOutcome::Promoted(self.executor.promote(request).await)
            }
        }
    }

    /// Runs the handler for `alarm` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the job could not read or write storage.
    pub async fn handle_alarm(
        &self,
        alarm: Alarm,
        now: DateTime<Utc>,
    ) -> Result<AlarmReport, StorageError> {
        debug!(alarm = %alarm, "Alarm fired");
        let report = match alarm {
            Alarm::Cleanup => AlarmReport::Cleanup(
                self.retention
                    .cleanup(CleanupTrigger::Scheduled, now)
                    .await?,
            ),
            Alarm::RetryQueue => AlarmReport::RetryQueue(self.drainer.drain(now).await?),
            Alarm::StorageCheck => {
                AlarmReport::StorageCheck(self.retention.check_storage(now).await?)
            }
        };
        Ok(report)
    }

    /// Cleanup on operator request. Skipped while `auto_cleanup` is off.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be listed or written.
    pub async fn cleanup_now(&self, now: DateTime<Utc>) -> Result<CleanupOutcome, StorageError> {
        self.retention.cleanup(CleanupTrigger::Manual, now).await
    }

    /// Re-reads settings and exclusions. Returns `false` if storage could
    /// not be read.
    pub async fn reload_settings(&self) -> bool {
        self.settings.reload().await
    }

    /// Deletes all statistics and queued promotions and restores default
    /// settings. Existing bookmarks are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be written.
    pub async fn reset(&self) -> Result<ResetReport, StorageError> {
        let records_removed = self.store.clear().await?;
        let retries_removed = self.retry_queue.clear().await?;
        self.settings.restore_defaults().await?;

        warn!(records_removed, retries_removed, "All tracking data reset");
        Ok(ResetReport {
            records_removed,
            retries_removed,
        })
    }

    pub async fn storage_usage(&self) -> Result<StorageUsage, StorageError> {
        self.retention.usage().await
    }

    pub fn pending_retries(&self) -> usize {
        self.retry_queue.len()
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry_queue
    }

    /// Records the visit, forcing one cleanup and retrying once if the
    /// write hits the storage quota.
    async fn record_visit(&self, event: &VisitEvent) -> Result<PromotionDecision, StorageError> {
        let first = self
            .aggregator
            .record_visit(&event.url, &event.title, event.observed_at)
            .await;

        match first {
            Err(e) if e.is_quota_exceeded() => {
                warn!(url = %event.url, error = %e, "Storage quota exceeded, forcing cleanup");
                self.retention
                    .cleanup(CleanupTrigger::QuotaPressure, Utc::now())
                    .await?;
                self.aggregator
                    .record_visit(&event.url, &event.title, event.observed_at)
                    .await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Settings, VisitRecord, default_exclusions};
    use crate::domain::repositories::{BookmarkError, MockBookmarkManager};
    use crate::domain::time_bucket::MonthKey;
    use crate::infrastructure::bookmarks::InMemoryBookmarks;
    use crate::infrastructure::notify::LogNotifier;
    use crate::infrastructure::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn fast_options() -> EngineOptions {
        EngineOptions {
            promotion: PromotionPolicy {
                max_attempts: 3,
                retry_delay: std::time::Duration::from_millis(1),
            },
            ..EngineOptions::default()
        }
    }

    async fn engine(storage: Arc<MemoryStore>, bookmarks: Arc<dyn BookmarkManager>) -> Engine {
        Engine::bootstrap(storage, bookmarks, Arc::new(LogNotifier), fast_options())
            .await
            .unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_defaults_and_folder() {
        let storage = Arc::new(MemoryStore::default());
        let bookmarks = Arc::new(InMemoryBookmarks::new());

        let engine = engine(storage.clone(), bookmarks.clone()).await;

        assert_eq!(*engine.settings().current(), Settings::default());
        let stored = storage.keys().await.unwrap();
        assert!(stored.contains(&"settings".to_string()));
        assert!(stored.contains(&"exclusions".to_string()));
        assert_eq!(bookmarks.search_by_title("Auto Bookmarks").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_visit_flow_promotes_once() {
        let bookmarks = Arc::new(InMemoryBookmarks::new());
        let engine = engine(Arc::new(MemoryStore::default()), bookmarks.clone()).await;
        let url = "https://example.com/";

        let e1 = VisitEvent::new(url, Some("Example"), at(1, 9));
        let e2 = VisitEvent::new(url, Some("Example"), at(1, 10));
        let e3 = VisitEvent::new(url, Some("Example"), at(2, 9));
        assert_eq!(engine.handle_visit(&e1).await, VisitOutcome::Recorded);
        assert_eq!(engine.handle_visit(&e2).await, VisitOutcome::Recorded);
        assert_eq!(
            engine.handle_visit(&e3).await,
            VisitOutcome::Promoted(PromotionOutcome::Created)
        );

        let e4 = VisitEvent::new(url, Some("Example"), at(3, 9));
        assert_eq!(engine.handle_visit(&e4).await, VisitOutcome::Recorded);
        assert_eq!(bookmarks.search_by_url(url).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_retry_blocks_immediate_promotion() {
        let mut mock = MockBookmarkManager::new();
        mock.expect_search_by_title()
            .returning(|_| Err(BookmarkError::Unavailable("offline".to_string())));
        mock.expect_search_by_url()
            .times(3)
            .returning(|_| Err(BookmarkError::Unavailable("offline".to_string())));
        let engine = engine(Arc::new(MemoryStore::default()), Arc::new(mock)).await;
        let url = "https://example.com/";

        engine.handle_visit(&VisitEvent::new(url, Some("E"), at(1, 9))).await;
        engine.handle_visit(&VisitEvent::new(url, Some("E"), at(1, 10))).await;
        assert_eq!(
            engine.handle_visit(&VisitEvent::new(url, Some("E"), at(2, 9))).await,
            VisitOutcome::Promoted(PromotionOutcome::Queued)
        );
        assert_eq!(
            engine.handle_visit(&VisitEvent::new(url, Some("E"), at(3, 9))).await,
            VisitOutcome::PendingRetry
        );
        assert_eq!(engine.pending_retries(), 1);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_drops_visit_after_forced_cleanup() {
        let storage = Arc::new(MemoryStore::new(600));
        let engine = engine(storage, Arc::new(InMemoryBookmarks::new())).await;

        let long_url = format!("https://example.com/{}", "x".repeat(600));
        let outcome = engine
            .handle_visit(&VisitEvent::new(long_url, Some("Big"), at(1, 9)))
            .await;

        assert_eq!(outcome, VisitOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_recovers_when_cleanup_frees_space() {
        let storage = Arc::new(MemoryStore::new(1200));
        let engine = engine(storage, Arc::new(InMemoryBookmarks::new())).await;
        let now = Utc::now();
        let old = now - Duration::days(400);
        let old_day = old.date_naive();

        let mut filled = 0;
        loop {
            let url = format!("https://old{filled}.test/");
            let result = engine
                .store()
                .upsert(
                    MonthKey::from_datetime(old),
                    &url,
                    || VisitRecord::new("Old", old_day),
                    |r| {
                        r.record_visit(old_day);
                    },
                )
                .await;
            if result.is_err() {
                break;
            }
            filled += 1;
        }
        assert!(filled > 0);

        let fresh_url = format!("https://fresh.test/{}", "y".repeat(100));
        let fresh = VisitEvent::new(fresh_url, Some("Fresh"), now);

        assert_eq!(engine.handle_visit(&fresh).await, VisitOutcome::Recorded);
        assert_eq!(engine.store().month_keys().await, vec![MonthKey::from_datetime(now)]);
    }

    #[tokio::test]
    async fn test_alarms_dispatch_to_components() {
        let engine = engine(
            Arc::new(MemoryStore::default()),
            Arc::new(InMemoryBookmarks::new()),
        )
        .await;

        let report = engine.handle_alarm(Alarm::Cleanup, at(1, 0)).await.unwrap();
        assert!(matches!(report, AlarmReport::Cleanup(CleanupOutcome::Completed { .. })));

        let report = engine.handle_alarm(Alarm::RetryQueue, at(1, 0)).await.unwrap();
        assert_eq!(report, AlarmReport::RetryQueue(DrainReport::default()));

        let report = engine.handle_alarm(Alarm::StorageCheck, at(1, 0)).await.unwrap();
        let AlarmReport::StorageCheck(check) = report else {
            panic!("unexpected report");
        };
        assert!(check.cleanup.is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_data_and_restores_defaults() {
        let storage = Arc::new(MemoryStore::default());
        let engine = engine(storage, Arc::new(InMemoryBookmarks::new())).await;
        engine
            .settings()
            .save(
                Settings {
                    threshold: 9,
                    ..Settings::default()
                },
                default_exclusions(),
            )
            .await
            .unwrap();
        engine
            .handle_visit(&VisitEvent::new("https://example.com/", None, at(1, 9)))
            .await;

        let report = engine.reset().await.unwrap();

        assert_eq!(report.records_removed, 1);
        assert_eq!(engine.store().record_count().await, 0);
        assert_eq!(engine.settings().current().threshold, 3);
    }
}
