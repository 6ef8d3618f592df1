//! Month-bucketed visit statistics with per-URL atomic updates.
//!
//! # Locking
//!
//! Two locks cooperate:
//!
//! - a per-URL [`KeyedLock`] serialises read-modify-write sequences for one URL;
//! - a store-wide `RwLock` over the month map. Updates hold it shared for their
//!   whole duration (persist included), pruning holds it exclusively.
//!
//! Updates for different URLs therefore run concurrently, and an update either
//! completes before a prune starts or sees the pruned map.
//!
//! # Persistence
//!
//! Every record lives under its own key, `visits/{YYYY-MM}/{url}`. A mutation
//! is applied to a copy, written, and only then committed to memory, so a
//! failed write leaves the in-memory record unchanged.
//!
//! Promotion is remembered per URL, not per bucket: a `promoted/{url}` marker
//! outlives every month bucket, and any record of a marked URL is promoted
//! before it is mutated.

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::domain::entities::{MAX_DAILY_ENTRIES, VisitRecord};
use crate::domain::repositories::{KeyValueStore, StorageError};
use crate::domain::time_bucket::MonthKey;
use crate::utils::KeyedLock;

/// Prefix of every visit-record storage key.
pub const VISITS_PREFIX: &str = "visits/";

/// Prefix of the per-URL promotion markers.
pub const PROMOTED_PREFIX: &str = "promoted/";

type Bucket = DashMap<String, VisitRecord>;
type Months = BTreeMap<MonthKey, Arc<Bucket>>;

/// Storage key of one record.
pub fn storage_key(month: MonthKey, url: &str) -> String {
    format!("{VISITS_PREFIX}{month}/{url}")
}

/// Storage key of the promotion marker for `url`.
pub fn promoted_key(url: &str) -> String {
    format!("{PROMOTED_PREFIX}{url}")
}

fn is_owned_key(key: &str) -> bool {
    key.starts_with(VISITS_PREFIX) || key.starts_with(PROMOTED_PREFIX)
}

/// Splits a storage key back into month and URL.
pub fn parse_storage_key(key: &str) -> Option<(MonthKey, &str)> {
    let rest = key.strip_prefix(VISITS_PREFIX)?;
    let (month, url) = rest.split_once('/')?;
    let month = month.parse().ok()?;
    (!url.is_empty()).then_some((month, url))
}

/// Result of [`AggregateStore::prune_before`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    /// Month buckets dropped from memory.
    pub buckets_removed: Vec<MonthKey>,
    /// Storage keys deleted.
    pub records_removed: usize,
    /// Kept records whose daily history was cut back.
    pub records_trimmed: usize,
}

/// Durable `month -> url -> VisitRecord` map.
pub struct AggregateStore {
    storage: Arc<dyn KeyValueStore>,
    months: RwLock<Months>,
    promoted: DashSet<String>,
    url_locks: KeyedLock,
}

impl AggregateStore {
    /// Creates an empty store. Use [`AggregateStore::load`] to pick up
    /// previously persisted records.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            months: RwLock::new(BTreeMap::new()),
            promoted: DashSet::new(),
            url_locks: KeyedLock::new(),
        }
    }

    /// Rebuilds the store from every `visits/` and `promoted/` key in storage.
    ///
    /// Records that fail to parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be read.
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let keys: Vec<String> = storage
            .keys()
            .await?
            .into_iter()
            .filter(|key| is_owned_key(key))
            .collect();
        let values = storage.get(keys).await?;

        let mut months: Months = BTreeMap::new();
        let promoted = DashSet::new();
        let mut loaded = 0usize;
        for (key, value) in values {
            if let Some(url) = key.strip_prefix(PROMOTED_PREFIX) {
                promoted.insert(url.to_string());
                continue;
            }
            let Some((month, url)) = parse_storage_key(&key) else {
                warn!(key = %key, "Skipping visit record with malformed key");
                continue;
            };
            match serde_json::from_value::<VisitRecord>(value) {
                Ok(record) => {
                    if record.promoted {
                        promoted.insert(url.to_string());
                    }
                    months.entry(month).or_default().insert(url.to_string(), record);
                    loaded += 1;
                }
                Err(e) => warn!(key = %key, error = %e, "Skipping corrupt visit record"),
            }
        }

        info!(
            records = loaded,
            months = months.len(),
            promoted = promoted.len(),
            "Aggregate store loaded"
        );

        Ok(Self {
            storage,
            months: RwLock::new(months),
            promoted,
            url_locks: KeyedLock::new(),
        })
    }

    /// Atomically creates-or-updates the record for `url` in `month`.
    ///
    /// `create` builds the record when none exists; `mutate` is then applied
    /// and its result returned once the record has been persisted. A record
    /// of an already promoted URL is flagged promoted before `mutate` sees it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails. The stored and in-memory
    /// record are left as they were.
    pub async fn upsert<T>(
        &self,
        month: MonthKey,
        url: &str,
        create: impl FnOnce() -> VisitRecord,
        mutate: impl FnOnce(&mut VisitRecord) -> T,
    ) -> Result<T, StorageError> {
        let _url_guard = self.url_locks.lock(url).await;
        let (_months, bucket) = self.bucket_for_update(month).await;

        let mut record = bucket
            .get(url)
            .map(|existing| existing.value().clone())
            .unwrap_or_else(create);
        if self.promoted.contains(url) {
            record.mark_promoted();
        }
        let output = mutate(&mut record);

        self.persist(month, url, &record).await?;
        bucket.insert(url.to_string(), record);
        Ok(output)
    }

    /// Remembers that `url` has been promoted and flags its record in
    /// `month`, if there still is one.
    ///
    /// Returns whether a record in `month` was flagged.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails; nothing is changed then.
    pub async fn mark_promoted(&self, month: MonthKey, url: &str) -> Result<bool, StorageError> {
        let _url_guard = self.url_locks.lock(url).await;
        let months = self.months.read().await;

        let bucket = months.get(&month).cloned();
        let record = bucket
            .as_ref()
            .and_then(|bucket| bucket.get(url).map(|existing| existing.value().clone()))
            .map(|mut record| {
                record.mark_promoted();
                record
            });

        let mut items = HashMap::with_capacity(2);
        items.insert(promoted_key(url), serde_json::to_value(month)?);
        if let Some(record) = &record {
            items.insert(storage_key(month, url), serde_json::to_value(record)?);
        }
        self.storage.set(items).await?;

        self.promoted.insert(url.to_string());
        match (bucket, record) {
            (Some(bucket), Some(record)) => {
                bucket.insert(url.to_string(), record);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Whether `url` has ever been promoted.
    pub fn is_promoted(&self, url: &str) -> bool {
        self.promoted.contains(url)
    }

    /// Current record for `url` in `month`.
    pub async fn get(&self, month: MonthKey, url: &str) -> Option<VisitRecord> {
        let months = self.months.read().await;
        months
            .get(&month)
            .and_then(|bucket| bucket.get(url).map(|record| record.value().clone()))
    }

    /// All records of one month, in no particular order.
    pub async fn snapshot_month(&self, month: MonthKey) -> Vec<(String, VisitRecord)> {
        let months = self.months.read().await;
        months
            .get(&month)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Month buckets currently held, oldest first.
    pub async fn month_keys(&self) -> Vec<MonthKey> {
        self.months.read().await.keys().copied().collect()
    }

    /// Total number of records across all months.
    pub async fn record_count(&self) -> usize {
        self.months.read().await.values().map(|bucket| bucket.len()).sum()
    }

    /// Deletes every bucket older than `cutoff` and trims overlong history.
    ///
    /// Runs under the store-wide exclusive lock. Storage keys are removed
    /// first; memory is only changed once storage agrees.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be listed or written.
    pub async fn prune_before(&self, cutoff: MonthKey) -> Result<PruneReport, StorageError> {
        let mut months = self.months.write().await;

        let stale_keys: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|key| parse_storage_key(key).is_some_and(|(month, _)| month < cutoff))
            .collect();
        let records_removed = stale_keys.len();
        if !stale_keys.is_empty() {
            self.storage.remove(stale_keys).await?;
        }

        let buckets_removed: Vec<MonthKey> = months.range(..cutoff).map(|(key, _)| *key).collect();
        for key in &buckets_removed {
            months.remove(key);
        }

        let mut trimmed: Vec<(MonthKey, String, VisitRecord)> = Vec::new();
        for (month, bucket) in months.iter() {
            for entry in bucket.iter() {
                if entry.visit_days() > MAX_DAILY_ENTRIES {
                    let mut record = entry.value().clone();
                    record.evict_oldest();
                    record.recompute_total();
                    trimmed.push((*month, entry.key().clone(), record));
                }
            }
        }

        if !trimmed.is_empty() {
            let mut items = HashMap::with_capacity(trimmed.len());
            for (month, url, record) in &trimmed {
                items.insert(storage_key(*month, url), serde_json::to_value(record)?);
            }
            self.storage.set(items).await?;

            for (month, url, record) in &trimmed {
                if let Some(bucket) = months.get(month) {
                    bucket.insert(url.clone(), record.clone());
                }
            }
        }

        let report = PruneReport {
            buckets_removed,
            records_removed,
            records_trimmed: trimmed.len(),
        };
        debug!(cutoff = %cutoff, report = ?report, "Pruned aggregate store");
        Ok(report)
    }

    /// Deletes every visit record and promotion marker, in storage and in
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be listed or written.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let mut months = self.months.write().await;

        let keys: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|key| is_owned_key(key))
            .collect();
        let removed = keys
            .iter()
            .filter(|key| key.starts_with(VISITS_PREFIX))
            .count();
        if !keys.is_empty() {
            self.storage.remove(keys).await?;
        }

        months.clear();
        self.promoted.clear();
        Ok(removed)
    }

    /// Shared guard on the month map plus the bucket for `month`, creating
    /// the bucket if needed.
    async fn bucket_for_update(
        &self,
        month: MonthKey,
    ) -> (RwLockReadGuard<'_, Months>, Arc<Bucket>) {
        let months = self.months.read().await;
        let existing = months.get(&month).cloned();
        if let Some(bucket) = existing {
            return (months, bucket);
        }
        drop(months);

        let mut months = self.months.write().await;
        let bucket = Arc::clone(months.entry(month).or_default());
        debug!(month = %month, "Created month bucket");
        (months.downgrade(), bucket)
    }

    async fn persist(
        &self,
        month: MonthKey,
        url: &str,
        record: &VisitRecord,
    ) -> Result<(), StorageError> {
        let mut items = HashMap::with_capacity(1);
        items.insert(storage_key(month, url), serde_json::to_value(record)?);
        self.storage.set(items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockKeyValueStore;
    use crate::infrastructure::storage::MemoryStore;
    use chrono::{Duration, NaiveDate};

    fn month(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> (Arc<MemoryStore>, AggregateStore) {
        let storage = Arc::new(MemoryStore::new(1024 * 1024));
        let aggregate = AggregateStore::new(storage.clone());
        (storage, aggregate)
    }

    async fn visit(store: &AggregateStore, m: MonthKey, url: &str, d: NaiveDate) -> u32 {
        store
            .upsert(m, url, || VisitRecord::new("Title", d), |record| record.record_visit(d))
            .await
            .unwrap()
    }

    #[test]
    fn test_storage_key_roundtrip() {
        let key = storage_key(month(2025, 6), "https://example.com/a/b");
        assert_eq!(key, "visits/2025-06/https://example.com/a/b");

        let (m, url) = parse_storage_key(&key).unwrap();
        assert_eq!(m, month(2025, 6));
        assert_eq!(url, "https://example.com/a/b");

        assert!(parse_storage_key("settings").is_none());
        assert!(parse_storage_key("visits/2025-13/x").is_none());
        assert!(parse_storage_key("visits/2025-06/").is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_and_persists() {
        let (storage, aggregate) = store();
        let m = month(2025, 6);
        let d = day(2025, 6, 1);

        assert_eq!(visit(&aggregate, m, "https://a.test/", d).await, 1);
        assert_eq!(visit(&aggregate, m, "https://a.test/", d).await, 2);

        let record = aggregate.get(m, "https://a.test/").await.unwrap();
        assert_eq!(record.daily_visits[&d], 2);

        let stored = storage
            .get(vec![storage_key(m, "https://a.test/")])
            .await
            .unwrap();
        assert_eq!(stored.values().next().unwrap()["totalCount"], 2);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_do_not_lose_updates() {
        let (_, aggregate) = store();
        let aggregate = Arc::new(aggregate);
        let m = month(2025, 6);
        let d = day(2025, 6, 1);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let aggregate = Arc::clone(&aggregate);
            handles.push(tokio::spawn(async move {
                visit(&aggregate, m, "https://a.test/", d).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = aggregate.get(m, "https://a.test/").await.unwrap();
        assert_eq!(record.daily_visits[&d], 20);
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let mut mock = MockKeyValueStore::new();
        let mut calls = 0;
        mock.expect_set().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(StorageError::Unavailable("disk gone".to_string()))
            }
        });
        let aggregate = AggregateStore::new(Arc::new(mock));
        let m = month(2025, 6);
        let d = day(2025, 6, 1);

        visit(&aggregate, m, "https://a.test/", d).await;
        let result = aggregate
            .upsert(m, "https://a.test/", || VisitRecord::new("", d), |r| r.record_visit(d))
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        let record = aggregate.get(m, "https://a.test/").await.unwrap();
        assert_eq!(record.daily_visits[&d], 1);
    }

    #[tokio::test]
    async fn test_mark_promoted_flags_record_and_remembers_url() {
        let (storage, aggregate) = store();
        let m = month(2025, 6);

        assert!(!aggregate.mark_promoted(m, "https://nowhere.test/").await.unwrap());
        assert!(aggregate.is_promoted("https://nowhere.test/"));
        assert_eq!(aggregate.record_count().await, 0);

        visit(&aggregate, m, "https://a.test/", day(2025, 6, 2)).await;
        assert!(aggregate.mark_promoted(m, "https://a.test/").await.unwrap());
        assert!(aggregate.get(m, "https://a.test/").await.unwrap().promoted);

        let stored = storage.get(vec![promoted_key("https://a.test/")]).await.unwrap();
        assert_eq!(stored[&promoted_key("https://a.test/")], "2025-06");
    }

    #[tokio::test]
    async fn test_promotion_carries_into_later_and_earlier_buckets() {
        let (_, aggregate) = store();
        let url = "https://a.test/";
        visit(&aggregate, month(2025, 5), url, day(2025, 5, 20)).await;
        visit(&aggregate, month(2025, 6), url, day(2025, 6, 1)).await;

        aggregate.mark_promoted(month(2025, 6), url).await.unwrap();
        visit(&aggregate, month(2025, 7), url, day(2025, 7, 1)).await;
        visit(&aggregate, month(2025, 5), url, day(2025, 5, 21)).await;

        assert!(aggregate.get(month(2025, 7), url).await.unwrap().promoted);
        assert!(aggregate.get(month(2025, 5), url).await.unwrap().promoted);
    }

    #[tokio::test]
    async fn test_promotion_survives_pruning_and_reload() {
        let (storage, aggregate) = store();
        let url = "https://a.test/";
        visit(&aggregate, month(2024, 1), url, day(2024, 1, 5)).await;
        aggregate.mark_promoted(month(2024, 1), url).await.unwrap();

        aggregate.prune_before(month(2025, 1)).await.unwrap();
        assert_eq!(aggregate.record_count().await, 0);

        let reloaded = AggregateStore::load(storage).await.unwrap();
        assert!(reloaded.is_promoted(url));
        visit(&reloaded, month(2025, 6), url, day(2025, 6, 1)).await;
        assert!(reloaded.get(month(2025, 6), url).await.unwrap().promoted);
    }

    #[tokio::test]
    async fn test_load_restores_records_and_skips_corrupt() {
        let (storage, aggregate) = store();
        let m = month(2025, 6);
        visit(&aggregate, m, "https://a.test/", day(2025, 6, 1)).await;

        let mut junk = HashMap::new();
        junk.insert(storage_key(m, "https://bad.test/"), serde_json::json!({ "nope": 1 }));
        junk.insert("visits/not-a-month/x".to_string(), serde_json::json!({}));
        storage.set(junk).await.unwrap();

        let reloaded = AggregateStore::load(storage).await.unwrap();

        assert_eq!(reloaded.record_count().await, 1);
        assert!(reloaded.get(m, "https://a.test/").await.is_some());
    }

    #[tokio::test]
    async fn test_prune_before_removes_old_buckets_only() {
        let (storage, aggregate) = store();
        visit(&aggregate, month(2024, 11), "https://old.test/", day(2024, 11, 5)).await;
        visit(&aggregate, month(2024, 12), "https://kept.test/", day(2024, 12, 5)).await;

        let report = aggregate.prune_before(month(2024, 12)).await.unwrap();

        assert_eq!(report.buckets_removed, vec![month(2024, 11)]);
        assert_eq!(report.records_removed, 1);
        assert_eq!(aggregate.month_keys().await, vec![month(2024, 12)]);
        let keys = storage.keys().await.unwrap();
        assert_eq!(keys, vec![storage_key(month(2024, 12), "https://kept.test/")]);
    }

    #[tokio::test]
    async fn test_prune_trims_overlong_history() {
        let storage = Arc::new(MemoryStore::new(1024 * 1024));
        let m = month(2025, 6);
        let start = day(2025, 1, 1);

        let mut record = VisitRecord::new("Long", start);
        for offset in 0..40 {
            record.daily_visits.insert(start + Duration::days(offset), 1);
        }
        let mut items = HashMap::new();
        items.insert(storage_key(m, "https://long.test/"), serde_json::to_value(&record).unwrap());
        storage.set(items).await.unwrap();
        let aggregate = AggregateStore::load(storage).await.unwrap();

        let report = aggregate.prune_before(month(2025, 1)).await.unwrap();

        assert_eq!(report.records_trimmed, 1);
        let trimmed = aggregate.get(m, "https://long.test/").await.unwrap();
        assert_eq!(trimmed.visit_days(), MAX_DAILY_ENTRIES);
        assert_eq!(trimmed.total_count, 31);
    }

    #[tokio::test]
    async fn test_clear_removes_visits_but_not_other_keys() {
        let (storage, aggregate) = store();
        visit(&aggregate, month(2025, 6), "https://a.test/", day(2025, 6, 1)).await;
        let mut other = HashMap::new();
        other.insert("settings".to_string(), serde_json::json!({}));
        storage.set(other).await.unwrap();

        aggregate.mark_promoted(month(2025, 6), "https://a.test/").await.unwrap();

        assert_eq!(aggregate.clear().await.unwrap(), 1);
        assert_eq!(aggregate.record_count().await, 0);
        assert!(!aggregate.is_promoted("https://a.test/"));
        assert_eq!(storage.keys().await.unwrap(), vec!["settings".to_string()]);
    }
}
