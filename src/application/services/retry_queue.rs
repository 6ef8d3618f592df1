//! Durable queue of deferred promotions.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashSet;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::domain::entities::RetryEntry;
use crate::domain::repositories::{KeyValueStore, StorageError};

/// Storage key of the queue.
pub const RETRY_QUEUE_KEY: &str = "retryQueue";

/// Cool-down and eviction policy for queued promotions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum age before an entry is retried.
    pub cooldown: Duration,
    /// Entries are dropped once they have failed this many times.
    pub max_attempts: Option<u32>,
    /// Entries older than this are dropped.
    pub max_age: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(1),
            max_attempts: Some(24),
            max_age: Some(Duration::days(7)),
        }
    }
}

/// Why an entry was evicted from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MaxAttempts,
    MaxAge,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxAttempts => "max_attempts",
            Self::MaxAge => "max_age",
        }
    }
}

impl RetryPolicy {
    /// Returns the reason `entry` must be dropped, if any.
    pub fn eviction_reason(&self, entry: &RetryEntry, now: DateTime<Utc>) -> Option<DropReason> {
        if self.max_attempts.is_some_and(|max| entry.attempts >= max) {
            return Some(DropReason::MaxAttempts);
        }
        if self.max_age.is_some_and(|max| entry.age(now) > max) {
            return Some(DropReason::MaxAge);
        }
        None
    }
}

/// Whether [`RetryQueue::enqueue`] added a new entry or refreshed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added,
    Refreshed,
}

/// Persistent list of [`RetryEntry`]s, at most one per URL.
///
/// Mutations go through one async mutex. The drainer keeps it for a whole
/// pass (see [`RetryQueue::lock`]), so enqueue and drain never interleave.
/// The set of pending URLs is mirrored outside the mutex so that
/// [`contains`](RetryQueue::contains) and [`len`](RetryQueue::len) answer
/// while a drain is waiting on bookmark I/O.
pub struct RetryQueue {
    storage: Arc<dyn KeyValueStore>,
    entries: Mutex<Vec<RetryEntry>>,
    pending: DashSet<String>,
}

impl RetryQueue {
    /// Creates an empty queue.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            entries: Mutex::new(Vec::new()),
            pending: DashSet::new(),
        }
    }

    /// Loads the queue from storage. A corrupt stored queue is discarded
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be read.
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let stored = storage.get(vec![RETRY_QUEUE_KEY.to_string()]).await?;

        let entries = match stored.get(RETRY_QUEUE_KEY) {
            Some(value) => match serde_json::from_value::<Vec<RetryEntry>>(value.clone()) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Discarding corrupt retry queue");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        info!(pending = entries.len(), "Retry queue loaded");

        let pending = entries.iter().map(|e| e.url().to_string()).collect();
        Ok(Self {
            storage,
            entries: Mutex::new(entries),
            pending,
        })
    }

    /// Queues `entry`, or refreshes the pending entry for the same URL.
    ///
    /// A refreshed entry takes the new title and record snapshot but keeps its
    /// original `enqueued_at` and `attempts`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the queue cannot be persisted; the queue is
    /// unchanged in that case.
    pub async fn enqueue(&self, entry: RetryEntry) -> Result<EnqueueOutcome, StorageError> {
        let mut entries = self.entries.lock().await;
        let mut updated = entries.clone();
        let url = entry.url().to_string();

        let outcome = match updated.iter_mut().find(|e| e.url() == entry.url()) {
            Some(existing) => {
                existing.request = entry.request;
                EnqueueOutcome::Refreshed
            }
            None => {
                updated.push(entry);
                EnqueueOutcome::Added
            }
        };

        self.write(&updated).await?;
        *entries = updated;
        self.pending.insert(url);
        debug!(outcome = ?outcome, pending = entries.len(), "Retry entry enqueued");
        Ok(outcome)
    }

    /// Whether a promotion for `url` is pending. Does not wait for a drain.
    pub fn contains(&self, url: &str) -> bool {
        self.pending.contains(url)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Copy of the pending entries.
    pub async fn snapshot(&self) -> Vec<RetryEntry> {
        self.entries.lock().await.clone()
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be written.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let mut entries = self.entries.lock().await;
        self.storage.remove(vec![RETRY_QUEUE_KEY.to_string()]).await?;
        let removed = entries.len();
        entries.clear();
        self.pending.clear();
        Ok(removed)
    }

    /// Exclusive access to the queue for a drain pass.
    pub async fn lock(&self) -> RetryQueueGuard<'_> {
        RetryQueueGuard {
            queue: self,
            entries: self.entries.lock().await,
        }
    }

    async fn write(&self, entries: &[RetryEntry]) -> Result<(), StorageError> {
        let mut items: HashMap<String, Value> = HashMap::with_capacity(1);
        items.insert(RETRY_QUEUE_KEY.to_string(), serde_json::to_value(entries)?);
        self.storage.set(items).await
    }
}

/// Held for the duration of a drain pass.
pub struct RetryQueueGuard<'a> {
    queue: &'a RetryQueue,
    entries: MutexGuard<'a, Vec<RetryEntry>>,
}

impl RetryQueueGuard<'_> {
    /// Entries as they were when the guard was taken.
    pub fn entries(&self) -> &[RetryEntry] {
        &self.entries
    }

    /// Installs `entries` as the new queue contents and persists them.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails. The in-memory queue is
    /// updated regardless and is written again by the next mutation.
    pub async fn commit(mut self, entries: Vec<RetryEntry>) -> Result<(), StorageError> {
        let pending = &self.queue.pending;
        pending.retain(|url| entries.iter().any(|e| e.url() == url.as_str()));
        for entry in &entries {
            pending.insert(entry.url().to_string());
        }

        *self.entries = entries;
        self.queue.write(&self.entries).await
    }
}
