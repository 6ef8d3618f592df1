//! Process-local key-value store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::repositories::{KeyValueStore, StorageError};

/// Default quota, matching the 10 MiB browser local-storage limit.
pub const DEFAULT_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

/// In-memory [`KeyValueStore`] with quota enforcement.
///
/// Usage is accounted as the length of each key plus the length of its
/// JSON-encoded value.
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
    quota: u64,
}

impl MemoryStore {
    pub fn new(quota_bytes: u64) -> Self {
        debug!(quota_bytes, "Using in-memory store");
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: quota_bytes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_BYTES)
    }
}

/// Bytes charged for one entry.
fn entry_size(key: &str, value: &Value) -> u64 {
    (key.len() + value.to_string().len()) as u64
}

pub(crate) fn total_size(entries: &BTreeMap<String, Value>) -> u64 {
    entries.iter().map(|(k, v)| entry_size(k, v)).sum()
}

/// Writes `items` into `entries`, or leaves them untouched if the result
/// would exceed `quota`.
pub(crate) fn apply_set(
    entries: &mut BTreeMap<String, Value>,
    items: HashMap<String, Value>,
    quota: u64,
) -> Result<(), StorageError> {
    let current = total_size(entries);
    let released: u64 = items
        .keys()
        .filter_map(|key| entries.get(key).map(|old| entry_size(key, old)))
        .sum();
    let added: u64 = items.iter().map(|(k, v)| entry_size(k, v)).sum();
    let required = current - released + added;

    if required > quota {
        return Err(StorageError::QuotaExceeded { required, quota });
    }

    entries.extend(items);
    Ok(())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: Vec<String>) -> Result<HashMap<String, Value>, StorageError> {
        let entries = self.entries.read().await;
        Ok(keys
            .into_iter()
            .filter_map(|key| entries.get(&key).cloned().map(|value| (key, value)))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        apply_set(&mut entries, items, self.quota)
    }

    async fn remove(&self, keys: Vec<String>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(&key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<u64, StorageError> {
        Ok(total_size(&*self.entries.read().await))
    }

    fn quota_bytes(&self) -> u64 {
        self.quota
    }
}
