//! Durable key-value storage consumed by the engine.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded: {required} bytes required, quota is {quota} bytes")]
    QuotaExceeded { required: u64, quota: u64 },

    #[error("stored value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Durable JSON key-value store, the sole persistence mechanism of the engine.
///
/// Settings, exclusions, visit statistics and the retry queue all live here.
/// Writes are all-or-nothing per call.
///
/// # Implementations
///
/// - [`crate::infrastructure::storage::MemoryStore`] - Process-local store
/// - [`crate::infrastructure::storage::FileStore`] - JSON file persisted on every write
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the given keys. Missing keys are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the backend cannot be read.
    async fn get(&self, keys: Vec<String>) -> Result<HashMap<String, Value>, StorageError>;

    /// Writes all items atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the write would exceed
    /// [`KeyValueStore::quota_bytes`]; nothing is written in that case.
    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StorageError>;

    /// Removes the given keys. Unknown keys are ignored.
    async fn remove(&self, keys: Vec<String>) -> Result<(), StorageError>;

    /// Lists every stored key.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Removes everything.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Bytes currently used, measured as JSON key plus value length.
    async fn bytes_in_use(&self) -> Result<u64, StorageError>;

    /// Maximum number of bytes the store accepts.
    fn quota_bytes(&self) -> u64;
}
