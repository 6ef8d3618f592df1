//! JSON-file-backed key-value store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::memory_store::{apply_set, total_size};
use crate::domain::repositories::{KeyValueStore, StorageError};

type Entries = BTreeMap<String, Value>;

/// [`KeyValueStore`] persisted as a single JSON document.
///
/// Reads are served from memory. A mutation is applied to a copy of the
/// entries, written through a temporary file and an atomic rename, and only
/// then becomes visible. A failed write changes neither the file nor what
/// later reads and writes see.
pub struct FileStore {
    entries: RwLock<Entries>,
    path: PathBuf,
    quota: u64,
}

impl FileStore {
    /// Opens the store at `path`, loading existing contents if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the file or its directory
    /// cannot be accessed, and [`StorageError::Serialization`] if the file is
    /// not a JSON object.
    pub async fn open(path: impl Into<PathBuf>, quota_bytes: u64) -> Result<Self, StorageError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let entries: Entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(io_error(&path, e)),
        };

        info!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            entries: RwLock::new(entries),
            path,
            quota: quota_bytes,
        })
    }

    /// Applies `change` to a copy of the entries, writes the copy to disk and
    /// commits it to memory once the file is in place.
    async fn commit(
        &self,
        change: impl FnOnce(&mut Entries) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;

        let mut candidate = entries.clone();
        change(&mut candidate)?;
        self.write_file(&candidate).await?;

        *entries = candidate;
        Ok(())
    }

    async fn write_file(&self, entries: &Entries) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(entries)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        Ok(())
    }
}

fn io_error(path: &Path, e: io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, keys: Vec<String>) -> Result<HashMap<String, Value>, StorageError> {
        let entries = self.entries.read().await;
        Ok(keys
            .into_iter()
            .filter_map(|key| entries.get(&key).cloned().map(|value| (key, value)))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StorageError> {
        let quota = self.quota;
        self.commit(|entries| apply_set(entries, items, quota)).await
    }

    async fn remove(&self, keys: Vec<String>) -> Result<(), StorageError> {
        self.commit(|entries| {
            for key in &keys {
                entries.remove(key);
            }
            Ok(())
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.commit(|entries| {
            entries.clear();
            Ok(())
        })
        .await
    }

    async fn bytes_in_use(&self) -> Result<u64, StorageError> {
        Ok(total_size(&*self.entries.read().await))
    }

    fn quota_bytes(&self) -> u64 {
        self.quota
    }
}
