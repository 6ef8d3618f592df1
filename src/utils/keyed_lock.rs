//! Async mutual exclusion keyed by string.
//!
//! Each key gets its own `tokio` mutex, created on first use and dropped
//! again once no task holds or waits for it, so the map stays proportional to
//! the number of keys currently in use.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A family of async mutexes, one per key.
///
/// Holders of different keys never contend.
#[derive(Debug, Default)]
pub struct KeyedLock {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and returns a guard holding it.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        KeyedGuard {
            locks: Arc::clone(&self.locks),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }
}

/// Holds one key of a [`KeyedLock`]; releases it on drop.
#[derive(Debug)]
pub struct KeyedGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // Release first so the map entry is the only remaining reference
        // when nobody else is waiting.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
