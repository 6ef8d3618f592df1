//! Hot-reloadable settings and exclusion list.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::application::services::PatternFilter;
use crate::domain::entities::{ExclusionEntry, Settings, default_exclusions};
use crate::domain::repositories::{KeyValueStore, StorageError};

/// Storage key of the [`Settings`] document.
pub const SETTINGS_KEY: &str = "settings";
/// Storage key of the exclusion list.
pub const EXCLUSIONS_KEY: &str = "exclusions";

#[derive(Debug, Clone)]
struct Snapshot {
    settings: Arc<Settings>,
    exclusions: Arc<Vec<ExclusionEntry>>,
    filter: Arc<PatternFilter>,
}

impl Snapshot {
    fn new(settings: Settings, exclusions: Vec<ExclusionEntry>) -> Self {
        let filter = PatternFilter::new(&exclusions);
        Self {
            settings: Arc::new(settings),
            exclusions: Arc::new(exclusions),
            filter: Arc::new(filter),
        }
    }
}

/// Read-mostly view of the user's settings and exclusion list.
///
/// Readers get cheap `Arc` snapshots; [`SettingsService::reload`] swaps in a
/// fresh snapshot read from storage. Missing or corrupt configuration never
/// stops processing: the documented defaults are used instead.
pub struct SettingsService {
    storage: Arc<dyn KeyValueStore>,
    snapshot: RwLock<Snapshot>,
}

impl SettingsService {
    /// Creates a service holding the defaults, without touching storage.
    pub fn with_defaults(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            snapshot: RwLock::new(Snapshot::new(Settings::default(), default_exclusions())),
        }
    }

    /// Creates a service and loads the stored configuration.
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let service = Self::with_defaults(storage);
        service.reload().await;
        service
    }

    /// Current settings.
    pub fn current(&self) -> Arc<Settings> {
        Arc::clone(&self.read().settings)
    }

    /// Filter compiled from the current exclusion list.
    pub fn filter(&self) -> Arc<PatternFilter> {
        Arc::clone(&self.read().filter)
    }

    /// Current exclusion list.
    pub fn exclusions(&self) -> Arc<Vec<ExclusionEntry>> {
        Arc::clone(&self.read().exclusions)
    }

    /// Re-reads settings and exclusions from storage.
    ///
    /// Returns `false` if storage could not be read; the previous snapshot is
    /// kept in that case.
    pub async fn reload(&self) -> bool {
        let stored = match self
            .storage
            .get(vec![SETTINGS_KEY.to_string(), EXCLUSIONS_KEY.to_string()])
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read settings, keeping previous values");
                return false;
            }
        };

        let settings = match stored.get(SETTINGS_KEY) {
            Some(value) => {
                let (settings, rejected) = Settings::from_value(value);
                if !rejected.is_empty() {
                    warn!(fields = ?rejected, "Invalid settings fields replaced by defaults");
                }
                settings
            }
            None => {
                debug!("No stored settings, using defaults");
                Settings::default()
            }
        };

        let exclusions = match stored.get(EXCLUSIONS_KEY) {
            Some(value) => match serde_json::from_value::<Vec<ExclusionEntry>>(value.clone()) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Corrupt exclusion list, using defaults");
                    default_exclusions()
                }
            },
            None => default_exclusions(),
        };

        let snapshot = Snapshot::new(settings, exclusions);
        info!(
            enabled = snapshot.settings.enabled,
            threshold = snapshot.settings.threshold,
            exclusion_rules = snapshot.filter.rule_count(),
            "Settings loaded"
        );
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        true
    }

    /// Writes defaults for whichever of settings/exclusions is missing.
    ///
    /// Returns `true` if anything was written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be read or written.
    pub async fn seed_defaults(&self) -> Result<bool, StorageError> {
        let stored = self
            .storage
            .get(vec![SETTINGS_KEY.to_string(), EXCLUSIONS_KEY.to_string()])
            .await?;

        let mut missing: HashMap<String, Value> = HashMap::new();
        if !stored.contains_key(SETTINGS_KEY) {
            missing.insert(SETTINGS_KEY.to_string(), serde_json::to_value(Settings::default())?);
        }
        if !stored.contains_key(EXCLUSIONS_KEY) {
            missing.insert(EXCLUSIONS_KEY.to_string(), serde_json::to_value(default_exclusions())?);
        }

        if missing.is_empty() {
            return Ok(false);
        }

        info!(keys = ?missing.keys().collect::<Vec<_>>(), "Seeding default configuration");
        self.storage.set(missing).await?;
        self.reload().await;
        Ok(true)
    }

    /// Persists new settings and exclusions and makes them current.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails; the current snapshot is
    /// unchanged in that case.
    pub async fn save(
        &self,
        settings: Settings,
        exclusions: Vec<ExclusionEntry>,
    ) -> Result<(), StorageError> {
        let mut items = HashMap::new();
        items.insert(SETTINGS_KEY.to_string(), serde_json::to_value(&settings)?);
        items.insert(EXCLUSIONS_KEY.to_string(), serde_json::to_value(&exclusions)?);
        self.storage.set(items).await?;

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
            Snapshot::new(settings, exclusions);
        Ok(())
    }

    /// Overwrites stored settings and exclusions with the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    pub async fn restore_defaults(&self) -> Result<(), StorageError> {
        self.save(Settings::default(), default_exclusions()).await
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::OrganizationType;
    use crate::domain::repositories::MockKeyValueStore;
    use crate::infrastructure::storage::MemoryStore;
    use serde_json::json;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(1024 * 1024))
    }

    #[tokio::test]
    async fn test_load_without_stored_config_uses_defaults() {
        let service = SettingsService::load(store()).await;

        assert_eq!(*service.current(), Settings::default());
        assert_eq!(service.exclusions().len(), 2);
        assert!(!service.filter().is_eligible("chrome://settings"));
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let storage = store();
        let service = SettingsService::load(storage.clone()).await;

        let mut items = HashMap::new();
        items.insert(
            SETTINGS_KEY.to_string(),
            json!({ "enabled": false, "threshold": 7, "excludeDailyThreshold": 3,
                    "keepDataMonths": 6, "organizationType": "flat", "autoCleanup": true }),
        );
        items.insert(
            EXCLUSIONS_KEY.to_string(),
            json!([{ "urlHint": "", "pattern": "*.example.com", "description": "" }]),
        );
        storage.set(items).await.unwrap();

        assert!(service.reload().await);

        let settings = service.current();
        assert!(!settings.enabled);
        assert_eq!(settings.threshold, 7);
        assert_eq!(settings.organization_type, OrganizationType::Flat);
        assert!(!service.filter().is_eligible("https://a.example.com/"));
    }

    #[tokio::test]
    async fn test_corrupt_exclusions_fall_back_to_defaults() {
        let storage = store();
        let mut items = HashMap::new();
        items.insert(EXCLUSIONS_KEY.to_string(), json!({ "not": "a list" }));
        storage.set(items).await.unwrap();

        let service = SettingsService::load(storage).await;

        assert_eq!(*service.exclusions(), default_exclusions());
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_previous_snapshot() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .returning(|_| Err(StorageError::Unavailable("offline".to_string())));

        let service = SettingsService::with_defaults(Arc::new(mock));

        assert!(!service.reload().await);
        assert_eq!(*service.current(), Settings::default());
    }

    #[tokio::test]
    async fn test_seed_defaults_only_writes_missing_keys() {
        let storage = store();
        let service = SettingsService::load(storage.clone()).await;

        assert!(service.seed_defaults().await.unwrap());
        assert!(!service.seed_defaults().await.unwrap());

        let stored = storage
            .get(vec![SETTINGS_KEY.to_string(), EXCLUSIONS_KEY.to_string()])
            .await
            .unwrap();
        assert_eq!(stored[SETTINGS_KEY]["threshold"], 3);
        assert_eq!(stored[EXCLUSIONS_KEY][0]["pattern"], "chrome://*");
    }

    #[tokio::test]
    async fn test_save_updates_snapshot() {
        let service = SettingsService::load(store()).await;

        let settings = Settings {
            threshold: 10,
            ..Settings::default()
        };
        service
            .save(settings, vec![ExclusionEntry::new("news.test", "", "")])
            .await
            .unwrap();

        assert_eq!(service.current().threshold, 10);
        assert!(!service.filter().is_eligible("https://news.test/today"));
    }
}
