//! Time-windowed retention of month buckets.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::aggregate_store::PruneReport;
use crate::application::services::{AggregateStore, SettingsService};
use crate::domain::repositories::{KeyValueStore, StorageError};
use crate::domain::time_bucket::MonthKey;

/// Default fraction of the quota above which cleanup is forced.
pub const DEFAULT_HIGH_WATER_RATIO: f64 = 0.8;

/// What started a cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupTrigger {
    /// The periodic `cleanup` alarm. Honours `auto_cleanup`.
    Scheduled,
    /// Storage usage crossed the high-water mark or a write hit the quota.
    /// Runs even when `auto_cleanup` is off.
    QuotaPressure,
    /// Explicit operator request. Honours `auto_cleanup`.
    Manual,
}

impl CleanupTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::QuotaPressure => "quota_pressure",
            Self::Manual => "manual",
        }
    }

    /// Only quota pressure may run while `auto_cleanup` is off.
    fn overrides_auto_cleanup(&self) -> bool {
        matches!(self, Self::QuotaPressure)
    }
}

/// Result of [`RetentionManager::cleanup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// `auto_cleanup` is off and the trigger does not override it.
    Skipped,
    Completed {
        cutoff: MonthKey,
        #[serde(flatten)]
        report: PruneReport,
    },
}

/// Storage consumption relative to the quota.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub bytes_in_use: u64,
    pub quota_bytes: u64,
}

impl StorageUsage {
    /// Used fraction of the quota; `1.0` for a zero quota.
    pub fn ratio(&self) -> f64 {
        if self.quota_bytes == 0 {
            return 1.0;
        }
        self.bytes_in_use as f64 / self.quota_bytes as f64
    }
}

/// Result of [`RetentionManager::check_storage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCheck {
    pub usage: StorageUsage,
    /// Present when the high-water mark forced a cleanup.
    pub cleanup: Option<CleanupOutcome>,
}

/// Prunes month buckets older than `keep_data_months`.
///
/// The horizon is `current month - keep_data_months`: with six months kept and
/// a current month of `2025-06`, `2024-12` survives and `2024-11` is deleted.
pub struct RetentionManager {
    store: Arc<AggregateStore>,
    settings: Arc<SettingsService>,
    storage: Arc<dyn KeyValueStore>,
    high_water_ratio: f64,
}

impl RetentionManager {
    pub fn new(
        store: Arc<AggregateStore>,
        settings: Arc<SettingsService>,
        storage: Arc<dyn KeyValueStore>,
        high_water_ratio: f64,
    ) -> Self {
        Self {
            store,
            settings,
            storage,
            high_water_ratio,
        }
    }

    /// Oldest month bucket kept as of `now`.
    pub fn horizon(&self, now: DateTime<Utc>) -> MonthKey {
        MonthKey::from_datetime(now).minus_months(self.settings.current().keep_data_months)
    }

    /// Deletes every bucket older than the retention horizon.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if storage cannot be listed or written.
    pub async fn cleanup(
        &self,
        trigger: CleanupTrigger,
        now: DateTime<Utc>,
    ) -> Result<CleanupOutcome, StorageError> {
        let settings = self.settings.current();
        if !settings.auto_cleanup {
            if !trigger.overrides_auto_cleanup() {
                debug!(trigger = trigger.as_str(), "Auto cleanup disabled, skipping");
                return Ok(CleanupOutcome::Skipped);
            }
            warn!(trigger = trigger.as_str(), "Running cleanup although auto cleanup is disabled");
        }

        let cutoff = self.horizon(now);
        let report = self.store.prune_before(cutoff).await?;

        counter!("cleanup_runs_total", "trigger" => trigger.as_str()).increment(1);
        counter!("month_buckets_pruned_total").increment(report.buckets_removed.len() as u64);
        info!(
            trigger = trigger.as_str(),
            cutoff = %cutoff,
            buckets_removed = report.buckets_removed.len(),
            records_removed = report.records_removed,
            records_trimmed = report.records_trimmed,
            "Cleanup completed"
        );

        Ok(CleanupOutcome::Completed { cutoff, report })
    }

    /// Current storage consumption.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if usage cannot be read.
    pub async fn usage(&self) -> Result<StorageUsage, StorageError> {
        Ok(StorageUsage {
            bytes_in_use: self.storage.bytes_in_use().await?,
            quota_bytes: self.storage.quota_bytes(),
        })
    }

    /// Forces a cleanup if usage is above the high-water mark.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if usage cannot be read or cleanup fails.
    pub async fn check_storage(&self, now: DateTime<Utc>) -> Result<StorageCheck, StorageError> {
        let usage = self.usage().await?;
        let ratio = usage.ratio();

        if ratio <= self.high_water_ratio {
            debug!(ratio, bytes_in_use = usage.bytes_in_use, "Storage usage below high-water mark");
            return Ok(StorageCheck { usage, cleanup: None });
        }

        warn!(
            ratio,
            bytes_in_use = usage.bytes_in_use,
            quota_bytes = usage.quota_bytes,
            "Storage usage above high-water mark, forcing cleanup"
        );
        let cleanup = self.cleanup(CleanupTrigger::QuotaPressure, now).await?;
        Ok(StorageCheck {
            usage: self.usage().await?,
            cleanup: Some(cleanup),
        })
    }
}
