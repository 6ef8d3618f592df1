//! Process configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the server
//! starts. User-facing tracking settings (threshold, exclusions, retention)
//! are not here: they live in the key-value store and are managed by
//! [`crate::application::services::SettingsService`].
//!
//! ## Storage
//!
//! ```bash
//! export STORAGE_PATH="/var/lib/smart-bookmark/storage.json"
//! export STORAGE_QUOTA_BYTES="10485760"
//! ```
//!
//! Without `STORAGE_PATH` all state is kept in memory and lost on exit.
//!
//! ## Optional Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:3000`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `text`)
//! - `VISIT_QUEUE_CAPACITY` - Visit event buffer size (default: 10000, min: 100)
//! - `VISIT_WORKER_CONCURRENCY` - Visits processed in parallel (default: 4)
//! - `PROMOTE_MAX_ATTEMPTS` / `PROMOTE_RETRY_DELAY_MS` - Immediate promotion retries
//! - `RETRY_COOLDOWN_SECS` / `RETRY_MAX_ATTEMPTS` / `RETRY_MAX_AGE_DAYS` - Retry queue policy
//! - `CLEANUP_INTERVAL_MINUTES` / `RETRY_INTERVAL_MINUTES` /
//!   `STORAGE_CHECK_INTERVAL_MINUTES` - Alarm periods
//! - `STORAGE_HIGH_WATER_RATIO` - Quota fraction that forces cleanup (default: 0.8)

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::{EngineOptions, PromotionPolicy, RetryPolicy};
use crate::infrastructure::storage::DEFAULT_QUOTA_BYTES;
use crate::scheduler::AlarmIntervals;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    /// JSON file backing the key-value store. `None` keeps state in memory.
    pub storage_path: Option<PathBuf>,
    pub storage_quota_bytes: u64,
    pub visit_queue_capacity: usize,
    /// Maximum number of visit events processed concurrently by the background worker.
    pub visit_worker_concurrency: usize,

    // ── Promotion retries ───────────────────────────────────────────────────
    /// Immediate attempts per promotion, the first one included.
    pub promote_max_attempts: u32,
    pub promote_retry_delay_ms: u64,
    /// Minimum age of a queued promotion before the drainer retries it.
    pub retry_cooldown_secs: u64,
    /// `0` disables the bound.
    pub retry_max_attempts: u32,
    /// `0` disables the bound.
    pub retry_max_age_days: u32,

    // ── Alarms ──────────────────────────────────────────────────────────────
    pub cleanup_interval_minutes: u64,
    pub retry_interval_minutes: u64,
    pub storage_check_interval_minutes: u64,
    pub storage_high_water_ratio: f64,
}

/// Reads `name`, falling back to `default` when unset or unparsable.
fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `STORAGE_QUOTA_BYTES` is set but not a number.
    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let storage_path = env::var("STORAGE_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let storage_quota_bytes = match env::var("STORAGE_QUOTA_BYTES") {
            Ok(v) => v
                .trim()
                .parse()
                .with_context(|| format!("STORAGE_QUOTA_BYTES must be a number, got '{v}'"))?,
            Err(_) => DEFAULT_QUOTA_BYTES,
        };

        Ok(Self {
            listen_addr,
            log_level,
            log_format,
            storage_path,
            storage_quota_bytes,
            visit_queue_capacity: var_or("VISIT_QUEUE_CAPACITY", 10_000),
            visit_worker_concurrency: var_or("VISIT_WORKER_CONCURRENCY", 4),
            promote_max_attempts: var_or("PROMOTE_MAX_ATTEMPTS", 3),
            promote_retry_delay_ms: var_or("PROMOTE_RETRY_DELAY_MS", 1000),
            retry_cooldown_secs: var_or("RETRY_COOLDOWN_SECS", 3600),
            retry_max_attempts: var_or("RETRY_MAX_ATTEMPTS", 24),
            retry_max_age_days: var_or("RETRY_MAX_AGE_DAYS", 7),
            cleanup_interval_minutes: var_or("CLEANUP_INTERVAL_MINUTES", 10_080),
            retry_interval_minutes: var_or("RETRY_INTERVAL_MINUTES", 60),
            storage_check_interval_minutes: var_or("STORAGE_CHECK_INTERVAL_MINUTES", 1_440),
            storage_high_water_ratio: var_or("STORAGE_HIGH_WATER_RATIO", 0.8),
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.visit_queue_capacity < 100 {
            anyhow::bail!(
                "VISIT_QUEUE_CAPACITY must be at least 100, got {}",
                self.visit_queue_capacity
            );
        }

        if self.visit_queue_capacity > 1_000_000 {
            anyhow::bail!(
                "VISIT_QUEUE_CAPACITY is too large (max: 1000000), got {}",
                self.visit_queue_capacity
            );
        }

        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if self.storage_quota_bytes == 0 {
            anyhow::bail!("STORAGE_QUOTA_BYTES must be greater than 0");
        }

        if self.visit_worker_concurrency == 0 || self.visit_worker_concurrency > 256 {
            anyhow::bail!(
                "VISIT_WORKER_CONCURRENCY must be between 1 and 256, got {}",
                self.visit_worker_concurrency
            );
        }

        if self.promote_max_attempts == 0 {
            anyhow::bail!("PROMOTE_MAX_ATTEMPTS must be at least 1");
        }

        if self.cleanup_interval_minutes == 0
            || self.retry_interval_minutes == 0
            || self.storage_check_interval_minutes == 0
        {
            anyhow::bail!("Alarm intervals must be greater than 0 minutes");
        }

        if !(self.storage_high_water_ratio > 0.0 && self.storage_high_water_ratio < 1.0) {
            anyhow::bail!(
                "STORAGE_HIGH_WATER_RATIO must be between 0 and 1 (exclusive), got {}",
                self.storage_high_water_ratio
            );
        }

        Ok(())
    }

    /// Returns whether state survives a restart.
    pub fn is_persistent(&self) -> bool {
        self.storage_path.is_some()
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_options(&self) -> EngineOptions {
        let bound = |v: u32| (v > 0).then_some(v);

        EngineOptions {
            promotion: PromotionPolicy {
                max_attempts: self.promote_max_attempts,
                retry_delay: Duration::from_millis(self.promote_retry_delay_ms),
            },
            retry: RetryPolicy {
                cooldown: chrono::Duration::seconds(self.retry_cooldown_secs as i64),
                max_attempts: bound(self.retry_max_attempts),
                max_age: bound(self.retry_max_age_days)
                    .map(|days| chrono::Duration::days(i64::from(days))),
            },
            high_water_ratio: self.storage_high_water_ratio,
        }
    }

    /// Alarm periods derived from this configuration.
    pub fn alarm_intervals(&self) -> AlarmIntervals {
        let minutes = |m: u64| Duration::from_secs(m * 60);

        AlarmIntervals {
            cleanup: minutes(self.cleanup_interval_minutes),
            retry_queue: minutes(self.retry_interval_minutes),
            storage_check: minutes(self.storage_check_interval_minutes),
        }
    }

    /// Prints configuration summary.
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);

        match self.storage_path {
            Some(ref path) => tracing::info!("  Storage: file {}", path.display()),
            None => tracing::info!("  Storage: in-memory (not persistent)"),
        }

        tracing::info!("  Storage quota: {} bytes", self.storage_quota_bytes);
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
        tracing::info!("  Visit queue capacity: {}", self.visit_queue_capacity);
        tracing::info!("  Visit worker concurrency: {}", self.visit_worker_concurrency);
        tracing::info!(
            "  Alarms (min): cleanup={} retryQueue={} storageCheck={}",
            self.cleanup_interval_minutes,
            self.retry_interval_minutes,
            self.storage_check_interval_minutes
        );
    }
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if a variable is malformed or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}
