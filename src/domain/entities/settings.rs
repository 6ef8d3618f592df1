//! User settings read by every engine component.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_THRESHOLD: u32 = 3;
pub const DEFAULT_EXCLUDE_DAILY_THRESHOLD: u32 = 3;
pub const DEFAULT_KEEP_DATA_MONTHS: u32 = 6;

/// How promoted bookmarks are grouped inside the auto-bookmark folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationType {
    /// One subfolder per frequency tier.
    #[default]
    Frequency,
    /// Everything directly in the auto-bookmark folder.
    Flat,
}

impl OrganizationType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "frequency" => Some(Self::Frequency),
            "flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

/// Process-wide tracking settings.
///
/// Stored as JSON under the `settings` key. Missing or invalid fields fall
/// back to their defaults individually (see [`Settings::from_value`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    /// Capped visit total at which a URL is promoted. Always `> 0`.
    pub threshold: u32,
    /// Visits within one day at which that day stops triggering promotion.
    pub exclude_daily_threshold: u32,
    /// Month buckets older than this many months are pruned.
    pub keep_data_months: u32,
    pub organization_type: OrganizationType,
    pub auto_cleanup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            exclude_daily_threshold: DEFAULT_EXCLUDE_DAILY_THRESHOLD,
            keep_data_months: DEFAULT_KEEP_DATA_MONTHS,
            organization_type: OrganizationType::Frequency,
            auto_cleanup: true,
        }
    }
}

impl Settings {
    /// Builds settings from a stored JSON value, tolerating corruption.
    ///
    /// Each field is read independently; a missing, mistyped, or
    /// non-positive value keeps the default for that field. Returns the
    /// settings together with the names of the fields that were replaced.
    pub fn from_value(value: &Value) -> (Self, Vec<&'static str>) {
        let mut settings = Self::default();
        let mut rejected = Vec::new();

        let Some(object) = value.as_object() else {
            return (settings, vec!["settings"]);
        };

        if let Some(v) = read_field(object, "enabled", &mut rejected, Value::as_bool) {
            settings.enabled = v;
        }
        if let Some(v) = read_field(object, "threshold", &mut rejected, positive_u32) {
            settings.threshold = v;
        }
        if let Some(v) = read_field(object, "excludeDailyThreshold", &mut rejected, positive_u32) {
            settings.exclude_daily_threshold = v;
        }
        if let Some(v) = read_field(object, "keepDataMonths", &mut rejected, positive_u32) {
            settings.keep_data_months = v;
        }
        if let Some(v) = read_field(object, "organizationType", &mut rejected, |v| {
            v.as_str().and_then(OrganizationType::parse)
        }) {
            settings.organization_type = v;
        }
        if let Some(v) = read_field(object, "autoCleanup", &mut rejected, Value::as_bool) {
            settings.auto_cleanup = v;
        }

        (settings, rejected)
    }
}

fn read_field<T>(
    object: &serde_json::Map<String, Value>,
    name: &'static str,
    rejected: &mut Vec<&'static str>,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let parsed = object.get(name).and_then(parse);
    if parsed.is_none() {
        rejected.push(name);
    }
    parsed
}

fn positive_u32(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}
