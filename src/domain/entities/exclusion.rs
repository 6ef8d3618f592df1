//! Exclusion list entries consulted before a URL is tracked.

use serde::{Deserialize, Serialize};

/// A user-maintained rule that keeps matching URLs out of tracking.
///
/// `pattern` may contain the wildcards `*` (any run of characters) and `?`
/// (exactly one character). Entries without wildcards are plain substring
/// rules, see [`crate::application::services::PatternFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionEntry {
    #[serde(alias = "url", default)]
    pub url_hint: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

impl ExclusionEntry {
    pub fn new(
        url_hint: impl Into<String>,
        pattern: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            url_hint: url_hint.into(),
            pattern: pattern.into(),
            description: description.into(),
        }
    }

    /// Whether `pattern` uses wildcard syntax.
    pub fn is_wildcard(&self) -> bool {
        self.pattern.contains(['*', '?'])
    }
}

/// Exclusions seeded on first start: browser-internal pages.
pub fn default_exclusions() -> Vec<ExclusionEntry> {
    vec![
        ExclusionEntry::new("chrome://", "chrome://*", "Browser internal pages"),
        ExclusionEntry::new("chrome-extension://", "chrome-extension://*", "Extension pages"),
    ]
}
