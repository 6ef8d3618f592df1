//! Frequency tiers used to pick a destination folder.

use serde::Serialize;

/// Frequency classification of a promoted URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Capped total below 4.
    New,
    /// Capped total 4 to 6.
    Weekly,
    /// Capped total 7 to 14.
    Regular,
    /// Capped total 15 or more.
    Daily,
}

impl Tier {
    /// Title of the bookmark subfolder holding this tier.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Tier::Daily => "🔥 Daily",
            Tier::Regular => "⭐ Regular",
            Tier::Weekly => "📅 Weekly",
            Tier::New => "💡 New",
        }
    }
}
