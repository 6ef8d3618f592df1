//! DTOs for the settings endpoints.

use serde::Serialize;

use crate::domain::entities::{ExclusionEntry, Settings};

/// The configuration the engine is currently running with.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: Settings,
    pub exclusions: Vec<ExclusionEntry>,
}
