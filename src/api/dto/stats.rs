//! DTOs for the statistics endpoint.

use serde::{Deserialize, Serialize};

use crate::application::services::{MonthSummary, StorageUsage};

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Month in `YYYY-MM` form; the current month when omitted.
    pub month: Option<String>,
}

/// Month overview plus engine bookkeeping.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub summary: MonthSummary,
    pub pending_retries: usize,
    pub storage: StorageUsage,
}
