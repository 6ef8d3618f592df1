//! Handler for the monthly statistics endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde_json::json;

use crate::api::dto::stats::{StatsQuery, StatsResponse};
use crate::domain::time_bucket::MonthKey;
use crate::error::AppError;
use crate::state::AppState;

/// Returns the overview of one month: tracked sites, promoted sites and the
/// five most visited sites.
///
/// # Endpoint
///
/// `GET /api/stats[?month=YYYY-MM]`
///
/// # Response
///
/// ```json
/// {
///   "month": "2025-06",
///   "trackedSites": 12,
///   "promotedSites": 2,
///   "topSites": [
///     { "url": "https://example.com/", "title": "Example", "totalCount": 9, "promoted": true }
///   ],
///   "pendingRetries": 0,
///   "storage": { "bytesInUse": 4096, "quotaBytes": 10485760 }
/// }
/// ```
///
/// # Errors
///
/// - **400 Bad Request**: `month` is not a valid `YYYY-MM` key
pub async fn stats_handler(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let month = match query.month.as_deref() {
        Some(raw) => raw.parse::<MonthKey>().map_err(|e| {
            AppError::bad_request(e.to_string(), json!({ "month": raw }))
        })?,
        None => MonthKey::from_datetime(Utc::now()),
    };

    let engine = &state.engine;
    let summary = engine.stats().month_summary(month).await;

    Ok(Json(StatsResponse {
        summary,
        pending_retries: engine.pending_retries(),
        storage: engine.storage_usage().await?,
    }))
}
