//! Handlers that run maintenance jobs on demand.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;

use crate::application::services::{AlarmReport, CleanupOutcome};
use crate::domain::alarm::Alarm;
use crate::error::AppError;
use crate::state::AppState;

/// Fires an alarm immediately, exactly as the scheduler would.
///
/// # Endpoint
///
/// `POST /api/alarms/{name}` where `name` is `cleanup`, `retryQueue` or
/// `storageCheck`.
///
/// # Errors
///
/// - **404 Not Found**: Unknown alarm name
/// - **503 / 500**: The job failed to read or write storage
pub async fn alarm_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AlarmReport>, AppError> {
    let alarm: Alarm = name.parse()?;
    let report = state.engine.handle_alarm(alarm, Utc::now()).await?;
    Ok(Json(report))
}

/// Runs retention cleanup now. Reports `skipped` while `autoCleanup` is off.
///
/// `POST /api/cleanup`
pub async fn cleanup_handler(
    State(state): State<AppState>,
) -> Result<Json<CleanupOutcome>, AppError> {
    Ok(Json(state.engine.cleanup_now(Utc::now()).await?))
}
