//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Storage**: Reads usage and reports it against the quota
/// 2. **Visit Queue**: Checks if channel is open and reports free capacity
/// 3. **Retry Queue**: Reports the number of queued promotions
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let storage_check = check_storage(&state).await;

    let queue_check = check_visit_queue(&state);

    let retry_check = CheckStatus::ok(format!(
        "Pending: {}",
        state.engine.pending_retries()
    ));

    let all_healthy = storage_check.is_ok() && queue_check.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            storage: storage_check,
            visit_queue: queue_check,
            retry_queue: retry_check,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_storage(state: &AppState) -> CheckStatus {
    match state.engine.storage_usage().await {
        Ok(usage) => CheckStatus::ok(format!(
            "{} of {} bytes used ({:.1}%)",
            usage.bytes_in_use,
            usage.quota_bytes,
            usage.ratio() * 100.0
        )),
        Err(e) => CheckStatus::error(format!("Storage error: {}", e)),
    }
}

fn check_visit_queue(state: &AppState) -> CheckStatus {
    if state.visit_tx.is_closed() {
        CheckStatus::error("Visit queue is closed")
    } else {
        CheckStatus::ok(format!("Capacity: {}", state.visit_tx.capacity()))
    }
}
