//! Handler for the visit ingest endpoint.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use validator::Validate;

use crate::api::dto::visit::{VisitQuery, VisitRequest, VisitResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Reports a completed page load.
///
/// # Endpoint
///
/// `POST /api/visits[?wait=true]`
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/docs",
///   "title": "Example Docs",
///   "observedAt": "2025-06-01T09:30:00Z"
/// }
/// ```
///
/// # Response Codes
///
/// - **202 Accepted**: Queued for the background worker (default)
/// - **200 OK**: Processed inline (`wait=true`); the body carries the outcome
/// - **400 Bad Request**: Malformed URL or oversized title
/// - **503 Service Unavailable**: Visit queue is full or closed
pub async fn record_visit_handler(
    State(state): State<AppState>,
    Query(query): Query<VisitQuery>,
    Json(payload): Json<VisitRequest>,
) -> Result<(StatusCode, Json<VisitResponse>), AppError> {
    payload.validate()?;
    let event = payload.into_event();

    if query.wait {
        let outcome = state.engine.handle_visit(&event).await;
        return Ok((StatusCode::OK, Json(VisitResponse::processed(outcome))));
    }

    match state.visit_tx.try_send(event) {
        Ok(()) => Ok((StatusCode::ACCEPTED, Json(VisitResponse::queued()))),
        Err(TrySendError::Full(event)) => {
            tracing::warn!(url = %event.url, "Visit queue full, rejecting visit");
            Err(AppError::unavailable(
                "Visit queue is full",
                json!({ "capacity": state.visit_tx.max_capacity() }),
            ))
        }
        Err(TrySendError::Closed(_)) => {
            tracing::error!("Visit queue closed");
            Err(AppError::unavailable("Visit queue is closed", json!({})))
        }
    }
}
