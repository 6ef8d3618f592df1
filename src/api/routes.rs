//! API route configuration.

use crate::api::handlers::{
    alarm_handler, cleanup_handler, record_visit_handler, reload_settings_handler,
    settings_handler, stats_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// All API routes.
///
/// # Endpoints
///
/// - `POST /visits`          - Report a page visit
/// - `GET  /stats`           - Monthly visit overview
/// - `GET  /settings`        - Current settings and exclusions
/// - `POST /settings/reload` - Re-read settings from storage
/// - `POST /alarms/{name}`   - Run a maintenance alarm now
/// - `POST /cleanup`         - Run retention cleanup now
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/visits", post(record_visit_handler))
        .route("/stats", get(stats_handler))
        .route("/settings", get(settings_handler))
        .route("/settings/reload", post(reload_settings_handler))
        .route("/alarms/{name}", post(alarm_handler))
        .route("/cleanup", post(cleanup_handler))
}
