//! Handlers for the stored user settings.

use axum::{Json, extract::State};
use serde_json::json;

use crate::api::dto::settings::SettingsResponse;
use crate::error::AppError;
use crate::state::AppState;

fn current(state: &AppState) -> SettingsResponse {
    let settings = state.engine.settings();
    SettingsResponse {
        settings: (*settings.current()).clone(),
        exclusions: (*settings.exclusions()).clone(),
    }
}

/// `GET /api/settings`
pub async fn settings_handler(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(current(&state))
}

/// Re-reads settings and exclusions from storage.
///
/// `POST /api/settings/reload`
///
/// Returns 503 if storage could not be read; the previous values stay active.
pub async fn reload_settings_handler(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    if !state.engine.reload_settings().await {
        return Err(AppError::unavailable(
            "Settings could not be read, previous values kept",
            json!({}),
        ));
    }
    Ok(Json(current(&state)))
}
