//! Settings endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::settings::{
    KEY_AUTO_REGISTER_ENABLED, KEY_AUTO_REGISTER_LIMIT, KEY_IMAGE_DIRECTORY,
};
use crate::AppState;

use super::{effective_dir, internal};

const MAX_AUTO_REGISTER_LIMIT: i64 = 500;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub image_directory: String,
    pub auto_register_enabled: bool,
    pub auto_register_limit: i64,
    /// Absolute directory the current settings resolve to
    pub resolved_directory: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub image_directory: Option<String>,
    pub auto_register_enabled: Option<bool>,
    pub auto_register_limit: Option<i64>,
}

async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, (StatusCode, String)> {
    let settings = state.db.settings();
    let resolved = effective_dir(&state).await?;

    Ok(Json(SettingsResponse {
        image_directory: settings.image_directory().await.map_err(internal)?,
        auto_register_enabled: settings.auto_register_enabled().await.map_err(internal)?,
        auto_register_limit: settings.auto_register_limit().await.map_err(internal)?,
        resolved_directory: resolved.display().to_string(),
    }))
}

/// Partial update; only the supplied fields change
async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, (StatusCode, String)> {
    let settings = state.db.settings();

    if let Some(dir) = req.image_directory {
        settings
            .set(KEY_IMAGE_DIRECTORY, dir.trim())
            .await
            .map_err(internal)?;
    }
    if let Some(enabled) = req.auto_register_enabled {
        settings
            .set(KEY_AUTO_REGISTER_ENABLED, enabled)
            .await
            .map_err(internal)?;
    }
    if let Some(limit) = req.auto_register_limit {
        settings
            .set(KEY_AUTO_REGISTER_LIMIT, limit.clamp(1, MAX_AUTO_REGISTER_LIMIT))
            .await
            .map_err(internal)?;
    }
    info!("Settings updated");

    get_settings(State(state)).await
}

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}
