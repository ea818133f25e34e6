//! Registration statistics endpoint

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::services::enumerator::FileEnumerator;
use crate::AppState;

use super::{effective_dir, internal};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Files currently in the configured directory
    pub total_files: i64,
    pub registered: i64,
    pub skipped: i64,
    /// Files on disk with no history row yet; floored at zero because the
    /// history can outlive files deleted from disk
    pub unprocessed: i64,
}

async fn stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let directory = effective_dir(&state).await?;
    let total_files = FileEnumerator.count(&directory) as i64;

    let history = state.db.history();
    let registered = history.count_by_status("registered").await.map_err(internal)?;
    let skipped = history.count_by_status("skipped").await.map_err(internal)?;

    Ok(Json(StatsResponse {
        total_files,
        registered,
        skipped,
        unprocessed: (total_files - registered - skipped).max(0),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}
