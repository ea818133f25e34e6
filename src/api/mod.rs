//! API route definitions
//!
//! REST endpoints for driving registration runs, browsing the audit
//! history, and managing settings. Batch run state travels with the
//! client between calls; the server keeps no per-run session.

pub mod health;
pub mod history;
pub mod registration;
pub mod settings;
pub mod stats;

use std::fmt::Display;
use std::path::PathBuf;

use axum::http::StatusCode;

use crate::AppState;

/// Directory the current settings point a run at
pub(crate) async fn effective_dir(state: &AppState) -> Result<PathBuf, (StatusCode, String)> {
    let subdir = state.db.settings().image_directory().await.map_err(internal)?;
    Ok(state.root.effective_dir(&subdir))
}

pub(crate) fn internal<E: Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
