//! Registration history endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::history::{HistoryFilter, PaginatedHistory};
use crate::AppState;

use super::internal;

const DEFAULT_PER_PAGE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Free-text filter over all columns
    pub query: Option<String>,
    /// `registered` | `skipped` | `error`
    pub status: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub date_to: Option<String>,
    pub attachment_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub deleted: u64,
}

/// List history entries, newest first
async fn list(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<PaginatedHistory>, (StatusCode, String)> {
    let filter = HistoryFilter {
        query: q.query,
        status: q.status,
        date_from: q.date_from,
        date_to: q.date_to,
        attachment_id: q.attachment_id,
    };

    let page = state
        .db
        .history()
        .list(filter, q.page.unwrap_or(1), q.per_page.unwrap_or(DEFAULT_PER_PAGE))
        .await
        .map_err(internal)?;

    Ok(Json(page))
}

/// Delete the entire audit trail. Attachments are untouched.
async fn clear(
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, (StatusCode, String)> {
    let deleted = state.db.history().truncate().await.map_err(internal)?;
    info!(deleted, "Registration history cleared");

    Ok(Json(ClearResponse { deleted }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/history", get(list).delete(clear))
}
