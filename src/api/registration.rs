//! Batch registration endpoints
//!
//! The client starts a run, receives the full [`OperationState`], and posts
//! it back to advance, pause, resume or cancel. Keeping the state on the
//! client side means an abandoned browser tab never leaves a stuck run on
//! the server.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::history::HistoryRecord;
use crate::services::batch::{BatchError, BatchSummary, OperationState, RunOptions};
use crate::services::registrar::RegistrationError;
use crate::AppState;

use super::{effective_dir, internal};

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Restrict the run to one file; an empty string means no restriction
    pub specific_file: Option<String>,
    /// Retry previously skipped files with forced re-registration
    #[serde(default)]
    pub process_skipped: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub state: OperationState,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub state: OperationState,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub state: OperationState,
    pub summary: BatchSummary,
    /// Full audit rows written during this batch
    pub new_rows: Vec<HistoryRecord>,
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub state: OperationState,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: OperationState,
}

fn batch_error(e: BatchError) -> (StatusCode, String) {
    match e {
        BatchError::NotRunning => (StatusCode::CONFLICT, e.to_string()),
        BatchError::Registration(RegistrationError::DirectoryNotFound { .. }) => {
            (StatusCode::NOT_FOUND, e.to_string())
        }
        other => internal(other),
    }
}

/// Start a new run over the configured directory
async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, (StatusCode, String)> {
    let directory = effective_dir(&state).await?;
    let opts = RunOptions {
        specific_file: req.specific_file.filter(|f| !f.trim().is_empty()),
        process_skipped: req.process_skipped,
    };

    let run = state
        .driver
        .start(&directory, opts)
        .await
        .map_err(batch_error)?;

    Ok(Json(StartResponse { state: run }))
}

/// Process the next batch of an in-flight run
async fn batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, (StatusCode, String)> {
    let mut run = req.state;
    let summary = state
        .driver
        .process_batch(&mut run, req.batch_size.unwrap_or(0))
        .await
        .map_err(batch_error)?;

    let history = state.db.history();
    let mut new_rows = Vec::with_capacity(summary.new_history_ids.len());
    for id in &summary.new_history_ids {
        if let Some(row) = history.get_by_id(*id).await.map_err(internal)? {
            new_rows.push(row);
        }
    }

    Ok(Json(BatchResponse {
        state: run,
        summary,
        new_rows,
    }))
}

async fn pause(
    Json(req): Json<StateRequest>,
) -> Result<Json<StateResponse>, (StatusCode, String)> {
    let mut run = req.state;
    run.pause().map_err(batch_error)?;
    Ok(Json(StateResponse { state: run }))
}

async fn resume(
    Json(req): Json<StateRequest>,
) -> Result<Json<StateResponse>, (StatusCode, String)> {
    let mut run = req.state;
    run.resume().map_err(batch_error)?;
    Ok(Json(StateResponse { state: run }))
}

async fn cancel(Json(req): Json<StateRequest>) -> Json<StateResponse> {
    let mut run = req.state;
    run.cancel();
    Json(StateResponse { state: run })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registration/start", post(start))
        .route("/registration/batch", post(batch))
        .route("/registration/pause", post(pause))
        .route("/registration/resume", post(resume))
        .route("/registration/cancel", post(cancel))
}
