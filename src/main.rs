//! Curator - image registration service
//!
//! Watches a media directory, registers image files as attachments with
//! layered duplicate detection, and keeps an append-only audit trail of
//! every registration attempt. Batch runs are driven over the REST API;
//! a scheduled job picks up new files automatically.

mod api;
mod config;
mod db;
mod jobs;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::{AttachmentStore, BatchDriver, MediaRoot, RegistrationService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub root: MediaRoot,
    pub driver: Arc<BatchDriver>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Curator");

    let db = Database::connect(&config.database_url).await?;
    db.init_schema().await?;
    tracing::info!("Database connected");

    let root = MediaRoot::new(&config.media_path, &config.media_base_url);
    let store: Arc<dyn AttachmentStore> = Arc::new(db.attachments(root.base_url()));
    let registrar = Arc::new(RegistrationService::new(
        store,
        db.history(),
        root.clone(),
    ));
    let driver = Arc::new(BatchDriver::new(registrar.clone(), db.history()));

    let _scheduler = jobs::start_scheduler(db.clone(), registrar.clone(), root.clone()).await?;

    let state = AppState { db, root, driver };

    let app = Router::new()
        .merge(api::health::router())
        .nest("/api", api::registration::router())
        .nest("/api", api::history::router())
        .nest("/api", api::settings::router())
        .nest("/api", api::stats::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
