//! Database connection and operations

pub mod attachments;
pub mod history;
pub mod settings;

use std::str::FromStr;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use attachments::SqliteAttachmentStore;
pub use history::{
    CreateHistoryEntry, HistoryFilter, HistoryRecord, HistoryRepository, HistoryStatus,
    PaginatedHistory,
};
pub use settings::SettingsRepository;

/// Statements executed on startup; additive only, existing tables are left alone.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT NOT NULL,
        relative_path TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'inherit',
        file_hash TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attachments_relative_path ON attachments(relative_path)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_file_hash ON attachments(file_hash)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_guid ON attachments(guid)",
    r#"
    CREATE TABLE IF NOT EXISTS registration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        file_path TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        file_type TEXT NOT NULL,
        status TEXT NOT NULL,
        attachment_id INTEGER,
        reason TEXT,
        reason_detail TEXT,
        registered_date TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_history_filename ON registration_history(filename)",
    "CREATE INDEX IF NOT EXISTS idx_history_status ON registration_history(status)",
    "CREATE INDEX IF NOT EXISTS idx_history_registered_date ON registration_history(registered_date)",
    r#"
    CREATE TABLE IF NOT EXISTS app_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
];

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the maximum connection pool size from environment or default
    fn get_max_connections() -> u32 {
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5)
    }

    /// Create a new database connection pool, creating the file if missing
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(Self::get_max_connections())
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a registration history repository
    pub fn history(&self) -> HistoryRepository {
        HistoryRepository::new(self.pool.clone())
    }

    /// Get a settings repository
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Get the SQLite-backed attachment store
    pub fn attachments(&self, base_url: &str) -> SqliteAttachmentStore {
        SqliteAttachmentStore::new(self.pool.clone(), base_url)
    }

    /// Create tables and indexes that do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// In-memory database for tests; single connection so every query sees the
/// same memory file.
#[cfg(test)]
pub(crate) async fn connect_test() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    let db = Database::new(pool);
    db.init_schema().await.expect("schema init");
    db
}
