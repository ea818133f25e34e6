//! Registration history database operations
//!
//! The history table is the append-only audit trail: one row per processed
//! file per batch or job invocation. Rows are never updated; the only bulk
//! mutation is the explicit clear-history operation.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;

/// Outcome recorded for one registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Registered,
    Skipped,
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Registered => "registered",
            HistoryStatus::Skipped => "skipped",
            HistoryStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A history record in the database
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryRecord {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub status: String,
    pub attachment_id: Option<i64>,
    pub reason: Option<String>,
    pub reason_detail: Option<String>,
    pub registered_date: NaiveDateTime,
}

/// Input for appending a new history entry
#[derive(Debug, Clone)]
pub struct CreateHistoryEntry {
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub status: HistoryStatus,
    pub attachment_id: Option<i64>,
    pub reason: String,
    pub reason_detail: String,
}

/// Filter options for querying history
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Free-text query matched case-insensitively across all columns
    pub query: Option<String>,
    /// Exact status filter (`registered` | `skipped` | `error`)
    pub status: Option<String>,
    /// Inclusive lower date bound (`YYYY-MM-DD`)
    pub date_from: Option<String>,
    /// Inclusive upper date bound (`YYYY-MM-DD`)
    pub date_to: Option<String>,
    pub attachment_id: Option<i64>,
}

/// Result for paginated history queries
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedHistory {
    pub rows: Vec<HistoryRecord>,
    pub total_records: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// History repository for database operations
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a new history entry, returning its id
    pub async fn insert(&self, entry: CreateHistoryEntry) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO registration_history
                (filename, file_path, file_size, file_type, status, attachment_id, reason, reason_detail)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id
            "#,
        )
        .bind(&entry.filename)
        .bind(&entry.file_path)
        .bind(entry.file_size)
        .bind(&entry.file_type)
        .bind(entry.status.as_str())
        .bind(entry.attachment_id)
        .bind(&entry.reason)
        .bind(&entry.reason_detail)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Get a single history entry by id
    pub async fn get_by_id(&self, id: i64) -> Result<Option<HistoryRecord>> {
        let record = sqlx::query_as::<_, HistoryRecord>(
            "SELECT * FROM registration_history WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Get history entries with filtering and pagination, newest first
    pub async fn list(
        &self,
        filter: HistoryFilter,
        page: i64,
        per_page: i64,
    ) -> Result<PaginatedHistory> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let offset = (page - 1) * per_page;

        // Normalize bound values up front so conditions and binds stay in sync
        let date_from = filter.date_from.filter(|d| !d.is_empty()).map(|d| {
            if d.len() == 10 { format!("{d} 00:00:00") } else { d }
        });
        let date_to = filter.date_to.filter(|d| !d.is_empty()).map(|d| {
            if d.len() == 10 { format!("{d} 23:59:59") } else { d }
        });
        let like = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{q}%"));
        let status = filter.status.filter(|s| !s.is_empty());

        let mut conditions: Vec<&str> = Vec::new();
        if status.is_some() {
            conditions.push("status = ?");
        }
        if date_from.is_some() {
            conditions.push("registered_date >= ?");
        }
        if date_to.is_some() {
            conditions.push("registered_date <= ?");
        }
        if filter.attachment_id.is_some() {
            conditions.push("attachment_id = ?");
        }
        if like.is_some() {
            conditions.push(
                "(CAST(id AS TEXT) LIKE ? OR filename LIKE ? OR file_path LIKE ? \
                 OR CAST(file_size AS TEXT) LIKE ? OR file_type LIKE ? OR status LIKE ? \
                 OR CAST(attachment_id AS TEXT) LIKE ? OR registered_date LIKE ? \
                 OR reason LIKE ? OR reason_detail LIKE ?)",
            );
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM registration_history {}", where_clause);
        let data_sql = format!(
            "SELECT * FROM registration_history {} ORDER BY registered_date DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref s) = status {
            count_query = count_query.bind(s);
        }
        if let Some(ref from) = date_from {
            count_query = count_query.bind(from);
        }
        if let Some(ref to) = date_to {
            count_query = count_query.bind(to);
        }
        if let Some(id) = filter.attachment_id {
            count_query = count_query.bind(id);
        }
        if let Some(ref like) = like {
            for _ in 0..10 {
                count_query = count_query.bind(like);
            }
        }
        let total_records = count_query.fetch_one(&self.pool).await?;

        let mut data_query = sqlx::query_as::<_, HistoryRecord>(&data_sql);
        if let Some(ref s) = status {
            data_query = data_query.bind(s);
        }
        if let Some(ref from) = date_from {
            data_query = data_query.bind(from);
        }
        if let Some(ref to) = date_to {
            data_query = data_query.bind(to);
        }
        if let Some(id) = filter.attachment_id {
            data_query = data_query.bind(id);
        }
        if let Some(ref like) = like {
            for _ in 0..10 {
                data_query = data_query.bind(like);
            }
        }
        let rows = data_query.bind(per_page).bind(offset).fetch_all(&self.pool).await?;

        Ok(PaginatedHistory {
            rows,
            total_records,
            total_pages: ((total_records + per_page - 1) / per_page).max(1),
            current_page: page,
        })
    }

    /// All filenames that have ever been attempted (any status)
    pub async fn distinct_filenames(&self) -> Result<Vec<String>> {
        let names =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT filename FROM registration_history")
                .fetch_all(&self.pool)
                .await?;

        Ok(names)
    }

    /// Filenames whose latest recorded outcome was a skip
    pub async fn skipped_filenames(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT filename FROM registration_history WHERE status = 'skipped'",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// Count entries with the given status
    pub async fn count_by_status(&self, status: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM registration_history WHERE status = ?1",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Total number of history entries
    pub async fn total_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registration_history")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Delete all history entries and reset the id sequence
    pub async fn truncate(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM registration_history")
            .execute(&self.pool)
            .await?;

        // Sequence reset only matters cosmetically; ignore if the sequence
        // table has no row for us yet
        let _ = sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'registration_history'")
            .execute(&self.pool)
            .await;

        Ok(result.rows_affected())
    }
}
