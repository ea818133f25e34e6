//! SQLite-backed attachment store

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::services::attachment_store::{
    AttachmentStatus, AttachmentStore, AttachmentUpdate, NewAttachment,
};

const INACTIVE_STATUSES: &str = "('trash', 'auto-draft')";

/// Attachment store implementation over the local `attachments` table
#[derive(Clone)]
pub struct SqliteAttachmentStore {
    pool: SqlitePool,
    base_url: String,
}

impl SqliteAttachmentStore {
    pub fn new(pool: SqlitePool, base_url: &str) -> Self {
        Self {
            pool,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Change an attachment's lifecycle status (trash / restore)
    pub async fn set_status(&self, id: i64, status: AttachmentStatus) -> Result<()> {
        sqlx::query(
            "UPDATE attachments SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn relative_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rel| !rel.is_empty())
            .map(|rel| rel.to_string())
    }
}

/// `photos/a-300x200.jpg` resolves to `photos/a.jpg`: scaled-variant URLs
/// point at the original they were derived from.
fn strip_size_suffix(relative: &str) -> Option<String> {
    let (stem, ext) = relative.rsplit_once('.')?;
    let (base, suffix) = stem.rsplit_once('-')?;
    let (w, h) = suffix.split_once('x')?;
    if w.is_empty() || h.is_empty() {
        return None;
    }
    if !w.bytes().all(|b| b.is_ascii_digit()) || !h.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{base}.{ext}"))
}

#[async_trait]
impl AttachmentStore for SqliteAttachmentStore {
    async fn create(&self, new: NewAttachment) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO attachments (guid, relative_path, mime_type, title, status, file_hash)
            VALUES (?1, ?2, ?3, ?4, 'inherit', ?5)
            RETURNING id
            "#,
        )
        .bind(&new.guid)
        .bind(&new.relative_path)
        .bind(&new.mime_type)
        .bind(&new.title)
        .bind(&new.file_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_registration(&self, id: i64, update: AttachmentUpdate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE attachments SET
                relative_path = ?1,
                mime_type = ?2,
                title = ?3,
                file_hash = COALESCE(?4, file_hash),
                updated_at = datetime('now')
            WHERE id = ?5
            "#,
        )
        .bind(&update.relative_path)
        .bind(&update.mime_type)
        .bind(&update.title)
        .bind(&update.file_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("attachment {id} not found");
        }
        Ok(())
    }

    async fn resolve_url(&self, url: &str) -> Result<Option<i64>> {
        // Resolution is path-based: URLs outside the media base are unknown
        // here, and canonical-identifier lookups go through find_by_guid.
        let Some(relative) = self.relative_from_url(url) else {
            return Ok(None);
        };
        let variant = strip_size_suffix(&relative);

        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM attachments WHERE relative_path = ?1 OR relative_path = ?2 \
             ORDER BY id LIMIT 1",
        )
        .bind(&relative)
        .bind(variant.as_deref().unwrap_or(&relative))
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn status(&self, id: i64) -> Result<Option<AttachmentStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM attachments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(status.map(|s| AttachmentStatus::parse(&s)))
    }

    async fn attached_path(&self, id: i64) -> Result<Option<String>> {
        let path: Option<String> =
            sqlx::query_scalar("SELECT relative_path FROM attachments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(path)
    }

    async fn set_meta(&self, id: i64, key: &str, value: &str) -> Result<()> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT metadata FROM attachments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(raw) = raw else {
            anyhow::bail!("attachment {id} not found");
        };

        let mut meta: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).unwrap_or_default();
        meta.insert(
            key.to_string(),
            serde_json::Value::String(value.to_string()),
        );

        sqlx::query(
            "UPDATE attachments SET metadata = ?1, updated_at = datetime('now') WHERE id = ?2",
        )
        .bind(serde_json::to_string(&meta)?)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_meta(&self, id: i64, key: &str) -> Result<Option<String>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT metadata FROM attachments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(raw) = raw else { return Ok(None) };
        let meta: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).unwrap_or_default();

        Ok(meta
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    async fn find_active_by_path(&self, relative_path: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT id FROM attachments WHERE relative_path = ?1 \
             AND status NOT IN {INACTIVE_STATUSES} ORDER BY id LIMIT 1"
        ))
        .bind(relative_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_active_by_hash(&self, hash: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT id FROM attachments WHERE file_hash = ?1 \
             AND status NOT IN {INACTIVE_STATUSES} ORDER BY id LIMIT 1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_guid(&self, guid: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM attachments WHERE guid = ?1 ORDER BY id LIMIT 1",
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_candidates_by_basename(&self, basename: &str) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT id FROM attachments WHERE relative_path LIKE '%' || ?1 \
             AND status NOT IN {INACTIVE_STATUSES} ORDER BY id"
        ))
        .bind(basename)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
