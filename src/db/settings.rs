//! Application settings database operations
//!
//! Run-level settings live in a JSON key/value table and are read at the
//! start of every batch run or scheduled job invocation, so changes take
//! effect without a restart.

use anyhow::Result;
use sqlx::SqlitePool;

pub const KEY_IMAGE_DIRECTORY: &str = "image_directory";
pub const KEY_AUTO_REGISTER_ENABLED: &str = "auto_register_enabled";
pub const KEY_AUTO_REGISTER_LIMIT: &str = "auto_register_limit";

/// Default per-run file limit for the scheduled auto-registration job
pub const DEFAULT_AUTO_REGISTER_LIMIT: i64 = 50;

/// Settings repository for database operations
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a setting value as a specific type
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Get a setting value with a default
    pub async fn get_or_default<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T> {
        match self.get_value(key).await? {
            Some(v) => Ok(v),
            None => Ok(default),
        }
    }

    /// Set a setting value
    pub async fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json = serde_json::to_string(&value)?;

        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT (key) DO UPDATE SET
                value = ?2,
                updated_at = datetime('now')
            "#,
        )
        .bind(key)
        .bind(&json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Directory override relative to the media root; empty means the root itself
    pub async fn image_directory(&self) -> Result<String> {
        self.get_or_default(KEY_IMAGE_DIRECTORY, String::new()).await
    }

    /// Whether the scheduled auto-registration job is enabled
    pub async fn auto_register_enabled(&self) -> Result<bool> {
        self.get_or_default(KEY_AUTO_REGISTER_ENABLED, false).await
    }

    /// Maximum number of new files the scheduled job processes per pass
    pub async fn auto_register_limit(&self) -> Result<i64> {
        let limit = self
            .get_or_default(KEY_AUTO_REGISTER_LIMIT, DEFAULT_AUTO_REGISTER_LIMIT)
            .await?;
        Ok(limit.max(1))
    }
}
