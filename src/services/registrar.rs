//! Single-file registration
//!
//! Registers one file into the attachment store and writes exactly one
//! audit row per attempt. Failures are audited best-effort before the
//! error propagates, so the history stays a faithful record of what was
//! attempted even when a run aborts.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::db::history::{CreateHistoryEntry, HistoryRepository, HistoryStatus};

use super::attachment_store::{AttachmentStore, AttachmentUpdate, NewAttachment};
use super::duplicates::{content_hash, DetectionMethod, DuplicateResolver};
use super::media_root::MediaRoot;

/// Metadata key carrying the byte size captured at registration time
pub const META_FILE_SIZE: &str = "file_size";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationMode {
    /// Skip non-recoverable duplicates
    #[default]
    Normal,
    /// Re-register even when the duplicate method is non-recoverable
    Force,
}

/// Outcome class of one registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub status: RegistrationStatus,
    pub history_id: i64,
    pub attachment_id: i64,
    /// Duplicate method that matched, when one did
    pub method: Option<DetectionMethod>,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: String },
    #[error("i/o error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("attachment store rejected {path}")]
    StoreWrite {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Registers individual files and records the outcome in history
pub struct RegistrationService {
    store: Arc<dyn AttachmentStore>,
    resolver: DuplicateResolver,
    history: HistoryRepository,
    root: MediaRoot,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn AttachmentStore>,
        history: HistoryRepository,
        root: MediaRoot,
    ) -> Self {
        let resolver = DuplicateResolver::new(store.clone(), root.clone());
        Self {
            store,
            resolver,
            history,
            root,
        }
    }

    /// Register the file `filename` inside `directory`.
    ///
    /// New files create an attachment. Duplicates via a recoverable method
    /// (or any method under [`RegistrationMode::Force`]) update the matched
    /// attachment in place; other duplicates are skipped. Every path through
    /// here, including errors, leaves a history row.
    pub async fn register_one(
        &self,
        directory: &Path,
        filename: &str,
        mode: RegistrationMode,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let path = directory.join(filename);
        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let file_size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len() as i64,
            Ok(_) => {
                self.record_error(filename, &path, &mime, 0, "File not found", "file_missing")
                    .await;
                return Err(RegistrationError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.record_error(filename, &path, &mime, 0, "File not found", "file_missing")
                    .await;
                return Err(RegistrationError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => {
                self.record_error(filename, &path, &mime, 0, "Failed to read file", "io")
                    .await;
                return Err(RegistrationError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();

        let duplicate = match self.resolver.resolve(&path, filename).await {
            Ok(d) => d,
            Err(e) => {
                self.record_error(
                    filename,
                    &path,
                    &mime,
                    file_size,
                    "Duplicate check failed",
                    "io",
                )
                .await;
                return Err(RegistrationError::Other(e));
            }
        };

        let entry = match duplicate {
            Some(m) if m.method.is_recoverable() || mode == RegistrationMode::Force => {
                let hash = content_hash(&path).await.ok();
                let update = AttachmentUpdate {
                    relative_path: self.root.relative_path(&path),
                    mime_type: mime.clone(),
                    title,
                    file_hash: hash,
                };
                if let Err(e) = self.store.update_registration(m.attachment_id, update).await {
                    self.record_error(
                        filename,
                        &path,
                        &mime,
                        file_size,
                        "Attachment store rejected the file",
                        "store_write",
                    )
                    .await;
                    return Err(RegistrationError::StoreWrite {
                        path: path.display().to_string(),
                        source: e,
                    });
                }
                self.attach_basic_meta(m.attachment_id, file_size).await;

                let detail = if mode == RegistrationMode::Force {
                    format!("skipped_recovery_{}", m.method)
                } else {
                    m.method.to_string()
                };
                CreateHistoryEntry {
                    filename: filename.to_string(),
                    file_path: path.display().to_string(),
                    file_size,
                    file_type: mime,
                    status: HistoryStatus::Registered,
                    attachment_id: Some(m.attachment_id),
                    reason: "Updated existing attachment".to_string(),
                    reason_detail: detail,
                }
            }
            Some(m) => CreateHistoryEntry {
                filename: filename.to_string(),
                file_path: path.display().to_string(),
                file_size,
                file_type: mime,
                status: HistoryStatus::Skipped,
                attachment_id: Some(m.attachment_id),
                reason: "Duplicate detected".to_string(),
                reason_detail: m.method.to_string(),
            },
            None => {
                let hash = match content_hash(&path).await {
                    Ok(h) => h,
                    Err(e) => {
                        self.record_error(
                            filename,
                            &path,
                            &mime,
                            file_size,
                            "Failed to read file",
                            "io",
                        )
                        .await;
                        return Err(RegistrationError::Io {
                            path: path.display().to_string(),
                            source: e,
                        });
                    }
                };
                let new = NewAttachment {
                    guid: self.root.url_for(&path),
                    relative_path: self.root.relative_path(&path),
                    mime_type: mime.clone(),
                    title,
                    file_hash: Some(hash),
                };
                let attachment_id = match self.store.create(new).await {
                    Ok(id) => id,
                    Err(e) => {
                        self.record_error(
                            filename,
                            &path,
                            &mime,
                            file_size,
                            "Attachment store rejected the file",
                            "store_write",
                        )
                        .await;
                        return Err(RegistrationError::StoreWrite {
                            path: path.display().to_string(),
                            source: e,
                        });
                    }
                };
                self.attach_basic_meta(attachment_id, file_size).await;

                CreateHistoryEntry {
                    filename: filename.to_string(),
                    file_path: path.display().to_string(),
                    file_size,
                    file_type: mime,
                    status: HistoryStatus::Registered,
                    attachment_id: Some(attachment_id),
                    reason: "Successfully registered".to_string(),
                    reason_detail: "registration".to_string(),
                }
            }
        };

        let status = match entry.status {
            HistoryStatus::Skipped => RegistrationStatus::Skipped,
            _ => RegistrationStatus::Registered,
        };
        let attachment_id = entry.attachment_id.unwrap_or(0);
        let method = duplicate.map(|m| m.method);
        let history_id = self.history.insert(entry).await?;

        Ok(RegistrationOutcome {
            status,
            history_id,
            attachment_id,
            method,
        })
    }

    async fn attach_basic_meta(&self, attachment_id: i64, file_size: i64) {
        if let Err(e) = self
            .store
            .set_meta(attachment_id, META_FILE_SIZE, &file_size.to_string())
            .await
        {
            warn!(attachment_id, error = %e, "Failed to store file size metadata");
        }
    }

    /// Audit a failed attempt. History is best-effort here: a write failure
    /// is logged, not propagated, so it cannot mask the original error.
    async fn record_error(
        &self,
        filename: &str,
        path: &Path,
        mime: &str,
        file_size: i64,
        reason: &str,
        detail: &str,
    ) {
        let entry = CreateHistoryEntry {
            filename: filename.to_string(),
            file_path: path.display().to_string(),
            file_size,
            file_type: mime.to_string(),
            status: HistoryStatus::Error,
            attachment_id: None,
            reason: reason.to_string(),
            reason_detail: detail.to_string(),
        };
        if let Err(e) = self.history.insert(entry).await {
            warn!(file = %filename, error = %e, "Failed to record error in history");
        }
    }
}
