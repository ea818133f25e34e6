//! Duplicate detection
//!
//! Before a file is registered, it is checked against the attachment store
//! with a fixed sequence of detection methods, from cheapest and most exact
//! to fuzziest. The first method that produces a live attachment wins.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::attachment_store::AttachmentStore;
use super::media_root::MediaRoot;

/// How a duplicate was identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ExactPath,
    Url,
    Hash,
    Guid,
    BasenameMetaExact,
}

impl DetectionMethod {
    /// Detection order. Path and URL matches identify the same logical file
    /// and come first; content hash catches renamed copies; guid and basename
    /// matching are last-resort heuristics.
    pub const PRIORITY: [DetectionMethod; 5] = [
        DetectionMethod::ExactPath,
        DetectionMethod::Url,
        DetectionMethod::Hash,
        DetectionMethod::Guid,
        DetectionMethod::BasenameMetaExact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::ExactPath => "exact_path",
            DetectionMethod::Url => "url",
            DetectionMethod::Hash => "hash",
            DetectionMethod::Guid => "guid",
            DetectionMethod::BasenameMetaExact => "basename_meta_exact",
        }
    }

    /// Whether a match by this method is safe to re-point at the file on
    /// disk. Only path- and URL-level matches are: they identify the same
    /// logical file, while hash/guid/basename matches may be a distinct copy.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DetectionMethod::ExactPath | DetectionMethod::Url)
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live attachment matching the file under consideration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateMatch {
    pub attachment_id: i64,
    pub method: DetectionMethod,
}

/// Runs the detection sequence against the attachment store
#[derive(Clone)]
pub struct DuplicateResolver {
    store: Arc<dyn AttachmentStore>,
    root: MediaRoot,
}

impl DuplicateResolver {
    pub fn new(store: Arc<dyn AttachmentStore>, root: MediaRoot) -> Self {
        Self { store, root }
    }

    /// Check `file_path` against every detection method in priority order,
    /// returning the first live match.
    pub async fn resolve(
        &self,
        file_path: &Path,
        filename: &str,
    ) -> Result<Option<DuplicateMatch>> {
        for method in DetectionMethod::PRIORITY {
            let attachment_id = match method {
                DetectionMethod::ExactPath => self.by_exact_path(file_path).await?,
                DetectionMethod::Url => self.by_url(file_path).await?,
                DetectionMethod::Hash => self.by_hash(file_path).await?,
                DetectionMethod::Guid => self.by_guid(file_path).await?,
                DetectionMethod::BasenameMetaExact => self.by_basename(filename).await?,
            };
            if let Some(attachment_id) = attachment_id {
                return Ok(Some(DuplicateMatch {
                    attachment_id,
                    method,
                }));
            }
        }

        Ok(None)
    }

    async fn by_exact_path(&self, file_path: &Path) -> Result<Option<i64>> {
        let relative = self.root.relative_path(file_path);
        self.store.find_active_by_path(&relative).await
    }

    async fn by_url(&self, file_path: &Path) -> Result<Option<i64>> {
        let url = self.root.url_for(file_path);
        let Some(id) = self.store.resolve_url(&url).await? else {
            return Ok(None);
        };
        self.only_active(id).await
    }

    async fn by_hash(&self, file_path: &Path) -> Result<Option<i64>> {
        let hash = content_hash(file_path).await?;
        self.store.find_active_by_hash(&hash).await
    }

    async fn by_guid(&self, file_path: &Path) -> Result<Option<i64>> {
        let url = self.root.url_for(file_path);
        let Some(id) = self.store.find_by_guid(&url).await? else {
            return Ok(None);
        };
        self.only_active(id).await
    }

    /// Basename candidates are a LIKE over-approximation, so each stored
    /// path's final component is re-checked for exact equality.
    async fn by_basename(&self, filename: &str) -> Result<Option<i64>> {
        for id in self.store.find_candidates_by_basename(filename).await? {
            let Some(path) = self.store.attached_path(id).await? else {
                continue;
            };
            let basename = Path::new(&path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&path);
            if basename == filename {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    async fn only_active(&self, id: i64) -> Result<Option<i64>> {
        let active = self
            .store
            .status(id)
            .await?
            .is_some_and(|s| s.is_active());
        Ok(active.then_some(id))
    }
}

/// MD5 hex digest of the file's contents
pub async fn content_hash(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(format!("{:x}", md5::compute(bytes)))
}
