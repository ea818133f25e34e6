//! Media root path and URL mapping
//!
//! Ties the media directory on disk to the public base URL it is served
//! from, so the same file can be identified by relative path or by URL.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct MediaRoot {
    base_dir: PathBuf,
    base_url: String,
}

impl MediaRoot {
    pub fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_dir: base_dir.into(),
            base_url,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Directory a run operates on: the root itself, or a subdirectory when
    /// an override is configured
    pub fn effective_dir(&self, override_subdir: &str) -> PathBuf {
        let sub = override_subdir.trim_matches('/');
        if sub.is_empty() {
            self.base_dir.clone()
        } else {
            self.base_dir.join(sub)
        }
    }

    /// Path relative to the media root, as stored on attachments. Falls back
    /// to the full path for files outside the root.
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Public URL for a file under the media root
    pub fn url_for(&self, path: &Path) -> String {
        format!("{}/{}", self.base_url, self.relative_path(path))
    }
}
