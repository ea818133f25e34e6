//! Candidate file enumeration
//!
//! Lists the regular files of a single directory (no recursion). The batch
//! driver snapshots the returned list once per run, so the exact on-disk
//! ordering does not need to be stable across calls.

use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

use super::registrar::RegistrationError;

/// Listing restrictions for one enumeration call
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Single-file filter: with an extension it must match the filename
    /// exactly, without one it matches on the stem alone
    pub specific: Option<String>,
    /// Restrict to an explicit filename set (retry-skipped mode)
    pub restrict_to: Option<HashSet<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct FileEnumerator;

impl FileEnumerator {
    /// List candidate filenames in `directory`, applying `opts`
    pub fn list(
        &self,
        directory: &Path,
        opts: &ListOptions,
    ) -> Result<Vec<String>, RegistrationError> {
        if !directory.is_dir() {
            return Err(RegistrationError::DirectoryNotFound {
                path: directory.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(directory)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if let Some(set) = &opts.restrict_to
                && !set.contains(name)
            {
                continue;
            }
            if let Some(query) = &opts.specific
                && !matches_query(name, query)
            {
                continue;
            }
            files.push(name.to_string());
        }

        Ok(files)
    }

    /// Number of regular files in `directory`; 0 when it does not exist
    pub fn count(&self, directory: &Path) -> usize {
        self.list(directory, &ListOptions::default())
            .map(|files| files.len())
            .unwrap_or(0)
    }
}

/// Single-file query matching: `"image-1.jpg"` matches only that filename,
/// `"image-1"` matches any extension of that stem.
pub fn matches_query(filename: &str, query: &str) -> bool {
    if query.contains('.') {
        return filename == query;
    }
    Path::new(filename).file_stem().and_then(|s| s.to_str()) == Some(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;

    #[test]
    fn test_query_with_extension_matches_exactly() {
        assert!(matches_query("image-1.jpg", "image-1.jpg"));
        assert!(!matches_query("image-1.png", "image-1.jpg"));
        assert!(!matches_query("big_image-1.jpg", "image-1.jpg"));
    }

    #[test]
    fn test_query_without_extension_matches_stem() {
        assert!(matches_query("image-1.jpg", "image-1"));
        assert!(matches_query("image-1.png", "image-1"));
        assert!(!matches_query("image-10.jpg", "image-1"));
        assert!(!matches_query("image-1.backup.jpg", "image-1"));
    }

    #[test]
    fn test_list_excludes_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.jpg"), b"a").unwrap();
        fs::write(tmp.path().join("b.png"), b"b").unwrap();
        fs::create_dir(tmp.path().join("thumbs")).unwrap();
        fs::write(tmp.path().join("thumbs/nested.jpg"), b"n").unwrap();

        let mut files = FileEnumerator
            .list(tmp.path(), &ListOptions::default())
            .unwrap();
        files.sort();
        assert_eq!(files, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_list_with_specific_filter() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("image-1.jpg"), b"a").unwrap();
        fs::write(tmp.path().join("image-1.png"), b"b").unwrap();
        fs::write(tmp.path().join("other.jpg"), b"c").unwrap();

        let opts = ListOptions {
            specific: Some("image-1".to_string()),
            ..Default::default()
        };
        let mut files = FileEnumerator.list(tmp.path(), &opts).unwrap();
        files.sort();
        assert_eq!(files, vec!["image-1.jpg", "image-1.png"]);

        let opts = ListOptions {
            specific: Some("image-1.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(FileEnumerator.list(tmp.path(), &opts).unwrap(), vec!["image-1.jpg"]);
    }

    #[test]
    fn test_list_restricted_to_existing_set() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.jpg"), b"a").unwrap();
        fs::write(tmp.path().join("b.jpg"), b"b").unwrap();

        // "gone.jpg" was skipped once but no longer exists on disk
        let set: HashSet<String> = ["b.jpg".to_string(), "gone.jpg".to_string()].into();
        let opts = ListOptions {
            restrict_to: Some(set),
            ..Default::default()
        };
        assert_eq!(FileEnumerator.list(tmp.path(), &opts).unwrap(), vec!["b.jpg"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let result = FileEnumerator.list(Path::new("/nonexistent/curator"), &ListOptions::default());
        assert_matches!(result, Err(RegistrationError::DirectoryNotFound { .. }));
    }
}
