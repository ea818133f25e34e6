//! Attachment store abstraction
//!
//! The content library the registration engine writes into is an external
//! collaborator; the core only depends on this trait. The production
//! implementation is [`SqliteAttachmentStore`](crate::db::SqliteAttachmentStore).

use anyhow::Result;
use async_trait::async_trait;

/// Lifecycle state of an attachment in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStatus {
    /// Live, visible attachment
    Active,
    /// Soft-deleted
    Trashed,
    /// Created but never completed
    Draft,
}

impl AttachmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentStatus::Active => "inherit",
            AttachmentStatus::Trashed => "trash",
            AttachmentStatus::Draft => "auto-draft",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "trash" => AttachmentStatus::Trashed,
            "auto-draft" => AttachmentStatus::Draft,
            _ => AttachmentStatus::Active,
        }
    }

    pub fn is_active(self) -> bool {
        self == AttachmentStatus::Active
    }
}

/// Input for creating a new attachment
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub guid: String,
    pub relative_path: String,
    pub mime_type: String,
    pub title: String,
    pub file_hash: Option<String>,
}

/// In-place update applied on recovery registration
#[derive(Debug, Clone)]
pub struct AttachmentUpdate {
    pub relative_path: String,
    pub mime_type: String,
    pub title: String,
    /// `None` leaves the stored hash untouched
    pub file_hash: Option<String>,
}

/// Operations the registration core needs from the content library.
///
/// Lookup methods named `find_active_*` must exclude trashed and draft
/// attachments; the remaining lookups return ids regardless of status and
/// callers check [`AttachmentStore::status`] themselves.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Insert a new attachment, returning its id
    async fn create(&self, new: NewAttachment) -> Result<i64>;

    /// Update path/type/title (and hash, when provided) of an existing attachment
    async fn update_registration(&self, id: i64, update: AttachmentUpdate) -> Result<()>;

    /// Map a public URL to an attachment id by its stored path. Scaled
    /// variant URLs (`photo-300x200.jpg`) resolve to their original.
    /// Canonical-identifier matching is [`AttachmentStore::find_by_guid`].
    async fn resolve_url(&self, url: &str) -> Result<Option<i64>>;

    /// Current lifecycle status, or `None` for an unknown id
    async fn status(&self, id: i64) -> Result<Option<AttachmentStatus>>;

    /// Stored relative path, or `None` for an unknown id
    async fn attached_path(&self, id: i64) -> Result<Option<String>>;

    /// Set one key in the attachment's opaque metadata blob
    async fn set_meta(&self, id: i64, key: &str, value: &str) -> Result<()>;

    /// Read one key from the attachment's opaque metadata blob
    async fn get_meta(&self, id: i64, key: &str) -> Result<Option<String>>;

    /// Exact stored-path lookup
    async fn find_active_by_path(&self, relative_path: &str) -> Result<Option<i64>>;

    /// Content-hash lookup
    async fn find_active_by_hash(&self, hash: &str) -> Result<Option<i64>>;

    /// Canonical-identifier lookup; status is not checked here
    async fn find_by_guid(&self, guid: &str) -> Result<Option<i64>>;

    /// Ids whose stored path ends with the given basename. May over-match on
    /// substring containment; callers must re-check the basename exactly.
    async fn find_candidates_by_basename(&self, basename: &str) -> Result<Vec<i64>>;
}
