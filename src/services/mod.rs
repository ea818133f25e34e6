//! Core registration services

pub mod attachment_store;
pub mod batch;
pub mod duplicates;
pub mod enumerator;
pub mod media_root;
pub mod registrar;

pub use attachment_store::{AttachmentStatus, AttachmentStore, AttachmentUpdate, NewAttachment};
pub use batch::{
    BatchDriver, BatchError, BatchSummary, OperationState, RunOptions, RunPhase,
    DEFAULT_BATCH_SIZE,
};
pub use duplicates::{DetectionMethod, DuplicateMatch, DuplicateResolver};
pub use enumerator::{FileEnumerator, ListOptions};
pub use media_root::MediaRoot;
pub use registrar::{
    RegistrationError, RegistrationMode, RegistrationOutcome, RegistrationService,
    RegistrationStatus,
};
