//! Batch run driver
//!
//! A run is started once, snapshotting the candidate file list, and then
//! advanced in fixed-size batches. The caller holds the [`OperationState`]
//! between calls, which is what makes pause, resume and cancel cheap: they
//! are plain state transitions, and a paused run simply stops being fed to
//! [`BatchDriver::process_batch`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::db::history::HistoryRepository;

use super::enumerator::{FileEnumerator, ListOptions};
use super::registrar::{
    RegistrationError, RegistrationMode, RegistrationService, RegistrationStatus,
};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Lifecycle phase of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Running,
    Paused,
    Completed,
    Cancelled,
}

/// Complete state of one batch run, held by the caller between batches.
///
/// The file list is snapshotted when the run starts so the cursor stays
/// stable even when files are added or removed mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationState {
    pub phase: RunPhase,
    pub directory: PathBuf,
    pub files: Vec<String>,
    pub offset: usize,
    pub total: usize,
    pub registered: usize,
    pub skipped: usize,
    pub errors: usize,
    #[serde(default)]
    pub specific_file: Option<String>,
    #[serde(default)]
    pub process_skipped: bool,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("run is not in a runnable state")]
    NotRunning,
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OperationState {
    pub fn pause(&mut self) -> Result<(), BatchError> {
        if self.phase != RunPhase::Running {
            return Err(BatchError::NotRunning);
        }
        self.phase = RunPhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), BatchError> {
        if self.phase != RunPhase::Paused {
            return Err(BatchError::NotRunning);
        }
        self.phase = RunPhase::Running;
        Ok(())
    }

    /// Cancel is terminal and valid from any phase
    pub fn cancel(&mut self) {
        self.phase = RunPhase::Cancelled;
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, RunPhase::Completed | RunPhase::Cancelled)
    }
}

/// Options when starting a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restrict the run to a single file (exact filename, or stem)
    pub specific_file: Option<String>,
    /// Retry previously skipped files, forcing re-registration
    pub process_skipped: bool,
}

/// Result of one [`BatchDriver::process_batch`] call
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub registered: usize,
    pub skipped: usize,
    pub errors: usize,
    /// History rows written during this batch
    pub new_history_ids: Vec<i64>,
    pub is_done: bool,
}

/// Drives batch runs over the registration service
pub struct BatchDriver {
    enumerator: FileEnumerator,
    registrar: Arc<RegistrationService>,
    history: HistoryRepository,
}

impl BatchDriver {
    pub fn new(registrar: Arc<RegistrationService>, history: HistoryRepository) -> Self {
        Self {
            enumerator: FileEnumerator,
            registrar,
            history,
        }
    }

    /// Start a run over `directory`, snapshotting the candidate files
    pub async fn start(
        &self,
        directory: &Path,
        opts: RunOptions,
    ) -> Result<OperationState, BatchError> {
        let restrict_to = if opts.process_skipped {
            let skipped = self.history.skipped_filenames().await?;
            Some(skipped.into_iter().collect())
        } else {
            None
        };

        let files = self.enumerator.list(
            directory,
            &ListOptions {
                specific: opts.specific_file.clone(),
                restrict_to,
            },
        )?;
        let total = files.len();

        info!(
            directory = %directory.display(),
            total,
            process_skipped = opts.process_skipped,
            "Starting registration run"
        );

        Ok(OperationState {
            phase: RunPhase::Running,
            directory: directory.to_path_buf(),
            files,
            offset: 0,
            total,
            registered: 0,
            skipped: 0,
            errors: 0,
            specific_file: opts.specific_file,
            process_skipped: opts.process_skipped,
        })
    }

    /// Process the next batch of the run, advancing the cursor.
    ///
    /// Per-file failures are counted and the run continues; only a vanished
    /// directory aborts the whole run.
    pub async fn process_batch(
        &self,
        state: &mut OperationState,
        batch_size: usize,
    ) -> Result<BatchSummary, BatchError> {
        if state.phase != RunPhase::Running {
            return Err(BatchError::NotRunning);
        }
        if !state.directory.is_dir() {
            state.cancel();
            return Err(BatchError::Registration(
                RegistrationError::DirectoryNotFound {
                    path: state.directory.display().to_string(),
                },
            ));
        }

        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        // the state token comes from the client; never trust the cursor
        let start = state.offset.min(state.files.len());
        let end = (start + batch_size).min(state.files.len());
        let batch: Vec<String> = state.files[start..end].to_vec();

        let mode = if state.process_skipped {
            RegistrationMode::Force
        } else {
            RegistrationMode::Normal
        };

        let mut registered = 0;
        let mut skipped = 0;
        let mut errors = 0;
        let mut new_history_ids = Vec::with_capacity(batch.len());

        for filename in &batch {
            match self
                .registrar
                .register_one(&state.directory, filename, mode)
                .await
            {
                Ok(outcome) => {
                    new_history_ids.push(outcome.history_id);
                    match outcome.status {
                        RegistrationStatus::Registered => registered += 1,
                        RegistrationStatus::Skipped => skipped += 1,
                    }
                }
                Err(e) => {
                    error!(file = %filename, error = %e, "Registration failed");
                    errors += 1;
                }
            }
        }

        state.offset = end;
        state.registered += registered;
        state.skipped += skipped;
        state.errors += errors;

        // single-file runs are single-shot: one batch, then done
        if state.offset >= state.files.len() || state.specific_file.is_some() {
            state.phase = RunPhase::Completed;
            info!(
                registered = state.registered,
                skipped = state.skipped,
                errors = state.errors,
                "Registration run completed"
            );
        }

        Ok(BatchSummary {
            total: state.total,
            processed: state.offset,
            registered: state.registered,
            skipped: state.skipped,
            errors: state.errors,
            new_history_ids,
            is_done: state.is_done(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::db::connect_test;
    use crate::services::attachment_store::AttachmentStore;
    use crate::services::media_root::MediaRoot;
    use std::fs;

    const BASE_URL: &str = "http://example.test/media";

    struct Fixture {
        db: crate::db::Database,
        driver: BatchDriver,
        tmp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let db = connect_test().await;
        let tmp = tempfile::tempdir().unwrap();
        let root = MediaRoot::new(tmp.path(), BASE_URL);
        let store: Arc<dyn AttachmentStore> = Arc::new(db.attachments(BASE_URL));
        let registrar = Arc::new(RegistrationService::new(store, db.history(), root));
        let driver = BatchDriver::new(registrar, db.history());
        Fixture { db, driver, tmp }
    }

    fn seed_files(dir: &Path, count: usize) {
        for i in 0..count {
            fs::write(dir.join(format!("img-{i:02}.jpg")), format!("bytes {i}")).unwrap();
        }
    }

    #[tokio::test]
    async fn test_batch_advances_cursor_without_completing() {
        let f = fixture().await;
        seed_files(f.tmp.path(), 10);

        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(state.total, 10);

        let summary = f.driver.process_batch(&mut state, 3).await.unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.registered, 3);
        assert!(!summary.is_done);
        assert_eq!(state.phase, RunPhase::Running);
        assert_eq!(state.offset, 3);
    }

    #[tokio::test]
    async fn test_run_completes_over_multiple_batches() {
        let f = fixture().await;
        seed_files(f.tmp.path(), 7);

        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();

        let mut batches = 0;
        while !state.is_done() {
            f.driver.process_batch(&mut state, 3).await.unwrap();
            batches += 1;
        }

        assert_eq!(batches, 3);
        assert_eq!(state.phase, RunPhase::Completed);
        assert_eq!(state.registered, 7);
        assert_eq!(f.db.history().total_count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_specific_file_run_is_single_shot() {
        let f = fixture().await;
        seed_files(f.tmp.path(), 5);

        let mut state = f
            .driver
            .start(
                f.tmp.path(),
                RunOptions {
                    specific_file: Some("img-03.jpg".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.total, 1);

        let summary = f.driver.process_batch(&mut state, 10).await.unwrap();
        assert!(summary.is_done);
        assert_eq!(summary.registered, 1);

        let row = f
            .db
            .history()
            .get_by_id(summary.new_history_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.filename, "img-03.jpg");
    }

    #[tokio::test]
    async fn test_paused_run_rejects_batches_until_resumed() {
        let f = fixture().await;
        seed_files(f.tmp.path(), 4);

        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();
        state.pause().unwrap();

        assert_matches!(
            f.driver.process_batch(&mut state, 2).await,
            Err(BatchError::NotRunning)
        );

        state.resume().unwrap();
        let summary = f.driver.process_batch(&mut state, 2).await.unwrap();
        assert_eq!(summary.processed, 2);

        // double-resume and pause-after-complete are invalid transitions
        assert_matches!(state.resume(), Err(BatchError::NotRunning));
        f.driver.process_batch(&mut state, 10).await.unwrap();
        assert_matches!(state.pause(), Err(BatchError::NotRunning));
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let f = fixture().await;
        seed_files(f.tmp.path(), 4);

        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();
        state.cancel();

        assert!(state.is_done());
        assert_matches!(
            f.driver.process_batch(&mut state, 2).await,
            Err(BatchError::NotRunning)
        );
        assert_matches!(state.resume(), Err(BatchError::NotRunning));
    }

    #[tokio::test]
    async fn test_process_skipped_run_forces_recovery() {
        let f = fixture().await;
        fs::write(f.tmp.path().join("original.jpg"), b"same bytes").unwrap();
        fs::write(f.tmp.path().join("copy.jpg"), b"same bytes").unwrap();

        // first pass: copy.jpg skips as a hash duplicate
        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();
        f.driver.process_batch(&mut state, 10).await.unwrap();
        assert_eq!(state.skipped, 1);

        // retry pass only sees the skipped file and force-registers it
        let mut retry = f
            .driver
            .start(
                f.tmp.path(),
                RunOptions {
                    process_skipped: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(retry.total, 1);
        assert_eq!(retry.files, vec!["copy.jpg"]);

        let summary = f.driver.process_batch(&mut retry, 10).await.unwrap();
        assert_eq!(summary.registered, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_mixed_batch_counts_each_outcome() {
        let f = fixture().await;
        fs::write(f.tmp.path().join("old.jpg"), b"existing bytes").unwrap();

        // pre-register old.jpg so c.jpg becomes a hash duplicate of it
        let mut seed = f
            .driver
            .start(
                f.tmp.path(),
                RunOptions {
                    specific_file: Some("old.jpg".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.driver.process_batch(&mut seed, 10).await.unwrap();

        fs::write(f.tmp.path().join("a.jpg"), b"fresh bytes").unwrap();
        fs::write(f.tmp.path().join("c.jpg"), b"existing bytes").unwrap();
        // old.jpg itself re-registers via exact path
        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();
        let summary = f.driver.process_batch(&mut state, 10).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.registered, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 0);
        assert!(summary.is_done);
    }

    #[tokio::test]
    async fn test_cursor_past_end_of_snapshot_completes_cleanly() {
        let f = fixture().await;
        seed_files(f.tmp.path(), 3);

        let mut state = f
            .driver
            .start(f.tmp.path(), RunOptions::default())
            .await
            .unwrap();
        // a tampered or stale token may carry a cursor beyond the snapshot
        state.offset = 100;

        let summary = f.driver.process_batch(&mut state, 10).await.unwrap();
        assert!(summary.is_done);
        assert_eq!(summary.registered, 0);
        assert_eq!(summary.errors, 0);
        assert_eq!(state.offset, 3);
        assert_eq!(state.phase, RunPhase::Completed);
    }

    #[tokio::test]
    async fn test_vanished_directory_cancels_run() {
        let f = fixture().await;
        let dir = f.tmp.path().join("incoming");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a.jpg"), b"bytes").unwrap();

        let mut state = f.driver.start(&dir, RunOptions::default()).await.unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let result = f.driver.process_batch(&mut state, 10).await;
        assert_matches!(
            result,
            Err(BatchError::Registration(
                RegistrationError::DirectoryNotFound { .. }
            ))
        );
        assert_eq!(state.phase, RunPhase::Cancelled);
    }
}
