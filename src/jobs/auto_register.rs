//! Scheduled auto-registration
//!
//! Picks up files that have never appeared in the registration history and
//! registers them, up to a configured cap per invocation. Files already
//! attempted, whatever the outcome, are left alone so a problematic file
//! cannot be retried forever by the scheduler.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::db::Database;
use crate::services::enumerator::{FileEnumerator, ListOptions};
use crate::services::media_root::MediaRoot;
use crate::services::registrar::{RegistrationMode, RegistrationService};

pub async fn run(db: &Database, registrar: &Arc<RegistrationService>, root: &MediaRoot) -> Result<()> {
    let settings = db.settings();
    if !settings.auto_register_enabled().await? {
        return Ok(());
    }
    let limit = settings.auto_register_limit().await?;
    let directory = root.effective_dir(&settings.image_directory().await?);

    let files = match FileEnumerator.list(&directory, &ListOptions::default()) {
        Ok(files) => files,
        Err(e) => {
            warn!(directory = %directory.display(), error = %e, "Auto-registration skipped");
            return Ok(());
        }
    };
    if files.is_empty() {
        return Ok(());
    }

    let seen: HashSet<String> = db.history().distinct_filenames().await?.into_iter().collect();
    let fresh: Vec<String> = files
        .into_iter()
        .filter(|f| !seen.contains(f))
        .take(limit as usize)
        .collect();
    if fresh.is_empty() {
        return Ok(());
    }

    let mut registered = 0usize;
    let mut skipped = 0usize;
    let mut errors = 0usize;
    for filename in &fresh {
        match registrar
            .register_one(&directory, filename, RegistrationMode::Normal)
            .await
        {
            Ok(outcome) => match outcome.status {
                crate::services::registrar::RegistrationStatus::Registered => registered += 1,
                crate::services::registrar::RegistrationStatus::Skipped => skipped += 1,
            },
            Err(e) => {
                warn!(file = %filename, error = %e, "Auto-registration failed for file");
                errors += 1;
            }
        }
    }

    info!(
        directory = %directory.display(),
        registered,
        skipped,
        errors,
        "Auto-registration pass finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test;
    use crate::services::attachment_store::AttachmentStore;
    use std::fs;

    const BASE_URL: &str = "http://example.test/media";

    struct Fixture {
        db: Database,
        registrar: Arc<RegistrationService>,
        root: MediaRoot,
        tmp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let db = connect_test().await;
        let tmp = tempfile::tempdir().unwrap();
        let root = MediaRoot::new(tmp.path(), BASE_URL);
        let store: Arc<dyn AttachmentStore> = Arc::new(db.attachments(BASE_URL));
        let registrar = Arc::new(RegistrationService::new(
            store,
            db.history(),
            root.clone(),
        ));
        Fixture {
            db,
            registrar,
            root,
            tmp,
        }
    }

    #[tokio::test]
    async fn test_disabled_job_is_a_no_op() {
        let f = fixture().await;
        fs::write(f.tmp.path().join("a.jpg"), b"bytes").unwrap();

        run(&f.db, &f.registrar, &f.root).await.unwrap();
        assert_eq!(f.db.history().total_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_limit_caps_each_pass() {
        let f = fixture().await;
        let settings = f.db.settings();
        settings
            .set(crate::db::settings::KEY_AUTO_REGISTER_ENABLED, true)
            .await
            .unwrap();
        settings
            .set(crate::db::settings::KEY_AUTO_REGISTER_LIMIT, 2i64)
            .await
            .unwrap();

        for i in 0..4 {
            fs::write(f.tmp.path().join(format!("img-{i}.jpg")), format!("b{i}")).unwrap();
        }

        run(&f.db, &f.registrar, &f.root).await.unwrap();
        assert_eq!(f.db.history().total_count().await.unwrap(), 2);

        run(&f.db, &f.registrar, &f.root).await.unwrap();
        assert_eq!(f.db.history().total_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_audited_files_are_never_reprocessed() {
        let f = fixture().await;
        let settings = f.db.settings();
        settings
            .set(crate::db::settings::KEY_AUTO_REGISTER_ENABLED, true)
            .await
            .unwrap();

        fs::write(f.tmp.path().join("a.jpg"), b"bytes").unwrap();

        run(&f.db, &f.registrar, &f.root).await.unwrap();
        run(&f.db, &f.registrar, &f.root).await.unwrap();

        // second pass sees a.jpg in history and leaves it alone
        assert_eq!(f.db.history().total_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_is_tolerated() {
        let f = fixture().await;
        let settings = f.db.settings();
        settings
            .set(crate::db::settings::KEY_AUTO_REGISTER_ENABLED, true)
            .await
            .unwrap();
        settings
            .set(crate::db::settings::KEY_IMAGE_DIRECTORY, "nonexistent")
            .await
            .unwrap();

        run(&f.db, &f.registrar, &f.root).await.unwrap();
        assert_eq!(f.db.history().total_count().await.unwrap(), 0);
    }
}
