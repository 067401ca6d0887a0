//! Startup marker check and post-listen cleanup (§4.10, scenario S5). Must
//! run before the Store initializes — the caller (`downlink-app::bootstrap`)
//! is responsible for that ordering; this module only implements the
//! decision itself.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::UpdateResult;
use crate::marker::{self, RollbackMarker};

/// Outcome of [`check_rollback`], reported to the caller so it can log and,
/// for `RolledBack`, signal "restart with previous version" upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// No marker was present; this is an ordinary boot.
    Clean,
    /// A marker with `attempts == 0` was found and bumped to `1`; this boot
    /// is on trial. [`cleanup_after_successful_update`] must run once this
    /// boot reaches `listening`.
    FirstBoot,
    /// A marker with `attempts >= 1` was found: the previous boot never
    /// called [`cleanup_after_successful_update`], so the new build is
    /// presumed broken. The `.bak` directories have been restored over the
    /// live `dist`s and the marker deleted.
    RolledBack,
}

impl RollbackOutcome {
    /// Stable phase name used for [`downlink_events::Event::UpdateStateChanged`].
    #[must_use]
    pub const fn phase(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::FirstBoot => "first_boot",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// Runs the two-phase marker check described in §4.10.
///
/// - Absent marker → [`RollbackOutcome::Clean`], nothing touched.
/// - `attempts == 0` → rewritten to `attempts = 1`, [`RollbackOutcome::FirstBoot`].
/// - `attempts >= 1` → `backend_dir`/`frontend_dir` are deleted, the marker's
///   `backend_bak`/`frontend_bak` are renamed back over them, the marker is
///   deleted, [`RollbackOutcome::RolledBack`].
/// - Corrupt marker → deleted, treated as [`RollbackOutcome::Clean`].
///
/// # Errors
///
/// Returns [`crate::error::UpdateError::Io`] if a directory swap fails
/// partway through; the marker is left in place so a future boot can retry.
pub async fn check_rollback(marker_path: &Path, backend_dir: &Path, frontend_dir: &Path) -> UpdateResult<RollbackOutcome> {
    let marker = match marker::read_marker(marker_path).await {
        Ok(marker) => marker,
        Err(err) => {
            warn!(error = %err, path = %marker_path.display(), "rollback marker is corrupt, discarding");
            marker::delete_marker(marker_path).await?;
            return Ok(RollbackOutcome::Clean);
        }
    };

    let Some(marker) = marker else {
        return Ok(RollbackOutcome::Clean);
    };

    if marker.attempts == 0 {
        let retried = RollbackMarker { attempts: 1, ..marker };
        marker::write_marker(marker_path, &retried).await?;
        info!(path = %marker_path.display(), "update on trial boot");
        return Ok(RollbackOutcome::FirstBoot);
    }

    warn!(attempts = marker.attempts, "previous boot never reached listening, rolling back");
    restore_backup(backend_dir, &marker.backend_bak).await?;
    restore_backup(frontend_dir, &marker.frontend_bak).await?;
    marker::delete_marker(marker_path).await?;
    Ok(RollbackOutcome::RolledBack)
}

async fn restore_backup(live_dir: &Path, backup_dir: &Path) -> UpdateResult<()> {
    if live_dir.exists() {
        tokio::fs::remove_dir_all(live_dir).await.map_err(|source| crate::error::UpdateError::Io {
            operation: "restore_backup.remove_live",
            path: live_dir.to_path_buf(),
            source,
        })?;
    }
    tokio::fs::rename(backup_dir, live_dir).await.map_err(|source| crate::error::UpdateError::Io {
        operation: "restore_backup.rename",
        path: backup_dir.to_path_buf(),
        source,
    })
}

/// Called once after `listen()` succeeds: removes both `.bak` directories and
/// the marker. A crash before this runs leaves the marker in place with
/// `attempts == 1`, arming the rollback on the next boot.
///
/// # Errors
///
/// Returns [`crate::error::UpdateError::Io`] if either `.bak` directory or the
/// marker cannot be removed. Tolerates either already being absent.
pub async fn cleanup_after_successful_update(marker_path: &Path, backend_bak: &Path, frontend_bak: &Path) -> UpdateResult<()> {
    remove_dir_if_present(backend_bak).await?;
    remove_dir_if_present(frontend_bak).await?;
    marker::delete_marker(marker_path).await
}

async fn remove_dir_if_present(path: &Path) -> UpdateResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(crate::error::UpdateError::Io {
            operation: "remove_dir_if_present",
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn layout(root: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf, PathBuf) {
        (
            root.join("marker.json"),
            root.join("backend"),
            root.join("frontend"),
            root.join("backend.bak"),
            root.join("frontend.bak"),
        )
    }

    #[tokio::test]
    async fn clean_boot_when_marker_absent() {
        let dir = tempdir().unwrap();
        let (marker_path, backend, frontend, ..) = layout(dir.path());
        let outcome = check_rollback(&marker_path, &backend, &frontend).await.unwrap();
        assert_eq!(outcome, RollbackOutcome::Clean);
    }

    #[tokio::test]
    async fn first_boot_bumps_attempts_to_one() {
        let dir = tempdir().unwrap();
        let (marker_path, backend, frontend, backend_bak, frontend_bak) = layout(dir.path());
        marker::write_marker(
            &marker_path,
            &RollbackMarker { timestamp: Utc::now(), attempts: 0, backend_bak: backend_bak.clone(), frontend_bak: frontend_bak.clone() },
        )
        .await
        .unwrap();

        let outcome = check_rollback(&marker_path, &backend, &frontend).await.unwrap();
        assert_eq!(outcome, RollbackOutcome::FirstBoot);

        let reread = marker::read_marker(&marker_path).await.unwrap().unwrap();
        assert_eq!(reread.attempts, 1);
    }

    #[tokio::test]
    async fn second_boot_restores_backups_and_deletes_marker() {
        let dir = tempdir().unwrap();
        let (marker_path, backend, frontend, backend_bak, frontend_bak) = layout(dir.path());
        tokio::fs::create_dir_all(&backend).await.unwrap();
        tokio::fs::write(backend.join("new.txt"), b"new").await.unwrap();
        tokio::fs::create_dir_all(&backend_bak).await.unwrap();
        tokio::fs::write(backend_bak.join("old.txt"), b"old").await.unwrap();
        tokio::fs::create_dir_all(&frontend_bak).await.unwrap();
        marker::write_marker(
            &marker_path,
            &RollbackMarker { timestamp: Utc::now(), attempts: 1, backend_bak: backend_bak.clone(), frontend_bak: frontend_bak.clone() },
        )
        .await
        .unwrap();

        let outcome = check_rollback(&marker_path, &backend, &frontend).await.unwrap();

        assert_eq!(outcome, RollbackOutcome::RolledBack);
        assert!(backend.join("old.txt").exists());
        assert!(!backend.join("new.txt").exists());
        assert!(!backend_bak.exists());
        assert!(marker::read_marker(&marker_path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_marker_is_discarded_as_clean() {
        let dir = tempdir().unwrap();
        let (marker_path, backend, frontend, ..) = layout(dir.path());
        tokio::fs::write(&marker_path, b"{not json").await.unwrap();

        let outcome = check_rollback(&marker_path, &backend, &frontend).await.unwrap();

        assert_eq!(outcome, RollbackOutcome::Clean);
        assert!(!marker_path.exists());
    }

    #[tokio::test]
    async fn cleanup_removes_backups_and_marker() {
        let dir = tempdir().unwrap();
        let (marker_path, _backend, _frontend, backend_bak, frontend_bak) = layout(dir.path());
        tokio::fs::create_dir_all(&backend_bak).await.unwrap();
        tokio::fs::create_dir_all(&frontend_bak).await.unwrap();
        marker::write_marker(
            &marker_path,
            &RollbackMarker { timestamp: Utc::now(), attempts: 0, backend_bak: backend_bak.clone(), frontend_bak: frontend_bak.clone() },
        )
        .await
        .unwrap();

        cleanup_after_successful_update(&marker_path, &backend_bak, &frontend_bak).await.unwrap();

        assert!(!backend_bak.exists());
        assert!(!frontend_bak.exists());
        assert!(!marker_path.exists());
    }
}
