//! `POST /system/update` (§4.10): single-flight background fetch, unpack,
//! build, and directory swap, ending in writing the rollback marker and
//! exiting the process for the supervisor to restart.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use downlink_events::{Event, EventBus};
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{info, warn};

use crate::error::{UpdateError, UpdateResult};
use crate::marker::{self, RollbackMarker};

/// Filesystem and remote-source layout the updater operates on.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// URL of the `.tar.gz` release tarball to fetch.
    pub source_tarball_url: String,
    /// Scratch directory for the downloaded tarball and its unpacked contents.
    pub work_dir: PathBuf,
    /// Live backend `dist` directory, renamed to `<path>.bak` during an update.
    pub backend_dist: PathBuf,
    /// Live frontend `dist` directory, renamed to `<path>.bak` during an update.
    pub frontend_dist: PathBuf,
    /// Where the rollback marker is written.
    pub marker_path: PathBuf,
    /// File recording the currently running build's commit SHA.
    pub build_sha_path: PathBuf,
    /// Native build command run inside the unpacked tarball's root, e.g.
    /// `["cargo", "build", "--release"]`.
    pub build_command: Vec<String>,
}

/// Coordinates the single in-flight update permitted at a time.
#[derive(Clone)]
pub struct UpdateService {
    config: UpdateConfig,
    events: EventBus,
    in_progress: Arc<AtomicBool>,
}

impl UpdateService {
    /// Builds a service around `config`.
    #[must_use]
    pub fn new(config: UpdateConfig, events: EventBus) -> Self {
        Self { config, events, in_progress: Arc::new(AtomicBool::new(false)) }
    }

    /// Claims the single-flight slot and spawns the update in the background.
    /// Returns as soon as the slot is claimed; the caller responds `200`
    /// immediately per §4.10, then the process exits once the swap completes.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::AlreadyInProgress`] if an update is already
    /// running, which the HTTP layer maps to `409`.
    pub fn begin_update(&self) -> UpdateResult<()> {
        if self.in_progress.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(UpdateError::AlreadyInProgress);
        }
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service.run().await {
                warn!(error = %err, "self-update failed");
                service.publish("failed");
                service.in_progress.store(false, Ordering::SeqCst);
            }
            // On success `run` never returns: it calls `std::process::exit`.
        });
        Ok(())
    }

    async fn run(&self) -> UpdateResult<()> {
        let config = &self.config;

        self.publish("fetching");
        tokio::fs::create_dir_all(&config.work_dir).await.map_err(|source| UpdateError::Io {
            operation: "run.create_work_dir",
            path: config.work_dir.clone(),
            source,
        })?;
        let tarball_path = config.work_dir.join("release.tar.gz");
        fetch_tarball(&config.source_tarball_url, &tarball_path).await?;

        self.publish("unpacking");
        let unpack_dir = config.work_dir.join("unpacked");
        if unpack_dir.exists() {
            tokio::fs::remove_dir_all(&unpack_dir).await.map_err(|source| UpdateError::Io {
                operation: "run.clear_unpack_dir",
                path: unpack_dir.clone(),
                source,
            })?;
        }
        let unpack_dir_for_blocking = unpack_dir.clone();
        let tarball_for_blocking = tarball_path.clone();
        tokio::task::spawn_blocking(move || extract_tarball(&tarball_for_blocking, &unpack_dir_for_blocking))
            .await
            .map_err(|_join_err| UpdateError::Unpack { entry: "join".to_string() })??;

        self.publish("building");
        run_build_command(&config.build_command, &unpack_dir).await?;

        self.publish("swapping");
        let backend_bak = backup_path(&config.backend_dist);
        let frontend_bak = backup_path(&config.frontend_dist);
        swap_into_place(&config.backend_dist, &backend_bak, &unpack_dir.join("backend")).await?;
        swap_into_place(&config.frontend_dist, &frontend_bak, &unpack_dir.join("frontend")).await?;

        let marker = RollbackMarker { timestamp: Utc::now(), attempts: 0, backend_bak, frontend_bak };
        marker::write_marker(&config.marker_path, &marker).await?;
        if let Some(sha) = read_build_sha(&unpack_dir).await {
            tokio::fs::write(&config.build_sha_path, sha).await.map_err(|source| UpdateError::Io {
                operation: "run.write_build_sha",
                path: config.build_sha_path.clone(),
                source,
            })?;
        }

        self.publish("restarting");
        info!("self-update complete, exiting for supervisor restart");
        std::process::exit(0);
    }

    fn publish(&self, phase: &'static str) {
        if self.events.send(Event::UpdateStateChanged { phase }).is_err() {
            warn!(phase, "failed to publish update phase event");
        }
    }
}

async fn fetch_tarball(url: &str, destination: &Path) -> UpdateResult<()> {
    let response = reqwest::get(url).await.map_err(|source| UpdateError::Fetch { url: url.to_string(), source })?;
    let bytes = response.error_for_status().map_err(|source| UpdateError::Fetch { url: url.to_string(), source })?.bytes().await.map_err(|source| {
        UpdateError::Fetch { url: url.to_string(), source }
    })?;
    tokio::fs::write(destination, &bytes).await.map_err(|source| UpdateError::Io {
        operation: "fetch_tarball.write",
        path: destination.to_path_buf(),
        source,
    })
}

/// Unpacks `archive_path` into `target`, rejecting any entry that would
/// escape `target` (absolute path or `..` component), matching the
/// teacher's `sanitize_archive_path` guard for zip extraction.
fn extract_tarball(archive_path: &Path, target: &Path) -> UpdateResult<()> {
    let file = std::fs::File::open(archive_path).map_err(|source| UpdateError::Io {
        operation: "extract_tarball.open",
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive.entries().map_err(|source| UpdateError::Io {
        operation: "extract_tarball.entries",
        path: archive_path.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|source| UpdateError::Io {
            operation: "extract_tarball.read_entry",
            path: archive_path.to_path_buf(),
            source,
        })?;
        let raw_path = entry.path().map_err(|source| UpdateError::Io {
            operation: "extract_tarball.entry_path",
            path: archive_path.to_path_buf(),
            source,
        })?;
        let sanitized = sanitize_archive_path(&raw_path)?;
        let destination = target.join(&sanitized);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|source| UpdateError::Io { operation: "extract_tarball.create_parent", path: parent.to_path_buf(), source })?;
        }
        entry.unpack(&destination).map_err(|source| UpdateError::Io {
            operation: "extract_tarball.unpack_entry",
            path: destination,
            source,
        })?;
    }
    Ok(())
}

fn sanitize_archive_path(entry: &Path) -> UpdateResult<PathBuf> {
    if entry.is_absolute() || entry.components().any(|component| matches!(component, std::path::Component::ParentDir)) {
        return Err(UpdateError::Unpack { entry: entry.to_string_lossy().into_owned() });
    }
    Ok(entry.to_path_buf())
}

async fn run_build_command(command: &[String], working_dir: &Path) -> UpdateResult<()> {
    let Some((program, args)) = command.split_first() else {
        return Ok(());
    };
    let status = tokio::process::Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .status()
        .await
        .map_err(|source| UpdateError::Io { operation: "run_build_command.spawn", path: working_dir.to_path_buf(), source })?;
    if status.success() {
        Ok(())
    } else {
        Err(UpdateError::BuildFailed { command: command.join(" "), exit_code: status.code() })
    }
}

fn backup_path(live_dir: &Path) -> PathBuf {
    let mut name = live_dir.file_name().map_or_else(|| "dist".into(), |name| name.to_os_string());
    name.push(".bak");
    live_dir.with_file_name(name)
}

/// Renames `live_dir` to `backup_dir` (clearing any stale previous backup
/// first), then moves `new_dir` into `live_dir`'s place. Falls back to
/// copy-then-remove on cross-filesystem renames, as `downlink-organizer`
/// does for library placement.
async fn swap_into_place(live_dir: &Path, backup_dir: &Path, new_dir: &Path) -> UpdateResult<()> {
    if backup_dir.exists() {
        tokio::fs::remove_dir_all(backup_dir).await.map_err(|source| UpdateError::Io { operation: "swap_into_place.clear_stale_backup", path: backup_dir.to_path_buf(), source })?;
    }
    if live_dir.exists() {
        rename_or_copy(live_dir, backup_dir).await?;
    }
    rename_or_copy(new_dir, live_dir).await
}

async fn rename_or_copy(source: &Path, destination: &Path) -> UpdateResult<()> {
    match tokio::fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(_) => copy_dir_recursive(source, destination).await,
    }
}

fn copy_dir_recursive<'a>(source: &'a Path, destination: &'a Path) -> std::pin::Pin<Box<dyn std::future::Future<Output = UpdateResult<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(destination).await.map_err(|source_err| UpdateError::Io { operation: "copy_dir_recursive.create_dir", path: destination.to_path_buf(), source: source_err })?;
        let mut entries = tokio::fs::read_dir(source).await.map_err(|source_err| UpdateError::Io { operation: "copy_dir_recursive.read_dir", path: source.to_path_buf(), source: source_err })?;
        while let Some(entry) = entries.next_entry().await.map_err(|source_err| UpdateError::Io { operation: "copy_dir_recursive.next_entry", path: source.to_path_buf(), source: source_err })? {
            let entry_destination = destination.join(entry.file_name());
            let file_type = entry.file_type().await.map_err(|source_err| UpdateError::Io { operation: "copy_dir_recursive.file_type", path: entry.path(), source: source_err })?;
            if file_type.is_dir() {
                copy_dir_recursive(&entry.path(), &entry_destination).await?;
            } else {
                tokio::fs::copy(entry.path(), &entry_destination).await.map_err(|source_err| UpdateError::Io { operation: "copy_dir_recursive.copy_file", path: entry.path(), source: source_err })?;
            }
        }
        tokio::fs::remove_dir_all(source).await.map_err(|source_err| UpdateError::Io { operation: "copy_dir_recursive.remove_source", path: source.to_path_buf(), source: source_err })
    })
}

async fn read_build_sha(unpack_dir: &Path) -> Option<String> {
    tokio::fs::read_to_string(unpack_dir.join("BUILD_SHA")).await.ok().map(|sha| sha.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_archive_path_rejects_absolute_and_parent_dir() {
        assert!(sanitize_archive_path(Path::new("/etc/passwd")).is_err());
        assert!(sanitize_archive_path(Path::new("../../escape")).is_err());
        assert!(sanitize_archive_path(Path::new("backend/bin/downlink")).is_ok());
    }

    #[test]
    fn backup_path_appends_bak_suffix() {
        assert_eq!(backup_path(Path::new("/opt/downlink/dist/backend")), PathBuf::from("/opt/downlink/dist/backend.bak"));
    }

    #[tokio::test]
    async fn run_build_command_empty_is_a_noop() {
        run_build_command(&[], Path::new("/tmp")).await.unwrap();
    }
}
