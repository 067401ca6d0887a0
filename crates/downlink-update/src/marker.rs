//! The on-disk rollback marker: `{timestamp, attempts, backendBak, frontendBak}`.
//! Its presence after a restart means an update was applied; `attempts`
//! disambiguates a trial boot from a boot that never reached `listening`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{UpdateError, UpdateResult};

/// State written by [`crate::updater`] right before it exits the process, and
/// consumed by [`crate::rollback::check_rollback`] on the next startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackMarker {
    /// When the update that wrote this marker was applied.
    pub timestamp: DateTime<Utc>,
    /// `0` on the boot immediately following an update, `1` once that boot
    /// has been observed without reaching `listening`.
    pub attempts: u32,
    /// Where the previous backend `dist` was renamed to.
    pub backend_bak: PathBuf,
    /// Where the previous frontend `dist` was renamed to.
    pub frontend_bak: PathBuf,
}

/// Reads the marker at `path`.
///
/// Returns `Ok(None)` if the file does not exist. A corrupt marker is
/// reported as [`UpdateError::CorruptMarker`] so the caller can delete it and
/// proceed, per §4.10's "corrupt marker → delete it; proceed" rule.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] on any failure reading the file other than
/// it being absent, or [`UpdateError::CorruptMarker`] if its contents are not
/// valid JSON for this shape.
pub async fn read_marker(path: &Path) -> UpdateResult<Option<RollbackMarker>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(UpdateError::Io {
                operation: "read_marker",
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let marker = serde_json::from_slice(&bytes).map_err(|source| UpdateError::CorruptMarker {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(marker))
}

/// Writes `marker` to `path` atomically: serialize to a sibling `.tmp` file,
/// then rename over the destination, matching the organizer's
/// write-then-rename idiom for surviving a crash mid-write.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] if the temp file cannot be written or renamed.
pub async fn write_marker(path: &Path, marker: &RollbackMarker) -> UpdateResult<()> {
    let json = serde_json::to_vec_pretty(marker).map_err(|source| UpdateError::CorruptMarker {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(|source| UpdateError::Io {
        operation: "write_marker.write_tmp",
        path: tmp_path.clone(),
        source,
    })?;
    tokio::fs::rename(&tmp_path, path).await.map_err(|source| UpdateError::Io {
        operation: "write_marker.rename",
        path: path.to_path_buf(),
        source,
    })
}

/// Deletes the marker at `path`, tolerating it already being absent.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] on any failure other than the file not existing.
pub async fn delete_marker(path: &Path) -> UpdateResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UpdateError::Io {
            operation: "delete_marker",
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_marker() -> RollbackMarker {
        RollbackMarker {
            timestamp: Utc::now(),
            attempts: 0,
            backend_bak: PathBuf::from("/opt/downlink/backend.bak"),
            frontend_bak: PathBuf::from("/opt/downlink/frontend.bak"),
        }
    }

    #[tokio::test]
    async fn read_marker_returns_none_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("marker.json");
        assert_eq!(read_marker(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("marker.json");
        let marker = sample_marker();

        write_marker(&path, &marker).await.unwrap();
        let read_back = read_marker(&path).await.unwrap();

        assert_eq!(read_back, Some(marker));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn read_marker_reports_corrupt_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("marker.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = read_marker(&path).await.unwrap_err();
        assert!(matches!(err, UpdateError::CorruptMarker { .. }));
    }

    #[tokio::test]
    async fn delete_marker_tolerates_absence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("marker.json");
        delete_marker(&path).await.unwrap();
    }
}
