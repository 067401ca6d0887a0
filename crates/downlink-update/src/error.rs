//! Errors produced by the rollback marker state machine and the updater.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for this crate.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors surfaced by [`crate::marker`], [`crate::rollback`], and [`crate::updater`].
#[derive(Debug, Error)]
pub enum UpdateError {
    /// A filesystem operation on the marker, a `dist`, or a `.bak` directory failed.
    #[error("update io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The marker file's JSON could not be parsed; treated as corrupt, never fatal.
    #[error("rollback marker is corrupt")]
    CorruptMarker {
        /// Marker path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Another update is already running; `updateInProgress` rejects concurrent calls.
    #[error("update already in progress")]
    AlreadyInProgress,
    /// Fetching the update tarball failed.
    #[error("update tarball fetch failed")]
    Fetch {
        /// Source URL.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The fetched tarball did not unpack to the expected layout.
    #[error("update tarball unpack failed")]
    Unpack {
        /// Archive entry path implicated in the failure.
        entry: String,
    },
    /// The native build step exited non-zero.
    #[error("update build step failed")]
    BuildFailed {
        /// Command that was run.
        command: String,
        /// Process exit code, if the process ran at all.
        exit_code: Option<i32>,
    },
}
