//! # Design
//!
//! - Keep error messages constant; carry context in fields.
//! - Give `CANCELLED` its own variant so callers can match it without
//!   string comparison, per §4.4's cancellation sentinel.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for downloader operations.
pub type DownloaderResult<T> = Result<T, DownloaderError>;

/// Errors produced while running the external download tool.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// Failed to spawn the external tool process.
    #[error("failed to spawn download tool")]
    Spawn {
        /// Path to the tool binary that failed to spawn.
        tool: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Failed to create or read the job directory.
    #[error("job directory io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The tool exited non-zero; `stderr` is the captured error text.
    #[error("download tool exited with failure")]
    ToolFailed {
        /// Identifier of the job that failed.
        job_id: String,
        /// Captured standard error output from the tool.
        stderr: String,
    },
    /// Exit was clean but no output file could be located in the job directory.
    #[error("download tool produced no output file")]
    NoOutputFile {
        /// Identifier of the job with no locatable output.
        job_id: String,
    },
    /// The job was cancelled by the caller before it finished.
    #[error("CANCELLED")]
    Cancelled {
        /// Identifier of the cancelled job.
        job_id: String,
    },
}

impl DownloaderError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_error_renders_sentinel_text() {
        let err = DownloaderError::Cancelled {
            job_id: "job-1".to_string(),
        };
        assert_eq!(err.to_string(), "CANCELLED");
    }

    #[test]
    fn tool_failed_carries_stderr() {
        let err = DownloaderError::ToolFailed {
            job_id: "job-1".to_string(),
            stderr: "network unreachable".to_string(),
        };
        assert!(matches!(err, DownloaderError::ToolFailed { stderr, .. } if stderr == "network unreachable"));
    }
}
