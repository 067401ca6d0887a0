//! # Design
//!
//! - Provide structured, constant-message errors for the move/copy pipeline.
//! - Capture operation context (paths, fields) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for media organizer operations.
pub type OrganizerResult<T> = Result<T, OrganizerError>;

/// Errors produced while moving or copying completed downloads into a library.
#[derive(Debug, Error)]
pub enum OrganizerError {
    /// IO failure while copying, moving, or creating directories.
    #[error("organizer io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The source file did not exist or was not a regular file.
    #[error("organizer source file missing")]
    MissingSource {
        /// Path that was expected to exist.
        path: PathBuf,
    },
    /// The source path had no file extension to preserve.
    #[error("organizer source file has no extension")]
    MissingExtension {
        /// Path that lacked an extension.
        path: PathBuf,
    },
}

impl OrganizerError {
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
    use std::error::Error;
    use std::io;

    #[test]
    fn organizer_error_helpers_build_variants() {
        let io_err = OrganizerError::io("copy", "path", io::Error::other("boom"));
        assert!(matches!(io_err, OrganizerError::Io { .. }));
        assert!(io_err.source().is_some());

        let missing = OrganizerError::MissingSource {
            path: "missing.mkv".into(),
        };
        assert!(missing.source().is_none());
        assert_eq!(missing.to_string(), "organizer source file missing");

        let no_ext = OrganizerError::MissingExtension {
            path: "no-extension".into(),
        };
        assert_eq!(no_ext.to_string(), "organizer source file has no extension");
    }
}
