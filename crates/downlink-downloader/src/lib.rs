#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::multiple_crate_versions)]

//! Subprocess-based video download. Layout: `progress.rs` (stdout parsing),
//! `service.rs` (process lifecycle), `error.rs` (error types).

pub mod error;
pub mod progress;
pub mod service;

pub use error::{DownloaderError, DownloaderResult};
pub use progress::{parse_already_downloaded_line, parse_merger_line, parse_progress_line, ProgressUpdate};
pub use service::{DownloadOutcome, Downloader};
