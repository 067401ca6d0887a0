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

//! Embedded-store data access layer for downlink: migrations, row models, and
//! the `Store` handle every other crate persists through.

pub mod error;
pub mod model;
mod store;

pub use error::{DataError, Result as DataResult};
pub use model::{
    ApiKey, Category, Download, DownloadPatch, DownloadStatus, Library, LibraryPatch, NewDownload,
    NewLibrary, NewPeer, Peer, PeerPatch,
};
pub use store::{hash_raw_key, Store, MAX_RETRIES};
