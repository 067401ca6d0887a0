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

//! Single-worker download queue. Layout: `catalog.rs` (in-memory progress
//! mirror), `worker.rs` (the FIFO loop and its handle).

pub mod catalog;
pub mod worker;

pub use catalog::{JobCatalog, JobSnapshot};
pub use worker::{spawn, QueueHandle};
