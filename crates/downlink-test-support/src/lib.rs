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
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Shared test fixtures used across downlink's integration suites.

pub mod fake_subprocess {
    //! Re-exported under a descriptive name; see [`crate::subprocess`].
    pub use crate::subprocess::{write_failure_script, write_success_script};
}

mod store;
mod subprocess;

pub use store::{temp_store, TempStore};
