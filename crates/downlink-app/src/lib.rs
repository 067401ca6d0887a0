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

//! Downlink node bootstrap wiring.
//!
//! Layout: `config.rs` (environment config), `bootstrap.rs` (service wiring
//! and the serve loop), `error.rs` (application-level error type).

pub mod bootstrap;
pub mod config;
pub mod error;

pub use bootstrap::run_app;
pub use config::NodeConfig;
pub use error::{AppError, AppResult};
