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

//! Media organizer: places completed downloads into library folders.
//! Layout: `model.rs` (placement types), `error.rs` (error types), `service.rs` (move/copy pipeline).

pub mod error;
pub mod model;
pub mod service;

pub use error::{OrganizerError, OrganizerResult};
pub use model::Placement;
pub use service::{destination_path, place_into_library, restore_to_staging, sanitize_component, season_episode_label};
