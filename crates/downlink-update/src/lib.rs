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

//! Self-Update & Rollback (§4.10): a two-phase marker-file state machine.
//!
//! [`rollback::check_rollback`] must run at every process startup, before the
//! Store initializes, to decide whether this boot is a trial boot following
//! an update or a rollback of one that never reached `listening`.
//! [`updater::UpdateService`] drives `POST /system/update`'s background
//! fetch/unpack/build/swap/exit flow that arms the marker in the first place.

pub mod error;
pub mod marker;
pub mod rollback;
pub mod updater;

pub use error::{UpdateError, UpdateResult};
pub use marker::RollbackMarker;
pub use rollback::{check_rollback, cleanup_after_successful_update, RollbackOutcome};
pub use updater::{UpdateConfig, UpdateService};
