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

//! NAT/UPnP reachability manager. Layout: `mapper.rs` (gateway client
//! boundary), `state.rs` (state machine), `manager.rs` (startup + renewal),
//! `error.rs` (error types).

pub mod error;
pub mod manager;
pub mod mapper;
pub mod state;

pub use error::{NatError, NatResult};
pub use manager::NatManager;
pub use mapper::{IgdPortMapper, PortMapper};
pub use state::NatState;
