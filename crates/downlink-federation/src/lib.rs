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
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Federation: talking to other `downlink` instances as peers.
//!
//! Layout: `client.rs` (outbound HTTP), `dto.rs` (wire shapes), `probe.rs`
//! (§4.7.1), `connect.rs` (§4.7.6), `pull.rs` (§4.7.3), `replicate.rs`
//! (§4.7.4), `gossip.rs` (§4.7.5), `scheduler.rs` (§4.8), `announce.rs`
//! (§4.9).

pub mod announce;
pub mod client;
pub mod connect;
pub mod dto;
pub mod error;
pub mod gossip;
pub mod pull;
pub mod probe;
pub mod replicate;
pub mod scheduler;

pub use client::FederationClient;
pub use connect::connect;
pub use dto::{AnnounceRequest, AnnounceResponse, FederationLibrary, FederationLibraryItem, ResolveResponse};
pub use error::{FederationError, FederationResult};
pub use gossip::{resolve_peer, ResolvedVia};
pub use probe::probe_and_register;
pub use pull::{begin_pull, run_transfer, PullOptions};
pub use replicate::{begin_replicate, process_queued_for_peer, ReplicateSummary};
pub use scheduler::PeerSyncScheduler;
