//! # Design
//!
//! - Map transport/parse failures to constant messages; keep peer-identifying
//!   context (name, url) in fields so callers can log or surface it per-peer.

use std::io;
use std::path::PathBuf;

use downlink_data::DataError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for federation client operations.
pub type FederationResult<T> = Result<T, FederationError>;

/// Errors produced while talking to a federated peer, or while driving the
/// pull/replicate/resolve flows that call the Store on the client's behalf.
#[derive(Debug, Error)]
pub enum FederationError {
    /// The HTTP request to the peer could not be completed.
    #[error("federation request transport failure")]
    Transport {
        /// Peer url the request targeted.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The peer answered `401 Unauthorized`.
    #[error("federation peer rejected the api key")]
    InvalidKey {
        /// Peer url that rejected the key.
        url: String,
    },
    /// The peer's response did not look like an `AnimeDB` instance (§4.7.1).
    #[error("peer is not an AnimeDB instance")]
    NotAnAnimeDbInstance {
        /// Peer url that answered.
        url: String,
    },
    /// The peer answered with an unexpected status code.
    #[error("federation peer returned an unexpected status")]
    UnexpectedStatus {
        /// Peer url that answered.
        url: String,
        /// Status code returned.
        status: u16,
    },
    /// The peer's response body could not be decoded.
    #[error("federation response decode failure")]
    Decode {
        /// Peer url whose response failed to decode.
        url: String,
        /// Underlying decode error.
        source: reqwest::Error,
    },
    /// A completed local row with this id already exists (§4.7.3 step 1).
    #[error("item was already pulled")]
    AlreadyPulled {
        /// The remote item id that was already pulled.
        remote_id: Uuid,
    },
    /// The peer's library did not contain the requested item.
    #[error("remote item not found in peer library")]
    RemoteItemNotFound {
        /// The remote item id that was requested.
        remote_id: Uuid,
    },
    /// A Store operation failed while servicing a federation flow.
    #[error("store operation failed during federation flow")]
    Store {
        /// Underlying store error.
        #[source]
        source: DataError,
    },
    /// Gossip resolve was attempted against a peer with no captured instance id.
    #[error("peer has no captured instance id")]
    MissingInstanceId {
        /// The peer that lacks an instance id.
        peer_id: Uuid,
    },
    /// Gossip resolve asked every other peer and none answered.
    #[error("could not resolve peer via gossip")]
    UnresolvedPeer {
        /// The peer that could not be resolved.
        peer_id: Uuid,
    },
    /// The supplied library id does not name a known local library.
    #[error("library does not exist")]
    LibraryNotFound {
        /// The library id that was supplied.
        library_id: Uuid,
    },
    /// Writing a streamed transfer to disk failed.
    #[error("failed to write transferred file to disk")]
    Io {
        /// Destination path being written to.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}
