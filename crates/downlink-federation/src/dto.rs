//! Wire shapes exchanged with federated peers (§4.6/§4.7). These mirror what
//! `downlink-api::http::federation` serves, so the client and server agree
//! on field names without sharing a crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use downlink_data::Category;

/// Response body of `GET /federation/library`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FederationLibrary {
    /// The peer's own instance id.
    pub instance_id: Uuid,
    /// The peer's display name, required by §4.7.1's probe check.
    pub instance_name: String,
    /// Completed, non-replicated items the peer exposes.
    pub items: Vec<FederationLibraryItem>,
}

/// One entry in a [`FederationLibrary`] response. Deliberately excludes
/// `file_path`, `url`, and `error` per §4.6's exclusion rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FederationLibraryItem {
    /// The peer's local id for this item.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Media classification.
    pub category: Category,
    /// Season number, TV only.
    pub season: Option<i64>,
    /// Episode number, TV only.
    pub episode: Option<i64>,
    /// Lifecycle status; always `completed` for items exposed by this endpoint.
    pub status: String,
    /// When the peer's row was created.
    pub created_at: DateTime<Utc>,
}

/// Request body of `POST /federation/announce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceRequest {
    /// This instance's id.
    pub instance_id: Uuid,
    /// This instance's externally reachable URL.
    pub url: String,
}

/// Response body of `POST /federation/announce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceResponse {
    /// Whether a matching local peer row was updated.
    pub updated: bool,
}

/// Response body of `GET /federation/resolve/{instanceId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// The resolved peer's instance id.
    pub instance_id: Uuid,
    /// The resolved peer's display name.
    pub name: String,
    /// The resolved peer's reachable URL.
    pub url: String,
    /// When the resolving node last heard from this peer.
    pub last_seen: Option<DateTime<Utc>>,
}
