//! Gossip resolve (§4.7.5): recovers a peer's current URL by asking every
//! other known peer whether they have heard from it.

use downlink_data::{Peer, Store};

use crate::client::FederationClient;
use crate::error::{FederationError, FederationResult};

/// The peer that answered, and the updated target.
#[derive(Debug, Clone)]
pub struct ResolvedVia {
    /// The peer whose `/federation/resolve` call answered.
    pub via_peer: Peer,
    /// The target peer, with `url`/`last_seen` refreshed.
    pub target: Peer,
}

/// Asks every peer other than `target` for `target`'s current address,
/// stopping at the first `2xx` answer.
///
/// # Errors
///
/// Returns [`FederationError::MissingInstanceId`] if `target` never captured
/// an instance id, or [`FederationError::UnresolvedPeer`] if no other peer
/// answers.
pub async fn resolve_peer(store: &Store, client: &FederationClient, target: &Peer) -> FederationResult<ResolvedVia> {
    let target_instance_id = target.instance_id.ok_or(FederationError::MissingInstanceId { peer_id: target.id })?;

    let others = store.list_peers().await.map_err(|source| FederationError::Store { source })?;
    for other in others.into_iter().filter(|peer| peer.id != target.id) {
        let Ok(Some(resolved)) = client.resolve(&other.url, &other.api_key, target_instance_id).await else {
            continue;
        };
        store
            .update_peer(
                target.id,
                downlink_data::PeerPatch {
                    url: Some(resolved.url),
                    ..Default::default()
                },
            )
            .await
            .map_err(|source| FederationError::Store { source })?;
        store.touch_peer_seen(target.id).await.map_err(|source| FederationError::Store { source })?;
        let refreshed = store.require_peer(target.id).await.map_err(|source| FederationError::Store { source })?;
        return Ok(ResolvedVia { via_peer: other, target: refreshed });
    }

    Err(FederationError::UnresolvedPeer { peer_id: target.id })
}
