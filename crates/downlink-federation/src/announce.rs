//! Announce Dispatcher (§4.9): fire-and-forget broadcast of this instance's
//! reachable URL to every known peer, run after UPnP first produces a URL and
//! again whenever UPnP renewal changes the external IP.

use downlink_data::{Peer, Store};
use tracing::warn;
use uuid::Uuid;

use crate::client::FederationClient;

/// Spawns one detached `POST {instanceId, url}` to every peer's
/// `/federation/announce`, fire-and-forget. Failures are logged and
/// otherwise ignored — peers recover the address via gossip resolve on their
/// next contact.
pub async fn announce_to_all_peers(store: &Store, client: &FederationClient, instance_id: Uuid, my_url: &str) {
    let peers = match store.list_peers().await {
        Ok(peers) => peers,
        Err(err) => {
            warn!(error = %err, "failed to list peers for announce");
            return;
        }
    };

    for peer in peers {
        let store = store.clone();
        let client = client.clone();
        let my_url = my_url.to_string();
        tokio::spawn(async move { announce_one(&store, &client, peer, instance_id, &my_url).await });
    }
}

async fn announce_one(store: &Store, client: &FederationClient, peer: Peer, instance_id: Uuid, my_url: &str) {
    match client.announce(&peer.url, &peer.api_key, instance_id, my_url).await {
        Ok(_response) => {
            if let Err(err) = store.touch_peer_seen(peer.id).await {
                warn!(error = %err, peer = %peer.name, "failed to record announce success");
            }
        }
        Err(err) => warn!(error = %err, peer = %peer.name, "announce failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn announce_to_all_peers_tolerates_an_empty_peer_list() {
        let fixture = downlink_test_support::temp_store().await;
        let client = FederationClient::new();
        announce_to_all_peers(&fixture.store, &client, Uuid::new_v4(), "http://me:3000").await;
    }
}
