//! Probe-on-add (§4.7.1): the shared validation the manual-add and
//! connection-string-add flows both run before persisting a new [`Peer`].

use downlink_data::{NewPeer, Peer, Store};

use crate::client::FederationClient;
use crate::error::FederationResult;

/// Probes `url` with `api_key`, and on success inserts a new [`Peer`] row
/// carrying the instance id the peer reported.
///
/// # Errors
///
/// Returns [`crate::error::FederationError::InvalidKey`] on `401`,
/// [`crate::error::FederationError::NotAnAnimeDbInstance`] if the response
/// lacks `instance_name`, or a transport/store error.
pub async fn probe_and_register(store: &Store, client: &FederationClient, name: &str, url: &str, api_key: &str) -> FederationResult<Peer> {
    let url = url.trim_end_matches('/').to_string();
    let library = client.get_library(&url, api_key).await?;
    store
        .insert_peer(NewPeer {
            name: name.to_string(),
            url,
            api_key: api_key.to_string(),
            instance_id: Some(library.instance_id),
        })
        .await
        .map_err(|source| crate::error::FederationError::Store { source })
}
