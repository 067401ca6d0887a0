//! Outbound HTTP calls to federated peers, using the same `reqwest`
//! (rustls-tls) stack `revaer-app`/`revaer-cli` use for outbound HTTP.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use uuid::Uuid;

use crate::dto::{AnnounceRequest, AnnounceResponse, FederationLibrary, ResolveResponse};
use crate::error::{FederationError, FederationResult};

/// Timeout applied to library fetches during replicate (§4.7.4).
const LIBRARY_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Thin wrapper around a shared `reqwest::Client` for federation calls.
#[derive(Clone)]
pub struct FederationClient {
    http: Client,
}

impl Default for FederationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FederationClient {
    /// Builds a client with rustls TLS, no extra configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// Fetches `<url>/federation/library`. Used both for §4.7.1's probe
    /// (which additionally requires `instance_name` to be present) and for
    /// §4.7.2's proxying browse.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::InvalidKey`] on `401`,
    /// [`FederationError::NotAnAnimeDbInstance`] if the response is missing
    /// `instance_name`, or [`FederationError::Transport`]/[`FederationError::Decode`]
    /// on network/parse failure.
    pub async fn get_library(&self, url: &str, api_key: &str) -> FederationResult<FederationLibrary> {
        let endpoint = format!("{url}/federation/library");
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(api_key)
            .timeout(LIBRARY_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|source| FederationError::Transport {
                url: url.to_string(),
                source,
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(FederationError::InvalidKey { url: url.to_string() });
        }
        if !response.status().is_success() {
            return Err(FederationError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let library: FederationLibrary = response.json().await.map_err(|source| FederationError::Decode {
            url: url.to_string(),
            source,
        })?;
        if library.instance_name.trim().is_empty() {
            return Err(FederationError::NotAnAnimeDbInstance { url: url.to_string() });
        }
        Ok(library)
    }

    /// Opens a streaming GET to `<url>/federation/download/<remote_id>/stream`.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Transport`] on connection failure or
    /// [`FederationError::UnexpectedStatus`] on a non-2xx response.
    pub async fn open_download_stream(&self, url: &str, api_key: &str, remote_id: Uuid) -> FederationResult<reqwest::Response> {
        let endpoint = format!("{url}/federation/download/{remote_id}/stream");
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|source| FederationError::Transport {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FederationError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Posts `{instanceId, url}` to `<peer_url>/federation/announce` (§4.9).
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Transport`]/[`FederationError::Decode`] on failure.
    pub async fn announce(&self, peer_url: &str, api_key: &str, instance_id: Uuid, my_url: &str) -> FederationResult<AnnounceResponse> {
        let endpoint = format!("{peer_url}/federation/announce");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&AnnounceRequest {
                instance_id,
                url: my_url.to_string(),
            })
            .send()
            .await
            .map_err(|source| FederationError::Transport {
                url: peer_url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FederationError::UnexpectedStatus {
                url: peer_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(|source| FederationError::Decode {
            url: peer_url.to_string(),
            source,
        })
    }

    /// Calls `<other_url>/federation/resolve/<target_instance_id>` (§4.7.5's
    /// gossip substrate). `Ok(None)` on `404`.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Transport`]/[`FederationError::Decode`] on
    /// failure, or [`FederationError::UnexpectedStatus`] for any non-2xx,
    /// non-404 status.
    pub async fn resolve(&self, other_url: &str, api_key: &str, target_instance_id: Uuid) -> FederationResult<Option<ResolveResponse>> {
        let endpoint = format!("{other_url}/federation/resolve/{target_instance_id}");
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|source| FederationError::Transport {
                url: other_url.to_string(),
                source,
            })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FederationError::UnexpectedStatus {
                url: other_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let resolved = response.json().await.map_err(|source| FederationError::Decode {
            url: other_url.to_string(),
            source,
        })?;
        Ok(Some(resolved))
    }
}
