//! Connection-string add (§4.7.6): decodes `adb-connect:<base64 json>` into
//! the same `{name, url, key}` triple the manual-add flow takes, then defers
//! to [`crate::probe::probe_and_register`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use downlink_data::{Peer, Store};
use serde::Deserialize;

use crate::client::FederationClient;
use crate::error::{FederationError, FederationResult};
use crate::probe;

const CONNECT_PREFIX: &str = "adb-connect:";

#[derive(Debug, Deserialize)]
struct ConnectionPayload {
    url: String,
    name: String,
    key: String,
}

/// Malformed connection string, surfaced as a dedicated reject reason rather
/// than folding it into the transport-error variants.
#[derive(Debug, thiserror::Error)]
#[error("malformed connection string")]
pub struct MalformedConnectionString;

/// Decodes `connection_string`, rejecting empty fields, then runs the same
/// probe-and-register flow as a manual add.
///
/// # Errors
///
/// Returns [`FederationError::NotAnAnimeDbInstance`] if the string does not
/// decode to a well-formed `{url, name, key}` payload, or whatever
/// [`probe::probe_and_register`] returns once decoding succeeds.
pub async fn connect(store: &Store, client: &FederationClient, connection_string: &str) -> FederationResult<Peer> {
    let payload = decode_connection_string(connection_string).map_err(|_err| FederationError::NotAnAnimeDbInstance {
        url: connection_string.to_string(),
    })?;
    probe::probe_and_register(store, client, &payload.name, &payload.url, &payload.key).await
}

fn decode_connection_string(raw: &str) -> Result<ConnectionPayload, MalformedConnectionString> {
    let encoded = raw.strip_prefix(CONNECT_PREFIX).unwrap_or(raw);
    let decoded = BASE64.decode(encoded.trim()).map_err(|_err| MalformedConnectionString)?;
    let payload: ConnectionPayload = serde_json::from_slice(&decoded).map_err(|_err| MalformedConnectionString)?;
    if payload.url.trim().is_empty() || payload.name.trim().is_empty() || payload.key.trim().is_empty() {
        return Err(MalformedConnectionString);
    }
    Ok(ConnectionPayload {
        url: payload.url.trim_end_matches('/').to_string(),
        ..payload
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(url: &str, name: &str, key: &str) -> String {
        let json = serde_json::json!({ "url": url, "name": name, "key": key }).to_string();
        format!("adb-connect:{}", BASE64.encode(json))
    }

    #[test]
    fn decodes_a_well_formed_connection_string() {
        let raw = encode("http://peer:3000///", "node-b", "secret");
        let payload = decode_connection_string(&raw).unwrap();
        assert_eq!(payload.url, "http://peer:3000");
        assert_eq!(payload.name, "node-b");
        assert_eq!(payload.key, "secret");
    }

    #[test]
    fn accepts_the_string_without_the_prefix() {
        let raw = encode("http://peer:3000", "node-b", "secret");
        let without_prefix = raw.strip_prefix("adb-connect:").unwrap();
        assert!(decode_connection_string(without_prefix).is_ok());
    }

    #[test]
    fn rejects_empty_fields() {
        let raw = encode("", "node-b", "secret");
        assert!(decode_connection_string(&raw).is_err());
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(decode_connection_string("not base64 at all!!").is_err());
    }
}
