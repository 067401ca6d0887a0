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

//! Shared HTTP DTOs for the downlink API.
//!
//! Views carry only what §6 says the wire shape exposes — a [`Peer`]'s
//! `api_key` never leaves this process, for instance. Conversions from
//! `downlink-data` row types live here so the mapping stays a single source
//! of truth.

use chrono::{DateTime, Utc};
use downlink_data::{ApiKey, Category, Download, DownloadPatch, Library, LibraryPatch, Peer, PeerPatch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
}

impl ProblemDetails {
    /// Builds a problem document for `status`, using a generic `about:blank`
    /// type URI (per RFC9457 §4.2) when no more specific one is known.
    #[must_use]
    pub fn new(status: u16, title: impl Into<String>, detail: Option<String>) -> Self {
        Self { kind: "about:blank".to_string(), title: title.into(), status, detail }
    }
}

/// Wire view of a [`Download`] row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadView {
    /// Primary key.
    pub id: Uuid,
    /// Source URL, or `federation://<peer>/<remote-id>` for replicated items.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Media classification.
    pub category: Category,
    /// Season number, TV only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<i64>,
    /// Episode number, TV only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<i64>,
    /// Current lifecycle state.
    pub status: downlink_data::DownloadStatus,
    /// Percent complete, `0..=100`.
    pub progress: i64,
    /// Absolute path on disk once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Error message if the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the file has been moved into a library.
    pub moved_to_library: bool,
    /// Destination library, if moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_id: Option<Uuid>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl From<Download> for DownloadView {
    fn from(download: Download) -> Self {
        Self {
            id: download.id,
            url: download.url,
            title: download.title,
            category: download.category,
            season: download.season,
            episode: download.episode,
            status: download.status,
            progress: download.progress,
            file_path: download.file_path,
            error: download.error,
            moved_to_library: download.moved_to_library,
            library_id: download.library_id,
            created_at: download.created_at,
            updated_at: download.updated_at,
        }
    }
}

/// `GET /downloads` list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadListResponse {
    /// Every matching download.
    pub downloads: Vec<DownloadView>,
}

/// `POST /downloads` request body.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DownloadCreateRequest {
    /// Source URL; the handler enforces the YouTube-host allowlist.
    pub url: String,
    /// Media classification; handler defaults to [`Category::Other`] if absent.
    #[serde(default)]
    pub category: Option<Category>,
    /// Display title; handler defaults to the URL if absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Season number, TV only.
    #[serde(default)]
    pub season: Option<i64>,
    /// Episode number, TV only.
    #[serde(default)]
    pub episode: Option<i64>,
}

/// `POST /downloads` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadCreateResponse {
    /// The newly queued download's id.
    pub id: Uuid,
    /// Always `"queued"`.
    pub status: &'static str,
}

/// `PATCH /downloads/{id}` request body; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DownloadPatchRequest {
    /// New category, if changing.
    #[serde(default)]
    pub category: Option<Category>,
    /// New title, if changing.
    #[serde(default)]
    pub title: Option<String>,
    /// New season, if changing. `Some(None)` clears it.
    #[serde(default)]
    pub season: Option<Option<i64>>,
    /// New episode, if changing. `Some(None)` clears it.
    #[serde(default)]
    pub episode: Option<Option<i64>>,
}

impl From<DownloadPatchRequest> for DownloadPatch {
    fn from(request: DownloadPatchRequest) -> Self {
        Self { category: request.category, title: request.title, season: request.season, episode: request.episode }
    }
}

/// `POST /downloads/{id}/move` request body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DownloadMoveRequest {
    /// Destination library; handler rejects if absent and none can be inferred.
    #[serde(default)]
    pub library_id: Option<Uuid>,
}

/// Wire view of a [`Library`] row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryView {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Absolute or media-root-relative destination path.
    pub path: String,
    /// Media classification.
    pub kind: Category,
    /// Opaque Plex library section identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plex_section_id: Option<i64>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl From<Library> for LibraryView {
    fn from(library: Library) -> Self {
        Self {
            id: library.id,
            name: library.name,
            path: library.path,
            kind: library.kind,
            plex_section_id: library.plex_section_id,
            created_at: library.created_at,
            updated_at: library.updated_at,
        }
    }
}

/// `GET /libraries` list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryListResponse {
    /// Every registered library.
    pub libraries: Vec<LibraryView>,
}

/// `POST /libraries` request body. `kind` is auto-detected from `name` via
/// [`Category::detect`] when absent.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LibraryCreateRequest {
    /// Display name.
    pub name: String,
    /// Absolute or media-root-relative destination path.
    pub path: String,
    /// Media classification override.
    #[serde(default)]
    pub kind: Option<Category>,
    /// Opaque Plex library section identifier.
    #[serde(default)]
    pub plex_section_id: Option<i64>,
}

/// `PATCH /libraries/{id}` request body; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LibraryPatchRequest {
    /// New name, if changing.
    #[serde(default)]
    pub name: Option<String>,
    /// New path, if changing.
    #[serde(default)]
    pub path: Option<String>,
    /// New classification, if changing.
    #[serde(default)]
    pub kind: Option<Category>,
    /// New Plex section id, if changing. `Some(None)` clears it.
    #[serde(default)]
    pub plex_section_id: Option<Option<i64>>,
}

impl From<LibraryPatchRequest> for LibraryPatch {
    fn from(request: LibraryPatchRequest) -> Self {
        Self { name: request.name, path: request.path, kind: request.kind, plex_section_id: request.plex_section_id }
    }
}

/// One unregistered subdirectory of the media root, surfaced by `GET /libraries/scan`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryScanEntry {
    /// Directory name.
    pub name: String,
    /// Absolute path.
    pub path: String,
    /// Classification [`Category::detect`] would assign if registered as-is.
    pub suggested_kind: Category,
}

/// `GET /libraries/scan` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryScanResponse {
    /// Media-root subdirectories not yet registered as a library.
    pub entries: Vec<LibraryScanEntry>,
}

/// Wire view of an [`ApiKey`] row. Never carries `key_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyView {
    /// Primary key.
    pub id: Uuid,
    /// Operator-supplied label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyView {
    fn from(key: ApiKey) -> Self {
        Self { id: key.id, label: key.label, created_at: key.created_at }
    }
}

/// `GET /keys` list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyListResponse {
    /// Every minted key, without raw key material.
    pub keys: Vec<ApiKeyView>,
}

/// `POST /keys` request body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ApiKeyCreateRequest {
    /// Operator-supplied label.
    #[serde(default)]
    pub label: Option<String>,
}

/// `POST /keys` response body. The raw key is returned exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyCreateResponse {
    /// Primary key.
    pub id: Uuid,
    /// Operator-supplied label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The raw key bytes, hex- or base64-encoded by the handler. Never stored.
    pub key: String,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// Wire view of a [`Peer`] row. Never carries `api_key` — that credential is
/// ours to call them with, not theirs to read back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerView {
    /// Primary key.
    pub id: Uuid,
    /// Operator-supplied name.
    pub name: String,
    /// Base URL, trailing slashes stripped.
    pub url: String,
    /// The peer's own instance id, captured at probe time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
    /// Whether the Peer-Sync Scheduler should auto-replicate this peer's library.
    pub auto_replicate: bool,
    /// Destination library for auto-replicate, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_library_id: Option<Uuid>,
    /// Last time we successfully reached or heard from this peer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Peer> for PeerView {
    fn from(peer: Peer) -> Self {
        Self {
            id: peer.id,
            name: peer.name,
            url: peer.url,
            instance_id: peer.instance_id,
            auto_replicate: peer.auto_replicate,
            sync_library_id: peer.sync_library_id,
            last_seen: peer.last_seen,
            created_at: peer.created_at,
        }
    }
}

/// `GET /peers` list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerListResponse {
    /// Every trusted peer.
    pub peers: Vec<PeerView>,
}

/// `POST /peers` request body.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PeerCreateRequest {
    /// Operator-supplied name.
    pub name: String,
    /// Base URL.
    pub url: String,
    /// Raw API key used to call this peer.
    pub api_key: String,
}

/// `PATCH /peers/{id}` request body; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PeerPatchRequest {
    /// New name, if changing.
    #[serde(default)]
    pub name: Option<String>,
    /// New url, if changing.
    #[serde(default)]
    pub url: Option<String>,
    /// New api key, if changing.
    #[serde(default)]
    pub api_key: Option<String>,
    /// New auto-replicate flag, if changing.
    #[serde(default)]
    pub auto_replicate: Option<bool>,
    /// New sync library target, if changing. `Some(None)` clears it.
    #[serde(default)]
    pub sync_library_id: Option<Option<Uuid>>,
}

impl From<PeerPatchRequest> for PeerPatch {
    fn from(request: PeerPatchRequest) -> Self {
        Self {
            name: request.name,
            url: request.url,
            api_key: request.api_key,
            auto_replicate: request.auto_replicate,
            sync_library_id: request.sync_library_id,
        }
    }
}

/// `POST /peers/connect` request body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PeerConnectRequest {
    /// `[adb-connect:]<base64(JSON{url,name,key})>`.
    pub connection_string: String,
}

/// `POST /peers/{id}/replicate` request body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ReplicateRequest {
    /// Destination library for auto-move; `None` disables auto-move.
    #[serde(default)]
    pub library_id: Option<Uuid>,
}

/// `POST /peers/{id}/replicate` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicateSummaryView {
    /// Items present in the peer's library.
    pub total: u32,
    /// Items newly enqueued this call.
    pub queued: u32,
    /// Items skipped because an equivalent local row already existed.
    pub skipped: u32,
}

/// `POST /peers/{id}/pull/{remoteId}` request body (§4.7.3).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// Run the Media Organizer move immediately after the transfer completes.
    #[serde(default)]
    pub auto_move: bool,
    /// Destination library for `auto_move`.
    #[serde(default)]
    pub library_id: Option<Uuid>,
}

/// `POST /downloads/{id}/pull` / `POST /peers/{id}/pull/{rid}` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullAcceptedResponse {
    /// The newly created local download's id.
    pub id: Uuid,
    /// Always `"downloading"`.
    pub status: &'static str,
}

/// `POST /federation/announce` / `POST /peers/{id}/resolve` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnounceAck {
    /// Whether a matching peer row was found and refreshed.
    pub updated: bool,
}

/// `GET /networking` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkingStateView {
    /// Whether a UPnP mapping is currently active.
    pub active: bool,
    /// Externally reachable URL, if any (manual override or UPnP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

/// `PUT /networking/external-url` request body. `url: null` clears the
/// manual override and falls back to the UPnP-discovered URL.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SetExternalUrlRequest {
    /// Manual override, or `None` to clear it.
    #[serde(default)]
    pub url: Option<String>,
}

/// `GET /system/update-check` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateCheckResponse {
    /// Commit SHA of the build currently running.
    pub current_sha: String,
    /// Commit SHA available upstream, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_sha: Option<String>,
    /// Whether `latest_sha` differs from `current_sha`.
    pub update_available: bool,
}

/// `GET /config` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicConfigView {
    /// Default container format new downloads are transcoded/muxed into.
    pub output_format: String,
    /// Whether a Plex server connection is configured.
    pub plex_connected: bool,
    /// Configured Plex server URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plex_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use downlink_data::DownloadStatus;

    fn sample_download() -> Download {
        Download {
            id: Uuid::nil(),
            url: "https://youtube.com/watch?v=x".to_string(),
            title: "Ep1".to_string(),
            category: Category::Tv,
            season: Some(1),
            episode: Some(2),
            status: DownloadStatus::Completed,
            progress: 100,
            file_path: Some("/data/ep1.mkv".to_string()),
            error: None,
            moved_to_library: false,
            library_id: None,
            attempts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn download_view_omits_queue_internal_attempts_field() {
        let view = DownloadView::from(sample_download());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("attempts").is_none());
    }

    #[test]
    fn download_view_drops_null_optional_fields() {
        let mut download = sample_download();
        download.file_path = None;
        download.error = None;
        let json = serde_json::to_value(DownloadView::from(download)).unwrap();
        assert!(!json.as_object().unwrap().contains_key("file_path"));
        assert!(!json.as_object().unwrap().contains_key("error"));
    }

    #[test]
    fn peer_view_never_carries_the_api_key() {
        let peer = Peer {
            id: Uuid::nil(),
            name: "friend".to_string(),
            url: "http://friend:3000".to_string(),
            api_key: "super-secret".to_string(),
            instance_id: None,
            auto_replicate: false,
            sync_library_id: None,
            last_seen: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(PeerView::from(peer)).unwrap();
        assert!(!json.as_object().unwrap().contains_key("api_key"));
    }
}
