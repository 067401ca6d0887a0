//! Row types for every table the Store manages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// `movies` / `tv` / `other` classification shared by libraries and downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Feature-length or standalone video.
    Movies,
    /// Episodic series content.
    Tv,
    /// Anything that doesn't fit the above.
    Other,
}

impl Category {
    /// Classifies a library name using the pattern table from the external interfaces section:
    /// movie/film -> movies, series/tv/show/anime/season -> tv, else other.
    #[must_use]
    pub fn detect(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("movie") || lower.contains("film") {
            Self::Movies
        } else if ["series", "tv", "show", "anime", "season"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            Self::Tv
        } else {
            Self::Other
        }
    }

    /// Directory name under a library root for this category.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Movies => "Movies",
            Self::Tv => "Series",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Movies => "movies",
            Self::Tv => "tv",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movies" => Ok(Self::Movies),
            "tv" => Ok(Self::Tv),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown category {other:?}")),
        }
    }
}

/// Lifecycle state of a [`Download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting for the queue worker.
    Queued,
    /// Actively being fetched.
    Downloading,
    /// Finished successfully.
    Completed,
    /// Finished with an error, retries exhausted.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown download status {other:?}")),
        }
    }
}

/// A local record of one media item, either directly downloaded or pulled from a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    /// Local primary key.
    pub id: Uuid,
    /// Source URL, or `federation://<peer>/<remote-id>` for replicated items.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Media classification.
    pub category: Category,
    /// Season number, TV only.
    pub season: Option<i64>,
    /// Episode number, TV only.
    pub episode: Option<i64>,
    /// Current lifecycle state.
    pub status: DownloadStatus,
    /// Percent complete, `0..=100`.
    pub progress: i64,
    /// Absolute path on disk once completed.
    pub file_path: Option<String>,
    /// Error message if the job failed.
    pub error: Option<String>,
    /// Whether the file has been moved into a library.
    pub moved_to_library: bool,
    /// Destination library, if moved.
    pub library_id: Option<Uuid>,
    /// Retry counter used by the queue.
    pub attempts: i64,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Download {
    /// True when `url` names a replicated item rather than an original download.
    #[must_use]
    pub fn is_federated(&self) -> bool {
        self.url.starts_with("federation://")
    }
}

/// A filesystem destination downloads can be organized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Absolute or media-root-relative destination path.
    pub path: String,
    /// Media classification.
    pub kind: Category,
    /// Opaque Plex library section identifier.
    pub plex_section_id: Option<i64>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// A credential minted for a peer to call this node's federation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Primary key.
    pub id: Uuid,
    /// Operator-supplied label.
    pub label: Option<String>,
    /// SHA-256 hex digest of the raw key. The raw key itself is never stored.
    pub key_hash: String,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// A remote node this instance trusts and can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    /// Primary key.
    pub id: Uuid,
    /// Operator-supplied name.
    pub name: String,
    /// Base URL, trailing slashes stripped.
    pub url: String,
    /// Raw API key used to call this peer.
    pub api_key: String,
    /// The peer's own instance id, captured at probe time.
    pub instance_id: Option<Uuid>,
    /// Whether the Peer-Sync Scheduler should auto-replicate this peer's library.
    pub auto_replicate: bool,
    /// Destination library for auto-replicate, if any.
    pub sync_library_id: Option<Uuid>,
    /// Last time we successfully reached or heard from this peer.
    pub last_seen: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a new [`Download`] row. `status` is always
/// `Queued` except when the federation pull/replicate flows insert a row that
/// starts life already `Downloading` (see §4.7.3).
#[derive(Debug, Clone)]
pub struct NewDownload {
    /// Explicit id, so callers (federation pull) can reference it before the row commits.
    pub id: Uuid,
    /// Source URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Media classification.
    pub category: Category,
    /// Season number, TV only.
    pub season: Option<i64>,
    /// Episode number, TV only.
    pub episode: Option<i64>,
    /// Initial lifecycle state.
    pub status: DownloadStatus,
}

/// Partial update applied to a [`Download`] row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct DownloadPatch {
    /// New category, if changing.
    pub category: Option<Category>,
    /// New title, if changing.
    pub title: Option<String>,
    /// New season, if changing.
    pub season: Option<Option<i64>>,
    /// New episode, if changing.
    pub episode: Option<Option<i64>>,
}

/// Fields required to insert a new [`Library`] row.
#[derive(Debug, Clone)]
pub struct NewLibrary {
    /// Display name.
    pub name: String,
    /// Absolute or media-root-relative destination path.
    pub path: String,
    /// Media classification.
    pub kind: Category,
    /// Opaque Plex library section identifier.
    pub plex_section_id: Option<i64>,
}

/// Partial update applied to a [`Library`] row.
#[derive(Debug, Clone, Default)]
pub struct LibraryPatch {
    /// New name, if changing.
    pub name: Option<String>,
    /// New path, if changing.
    pub path: Option<String>,
    /// New classification, if changing.
    pub kind: Option<Category>,
    /// New Plex section id, if changing.
    pub plex_section_id: Option<Option<i64>>,
}

/// Fields required to insert a new [`Peer`] row.
#[derive(Debug, Clone)]
pub struct NewPeer {
    /// Operator-supplied name.
    pub name: String,
    /// Base URL; trailing slashes are stripped by the caller via [`normalize_peer_url`].
    pub url: String,
    /// Raw API key used to call this peer.
    pub api_key: String,
    /// The peer's own instance id, if captured during probe.
    pub instance_id: Option<Uuid>,
}

/// Partial update applied to a [`Peer`] row.
#[derive(Debug, Clone, Default)]
pub struct PeerPatch {
    /// New name, if changing.
    pub name: Option<String>,
    /// New url, if changing.
    pub url: Option<String>,
    /// New api key, if changing.
    pub api_key: Option<String>,
    /// New auto-replicate flag, if changing.
    pub auto_replicate: Option<bool>,
    /// New sync library target, if changing.
    pub sync_library_id: Option<Option<Uuid>>,
}

/// Strips a trailing slash from a peer or announce URL, per the invariant that
/// `Peer.url` never ends in `/`.
#[must_use]
pub fn normalize_peer_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_detects_from_name_patterns() {
        assert_eq!(Category::detect("Movie Collection"), Category::Movies);
        assert_eq!(Category::detect("My Anime"), Category::Tv);
        assert_eq!(Category::detect("Random Stuff"), Category::Other);
    }

    #[test]
    fn category_round_trips_through_string() {
        for category in [Category::Movies, Category::Tv, Category::Other] {
            let parsed: Category = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn download_status_round_trips_through_string() {
        for status in [
            DownloadStatus::Queued,
            DownloadStatus::Downloading,
            DownloadStatus::Completed,
            DownloadStatus::Failed,
            DownloadStatus::Cancelled,
        ] {
            let parsed: DownloadStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn normalize_peer_url_strips_all_trailing_slashes() {
        assert_eq!(normalize_peer_url("http://new:5000///"), "http://new:5000");
        assert_eq!(normalize_peer_url("http://new:5000"), "http://new:5000");
    }

    #[test]
    fn is_federated_detects_prefix() {
        let mut download = Download {
            id: Uuid::nil(),
            url: "https://youtube.com/watch?v=x".to_string(),
            title: "Ep1".to_string(),
            category: Category::Tv,
            season: None,
            episode: None,
            status: DownloadStatus::Queued,
            progress: 0,
            file_path: None,
            error: None,
            moved_to_library: false,
            library_id: None,
            attempts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!download.is_federated());
        download.url = "federation://peer.example/abc".to_string();
        assert!(download.is_federated());
    }
}
