//! Event payloads published on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monotonic id assigned to each published event, used for replay.
pub type EventId = u64;

/// Default number of events retained for replay when a subscriber attaches
/// with a `last_event_id`.
pub const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Every event the node can publish. Background workflows (Queue, NAT
/// manager, Federation Client, Peer-Sync Scheduler, Announce Dispatcher,
/// Self-Update) publish these instead of mutating shared state directly;
/// the HTTP layer and any future UI subscribe to render live status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new download was accepted into the queue.
    DownloadQueued {
        /// The download's id.
        download_id: Uuid,
        /// Source URL.
        url: String,
    },
    /// The queue worker picked up a download and began the subprocess.
    DownloadStarted {
        /// The download's id.
        download_id: Uuid,
    },
    /// Progress update parsed from the downloader subprocess or a streaming pull.
    DownloadProgress {
        /// The download's id.
        download_id: Uuid,
        /// Percent complete, `0..=100`.
        progress: u8,
    },
    /// A download finished successfully.
    DownloadCompleted {
        /// The download's id.
        download_id: Uuid,
        /// Absolute path of the resulting file.
        file_path: String,
    },
    /// A download failed, either terminally or before a retry demotion.
    DownloadFailed {
        /// The download's id.
        download_id: Uuid,
        /// Error message.
        error: String,
        /// Attempts made so far.
        attempts: u32,
    },
    /// A download was cancelled by the caller.
    DownloadCancelled {
        /// The download's id.
        download_id: Uuid,
    },
    /// A completed download's file was moved into, or back out of, a library.
    DownloadMoved {
        /// The download's id.
        download_id: Uuid,
        /// Destination library, if moving in; `None` on unmove.
        library_id: Option<Uuid>,
        /// New file path.
        file_path: String,
    },
    /// A peer announced its current address, and a local row was updated.
    PeerAnnounced {
        /// The local peer row that was updated.
        peer_id: Uuid,
        /// The peer's instance id.
        instance_id: Uuid,
        /// The peer's newly announced URL.
        url: String,
    },
    /// A peer's address was recovered via gossip resolve.
    PeerResolved {
        /// The local peer row that was updated.
        peer_id: Uuid,
        /// The third peer that answered the resolve query.
        via_peer_id: Uuid,
        /// The resolved URL.
        url: String,
    },
    /// The NAT/UPnP manager transitioned state.
    NatStateChanged {
        /// New state name: `idle`, `manual`, `mapping`, `active`, or `failed`.
        state: &'static str,
        /// Current external URL, if any.
        external_url: Option<String>,
    },
    /// Progress update for a single peer's replicate background loop.
    FederationReplicateProgress {
        /// The peer being replicated from.
        peer_id: Uuid,
        /// Items discovered in the peer's library.
        total: u32,
        /// Items newly enqueued this run.
        queued: u32,
        /// Items skipped because an equivalent local row already existed.
        skipped: u32,
        /// Items that have finished transferring so far.
        completed: u32,
    },
    /// The self-update/rollback state machine changed phase.
    UpdateStateChanged {
        /// New phase name, e.g. `trial_boot`, `rolled_back`, `cleaned_up`.
        phase: &'static str,
    },
    /// A configuration value changed.
    SettingsChanged {
        /// Human-readable description of what changed.
        description: String,
    },
    /// The set of degraded health components changed.
    HealthChanged {
        /// Currently degraded component names.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Stable, lowercase discriminator matching the `type` tag used on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DownloadQueued { .. } => "download_queued",
            Self::DownloadStarted { .. } => "download_started",
            Self::DownloadProgress { .. } => "download_progress",
            Self::DownloadCompleted { .. } => "download_completed",
            Self::DownloadFailed { .. } => "download_failed",
            Self::DownloadCancelled { .. } => "download_cancelled",
            Self::DownloadMoved { .. } => "download_moved",
            Self::PeerAnnounced { .. } => "peer_announced",
            Self::PeerResolved { .. } => "peer_resolved",
            Self::NatStateChanged { .. } => "nat_state_changed",
            Self::FederationReplicateProgress { .. } => "federation_replicate_progress",
            Self::UpdateStateChanged { .. } => "update_state_changed",
            Self::SettingsChanged { .. } => "settings_changed",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// An event paired with its assigned id and publish timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Monotonic id assigned at publish time.
    pub id: EventId,
    /// Wall-clock publish time.
    pub timestamp: DateTime<Utc>,
    /// The event itself.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_maps_download_variants() {
        assert_eq!(
            Event::DownloadQueued {
                download_id: Uuid::nil(),
                url: "https://youtube.com/watch?v=x".into(),
            }
            .kind(),
            "download_queued"
        );
        assert_eq!(
            Event::DownloadCompleted {
                download_id: Uuid::nil(),
                file_path: "/data/a.mkv".into(),
            }
            .kind(),
            "download_completed"
        );
    }

    #[test]
    fn event_kind_maps_federation_and_system_variants() {
        assert_eq!(
            Event::NatStateChanged {
                state: "active",
                external_url: Some("http://203.0.113.42:3000".into()),
            }
            .kind(),
            "nat_state_changed"
        );
        assert_eq!(
            Event::HealthChanged { degraded: vec![] }.kind(),
            "health_changed"
        );
    }

    #[test]
    fn envelope_carries_fields() {
        let envelope = EventEnvelope {
            id: 7,
            timestamp: Utc::now(),
            event: Event::DownloadStarted {
                download_id: Uuid::nil(),
            },
        };
        assert_eq!(envelope.id, 7);
        assert!(matches!(envelope.event, Event::DownloadStarted { .. }));
    }
}
