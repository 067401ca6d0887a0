//! API application state: wires the node's services behind a single
//! `Arc<ApiState>` handed to every handler via axum's `State` extractor.

use std::path::PathBuf;

use downlink_data::Store;
use downlink_events::EventBus;
use downlink_federation::FederationClient;
use downlink_nat::NatManager;
use downlink_queue::QueueHandle;
use downlink_telemetry::Metrics;
use downlink_update::UpdateService;
use uuid::Uuid;

/// Static, immutable configuration baked into [`ApiState`] at startup.
pub struct ApiStaticConfig {
    /// This node's stable identity, persisted across restarts by `downlink-app`'s
    /// bootstrap and echoed in `GET /federation/library` and every announce.
    pub instance_id: Uuid,
    /// Human-readable name this instance announces to peers.
    pub instance_name: String,
    /// Root directory staged/in-flight downloads land under.
    pub download_root: PathBuf,
    /// Root directory organized libraries live under.
    pub media_root: PathBuf,
    /// Container format transcoded/merged output is normalized to.
    pub output_format: String,
    /// Local TCP port the HTTP server listens on, used for UPnP remapping.
    pub port: u16,
    /// Path to the file recording the currently running build's SHA.
    pub build_sha_path: PathBuf,
    /// When `true`, [`crate::http::auth::require_api_key`] admits every request.
    pub auth_disabled: bool,
    /// Hostnames `POST /downloads` accepts; a configurable replacement for
    /// the hard-coded YouTube-only allowlist the original carried.
    pub allowed_download_hosts: Vec<String>,
    /// URL of a plaintext file holding the latest released commit SHA, if
    /// configured. `GET /system/update-check` compares it against
    /// `build_sha_path` to report `update_available`.
    pub update_manifest_url: Option<String>,
}

impl Default for ApiStaticConfig {
    fn default() -> Self {
        Self {
            instance_id: Uuid::nil(),
            instance_name: "downlink".to_string(),
            download_root: PathBuf::from("data/downloads"),
            media_root: PathBuf::from("data/media"),
            output_format: "mkv".to_string(),
            port: 8080,
            build_sha_path: PathBuf::from("BUILD_SHA"),
            auth_disabled: false,
            allowed_download_hosts: vec!["youtube.com".to_string(), "youtu.be".to_string()],
            update_manifest_url: None,
        }
    }
}

/// Shared state handed to every HTTP handler.
pub struct ApiState {
    /// Persistent store: downloads, libraries, peers, API keys, settings.
    pub store: Store,
    /// Event bus handlers publish to and the live log/SSE surfaces read from.
    pub events: EventBus,
    /// Prometheus metrics registry backing `GET /metrics`.
    pub telemetry: Metrics,
    /// Download queue worker handle: wake-after-enqueue and cancellation.
    pub queue: QueueHandle,
    /// UPnP/NAT manager backing `/networking/*`.
    pub nat: NatManager,
    /// HTTP client for talking to peer instances.
    pub federation_client: FederationClient,
    /// Self-update/rollback orchestrator backing `/system/*`.
    pub update: UpdateService,
    /// Static configuration resolved once at startup.
    pub config: ApiStaticConfig,
}

impl ApiState {
    /// Assembles state from its constituent services and static config.
    #[must_use]
    pub fn new(
        store: Store,
        events: EventBus,
        telemetry: Metrics,
        queue: QueueHandle,
        nat: NatManager,
        federation_client: FederationClient,
        update: UpdateService,
        config: ApiStaticConfig,
    ) -> Self {
        Self {
            store,
            events,
            telemetry,
            queue,
            nat,
            federation_client,
            update,
            config,
        }
    }
}
