//! Peer-Sync Scheduler (§4.8): a single process-wide timer that walks every
//! `auto_replicate` peer on each tick. Shaped after the teacher's
//! `spawn_config_watch_task` — a `tokio::spawn`ed loop guarded by a shutdown
//! signal, idempotent to `start`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use downlink_data::Store;
use downlink_events::EventBus;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::client::FederationClient;
use crate::replicate;

/// Interval bounds enforced on the configured `peerSyncIntervalMinutes` (§4.8).
const MIN_INTERVAL_MINUTES: u32 = 5;
/// Interval bounds enforced on the configured `peerSyncIntervalMinutes` (§4.8).
const MAX_INTERVAL_MINUTES: u32 = 1440;

/// Drives the recurring peer replication sweep.
#[derive(Clone)]
pub struct PeerSyncScheduler {
    store: Store,
    client: FederationClient,
    events: EventBus,
    download_root: PathBuf,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    shutdown: Arc<Notify>,
}

impl PeerSyncScheduler {
    /// Builds a scheduler; call [`PeerSyncScheduler::start`] to begin ticking.
    #[must_use]
    pub fn new(store: Store, client: FederationClient, events: EventBus, download_root: PathBuf) -> Self {
        Self {
            store,
            client,
            events,
            download_root,
            handle: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Starts the timer if it is not already running. `interval_minutes` is
    /// clamped to `5..=1440`; the first sweep fires immediately.
    pub async fn start(&self, interval_minutes: u32) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        let clamped = interval_minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
        let scheduler = self.clone();
        *handle = Some(tokio::spawn(async move {
            scheduler.run(clamped).await;
        }));
    }

    /// Stops the timer, if running.
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(handle) = handle.take() {
            self.shutdown.notify_one();
            handle.abort();
        }
    }

    async fn run(&self, interval_minutes: u32) {
        let mut ticker = tokio::time::interval(Duration::from_secs(u64::from(interval_minutes) * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = self.shutdown.notified() => return,
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }

    async fn sweep(&self) {
        let peers = match self.store.list_auto_replicate_peers().await {
            Ok(peers) => peers,
            Err(err) => {
                warn!(error = %err, "failed to list auto-replicate peers");
                return;
            }
        };
        for peer in peers {
            let summary = match replicate::begin_replicate(&self.store, &self.client, &peer, peer.sync_library_id).await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(error = %err, peer = %peer.name, "scheduled replicate failed to start");
                    continue;
                }
            };
            replicate::process_queued_for_peer(
                self.store.clone(),
                self.client.clone(),
                self.events.clone(),
                self.download_root.clone(),
                peer.clone(),
                peer.sync_library_id,
                summary,
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let fixture = downlink_test_support::temp_store().await;
        let scheduler = PeerSyncScheduler::new(fixture.store, FederationClient::new(), EventBus::new(), PathBuf::from("/tmp"));
        scheduler.start(10).await;
        scheduler.start(10).await;
        assert!(scheduler.handle.lock().await.is_some());
        scheduler.stop().await;
    }
}
