//! An in-memory mirror of in-flight download status, event-sourced off the
//! bus the way `revaer-app::orchestrator`'s torrent catalog mirrors engine
//! events; the `downlink-data::Store` remains the durable source of truth.

use std::collections::HashMap;
use std::sync::Arc;

use downlink_data::DownloadStatus;
use downlink_events::Event;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A lightweight, frequently-updated snapshot of one download's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    /// Current lifecycle status.
    pub status: DownloadStatus,
    /// Percent complete, `0..=100`.
    pub progress: u8,
    /// Last recorded failure message, if any.
    pub error: Option<String>,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self {
            status: DownloadStatus::Queued,
            progress: 0,
            error: None,
        }
    }
}

/// Thread-safe map of `download_id -> JobSnapshot`, kept current by feeding
/// it every [`Event`] the queue worker emits.
#[derive(Default, Clone)]
pub struct JobCatalog {
    entries: Arc<RwLock<HashMap<Uuid, JobSnapshot>>>,
}

impl JobCatalog {
    /// Builds an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot for `id`, if tracked.
    pub async fn get(&self, id: Uuid) -> Option<JobSnapshot> {
        self.entries.read().await.get(&id).cloned()
    }

    /// Updates the catalog from a queue-domain event; non-queue events are ignored.
    pub async fn observe(&self, event: &Event) {
        let mut entries = self.entries.write().await;
        match event {
            Event::DownloadQueued { download_id, .. } => {
                entries.insert(*download_id, JobSnapshot::default());
            }
            Event::DownloadStarted { download_id } => {
                let entry = entries.entry(*download_id).or_default();
                entry.status = DownloadStatus::Downloading;
                entry.progress = 0;
                entry.error = None;
            }
            Event::DownloadProgress { download_id, progress } => {
                let entry = entries.entry(*download_id).or_default();
                entry.progress = *progress;
            }
            Event::DownloadCompleted { download_id, .. } => {
                let entry = entries.entry(*download_id).or_default();
                entry.status = DownloadStatus::Completed;
                entry.progress = 100;
            }
            Event::DownloadFailed {
                download_id, error, ..
            } => {
                let entry = entries.entry(*download_id).or_default();
                entry.status = DownloadStatus::Failed;
                entry.error = Some(error.clone());
            }
            Event::DownloadCancelled { download_id } => {
                let entry = entries.entry(*download_id).or_default();
                entry.status = DownloadStatus::Cancelled;
                entry.error = Some("Cancelled by user".to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_tracks_lifecycle_through_events() {
        let catalog = JobCatalog::new();
        let id = Uuid::new_v4();

        catalog
            .observe(&Event::DownloadQueued {
                download_id: id,
                url: "https://example.com".into(),
            })
            .await;
        assert_eq!(catalog.get(id).await.unwrap().status, DownloadStatus::Queued);

        catalog.observe(&Event::DownloadStarted { download_id: id }).await;
        catalog
            .observe(&Event::DownloadProgress {
                download_id: id,
                progress: 42,
            })
            .await;
        let snapshot = catalog.get(id).await.unwrap();
        assert_eq!(snapshot.status, DownloadStatus::Downloading);
        assert_eq!(snapshot.progress, 42);

        catalog
            .observe(&Event::DownloadFailed {
                download_id: id,
                error: "boom".into(),
                attempts: 1,
            })
            .await;
        let snapshot = catalog.get(id).await.unwrap();
        assert_eq!(snapshot.status, DownloadStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn catalog_ignores_untracked_event_kinds() {
        let catalog = JobCatalog::new();
        catalog
            .observe(&Event::NatStateChanged {
                state: "mapped",
                external_url: None,
            })
            .await;
        assert!(catalog.get(Uuid::new_v4()).await.is_none());
    }
}
