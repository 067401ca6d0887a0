//! Single-worker FIFO queue loop (§4.5): claims the oldest `queued` download,
//! drives it through the downloader, and persists every state transition.

use std::sync::Arc;

use downlink_data::Store;
use downlink_downloader::{DownloadOutcome, Downloader, DownloaderError};
use downlink_events::{Event, EventBus};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{JobCatalog, JobSnapshot};

/// Handle used by callers (typically the HTTP layer) to wake the worker
/// after an enqueue and to request cancellation of a specific job.
#[derive(Clone)]
pub struct QueueHandle {
    store: Store,
    events: EventBus,
    downloader: Downloader,
    catalog: JobCatalog,
    wake: Arc<Notify>,
    active_job: Arc<Mutex<Option<Uuid>>>,
}

impl QueueHandle {
    /// Wakes the worker loop; idempotent if it is already awake or busy.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Cancels `id` (§4.5 step 5): kills the running subprocess if `id` is
    /// the active job, otherwise transitions a still-`queued` row directly.
    pub async fn cancel(&self, id: Uuid) -> downlink_data::DataResult<()> {
        let active = *self.active_job.lock().await;
        if active == Some(id) {
            self.downloader.cancel(&id.to_string()).await;
            return Ok(());
        }
        let updated = self.store.cancel_download(id).await?;
        let event = Event::DownloadCancelled { download_id: updated.id };
        publish(&self.events, &self.catalog, event).await;
        Ok(())
    }

    /// Returns the in-memory progress snapshot for `id`, if tracked.
    pub async fn snapshot(&self, id: Uuid) -> Option<JobSnapshot> {
        self.catalog.get(id).await
    }
}

struct QueueWorker {
    store: Store,
    events: EventBus,
    downloader: Downloader,
    catalog: JobCatalog,
    wake: Arc<Notify>,
    active_job: Arc<Mutex<Option<Uuid>>>,
}

/// Spawns the queue's background loop, demoting any `downloading` row left
/// over from a prior crash back to `queued` before the loop starts.
pub fn spawn(store: Store, events: EventBus, downloader: Downloader, catalog: JobCatalog) -> (QueueHandle, JoinHandle<()>) {
    let wake = Arc::new(Notify::new());
    let active_job = Arc::new(Mutex::new(None));
    let handle = QueueHandle {
        store: store.clone(),
        events: events.clone(),
        downloader: downloader.clone(),
        catalog: catalog.clone(),
        wake: wake.clone(),
        active_job: active_job.clone(),
    };
    let worker = QueueWorker {
        store,
        events,
        downloader,
        catalog,
        wake,
        active_job,
    };
    (handle, tokio::spawn(worker.run()))
}

impl QueueWorker {
    async fn run(self) {
        match self.store.demote_stuck_downloads().await {
            Ok(0) => {}
            Ok(count) => info!(count, "recovered crashed downloads back to queued"),
            Err(err) => warn!(error = %err, "failed to demote stuck downloads at startup"),
        }

        loop {
            match self.store.claim_next_queued().await {
                Ok(Some(download)) => {
                    *self.active_job.lock().await = Some(download.id);
                    let id = download.id;
                    let event = Event::DownloadStarted { download_id: id };
                    publish(&self.events, &self.catalog, event).await;

                    let outcome = self.run_job(id, &download.url).await;
                    self.finish_job(id, outcome).await;
                    *self.active_job.lock().await = None;
                }
                Ok(None) => self.wake.notified().await,
                Err(err) => {
                    warn!(error = %err, "failed to claim next queued download");
                    self.wake.notified().await;
                }
            }
        }
    }

    async fn run_job(&self, id: Uuid, url: &str) -> Result<DownloadOutcome, DownloaderError> {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let store = self.store.clone();
        let events = self.events.clone();
        let catalog = self.catalog.clone();
        let progress_task = tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                if let Err(err) = store.set_download_progress(id, i64::from(progress)).await {
                    warn!(%err, "failed to persist download progress");
                }
                let event = Event::DownloadProgress {
                    download_id: id,
                    progress,
                };
                publish(&events, &catalog, event).await;
            }
        });

        let result = self
            .downloader
            .download_video(&id.to_string(), url, move |percent| {
                let _ = progress_tx.send(percent);
            })
            .await;
        let _ = progress_task.await;
        result
    }

    async fn finish_job(&self, id: Uuid, outcome: Result<DownloadOutcome, DownloaderError>) {
        match outcome {
            Ok(outcome) => match self
                .store
                .complete_download(id, &outcome.file_path.display().to_string(), outcome.title.as_deref())
                .await
            {
                Ok(updated) => {
                    let event = Event::DownloadCompleted {
                        download_id: id,
                        file_path: updated.file_path.unwrap_or_default(),
                    };
                    publish(&self.events, &self.catalog, event).await;
                }
                Err(err) => warn!(%err, "failed to persist download completion"),
            },
            Err(DownloaderError::Cancelled { .. }) => match self.store.cancel_download(id).await {
                Ok(_) => {
                    let event = Event::DownloadCancelled { download_id: id };
                    publish(&self.events, &self.catalog, event).await;
                }
                Err(err) => warn!(%err, "failed to persist download cancellation"),
            },
            Err(other) => match self.store.fail_download(id, &other.to_string()).await {
                Ok(updated) => {
                    let event = Event::DownloadFailed {
                        download_id: id,
                        error: updated.error.unwrap_or_default(),
                        attempts: u32::try_from(updated.attempts).unwrap_or(u32::MAX),
                    };
                    publish(&self.events, &self.catalog, event).await;
                }
                Err(err) => warn!(%err, "failed to persist download failure"),
            },
        }
    }
}

async fn publish(events: &EventBus, catalog: &JobCatalog, event: Event) {
    catalog.observe(&event).await;
    if let Err(err) = events.send(event) {
        warn!(%err, "failed to publish queue event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downlink_data::{Category, DownloadStatus, NewDownload};
    use downlink_test_support::{fake_subprocess::write_success_script, temp_store};
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn worker_processes_a_queued_download_to_completion() {
        let fixture = temp_store().await;
        let store = fixture.store;
        let events = EventBus::new();
        let catalog = JobCatalog::new();

        let download_id = Uuid::new_v4();
        let download_root = tempdir().unwrap();
        write_success_script(download_root.path(), &download_id.to_string(), "mkv");
        let tool_path = download_root.path().join("fake-download-tool.sh");
        let downloader = Downloader::new(tool_path, download_root.path().to_path_buf());

        store
            .insert_download(NewDownload {
                id: download_id,
                url: "https://example.com/video".to_string(),
                title: String::new(),
                category: Category::Movies,
                season: None,
                episode: None,
                status: DownloadStatus::Queued,
            })
            .await
            .unwrap();

        let (handle, join) = spawn(store.clone(), events, downloader, catalog);
        handle.wake();

        let mut row = store.require_download(download_id).await.unwrap();
        for _ in 0..50 {
            if row.status == DownloadStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            row = store.require_download(download_id).await.unwrap();
        }

        assert_eq!(row.status, DownloadStatus::Completed);
        assert_eq!(row.progress, 100);
        join.abort();
    }
}
