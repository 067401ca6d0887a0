//! Pulling a single item from a peer's library into a local `Download`
//! (§4.7.3). The synchronous prefix (conflict check, lookup, insert) runs on
//! the caller's task; the transfer itself is handed to a spawned background
//! task, mirroring the fire-and-continue shape `revaer-app` uses for its
//! config-watch task.

use std::path::{Path, PathBuf};

use downlink_data::{Download, DownloadStatus, NewDownload, Store};
use downlink_events::{Event, EventBus};
use downlink_organizer::Placement;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use crate::client::FederationClient;
use crate::error::{FederationError, FederationResult};

/// Caller-supplied options for a pull.
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Run the Media Organizer move immediately after the transfer completes.
    pub auto_move: bool,
    /// Destination library for `auto_move`.
    pub library_id: Option<Uuid>,
}

/// Validates the request and inserts the local placeholder row, returning its
/// id. The caller (an HTTP handler) should respond `202` with this id and let
/// the returned background task run to completion unattended.
///
/// # Errors
///
/// Returns [`FederationError::AlreadyPulled`] if a completed row already
/// exists at `remote_id`, [`FederationError::RemoteItemNotFound`] if the
/// peer's library lacks that item, or a transport/store error.
pub async fn begin_pull(
    store: &Store,
    client: &FederationClient,
    peer_url: &str,
    peer_api_key: &str,
    remote_id: Uuid,
) -> FederationResult<Download> {
    if let Some(existing) = store.get_download(remote_id).await.map_err(|source| FederationError::Store { source })? {
        if existing.status == DownloadStatus::Completed {
            return Err(FederationError::AlreadyPulled { remote_id });
        }
    }

    let library = client.get_library(peer_url, peer_api_key).await?;
    let item = library
        .items
        .into_iter()
        .find(|item| item.id == remote_id)
        .ok_or(FederationError::RemoteItemNotFound { remote_id })?;

    let local_id = Uuid::new_v4();
    store
        .insert_download(NewDownload {
            id: local_id,
            url: format!("federation://{peer_url}/{remote_id}"),
            title: item.title,
            category: item.category,
            season: item.season,
            episode: item.episode,
            status: DownloadStatus::Downloading,
        })
        .await
        .map_err(|source| FederationError::Store { source })?;
    store.require_download(local_id).await.map_err(|source| FederationError::Store { source })
}

/// Runs the background transfer for a row created by [`begin_pull`]: streams
/// the remote file to `<download_root>/<local_id>/<filename>`, persisting
/// progress, then finalizes (optionally auto-moving into a library).
pub async fn run_transfer(
    store: Store,
    client: FederationClient,
    events: EventBus,
    download_root: PathBuf,
    peer_url: String,
    peer_api_key: String,
    remote_id: Uuid,
    local_id: Uuid,
    options: PullOptions,
) {
    let job_dir = download_root.join(local_id.to_string());
    if let Err(err) = tokio::fs::create_dir_all(&job_dir).await {
        warn!(error = %err, download_id = %local_id, "failed to create job directory for pull");
        fail(&store, &events, local_id, &err.to_string()).await;
        return;
    }

    let outcome = transfer_to_disk(&store, &client, &events, &peer_url, &peer_api_key, remote_id, local_id, &job_dir).await;
    match outcome {
        Ok(file_path) => finalize(&store, &events, local_id, &file_path, &options).await,
        Err(err) => fail(&store, &events, local_id, &err.to_string()).await,
    }
}

async fn transfer_to_disk(
    store: &Store,
    client: &FederationClient,
    events: &EventBus,
    peer_url: &str,
    peer_api_key: &str,
    remote_id: Uuid,
    local_id: Uuid,
    job_dir: &Path,
) -> FederationResult<String> {
    let mut response = client.open_download_stream(peer_url, peer_api_key, remote_id).await?;

    let filename = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_disposition_filename)
        .unwrap_or_else(|| format!("{local_id}.mkv"));
    let total = response.content_length();
    let destination = job_dir.join(&filename);

    let mut file = File::create(&destination)
        .await
        .map_err(|source| FederationError::Io { path: destination.clone(), source })?;

    let mut received: u64 = 0;
    let mut last_reported = 0u8;
    while let Some(chunk) = response.chunk().await.map_err(|source| FederationError::Transport {
        url: peer_url.to_string(),
        source,
    })? {
        file.write_all(&chunk)
            .await
            .map_err(|source| FederationError::Io { path: destination.clone(), source })?;
        received += chunk.len() as u64;
        if let Some(total) = total {
            if total > 0 {
                #[allow(clippy::cast_precision_loss)]
                let percent = ((received as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as u8;
                if percent != last_reported {
                    last_reported = percent;
                    if let Err(err) = store.set_download_progress(local_id, i64::from(percent)).await {
                        warn!(%err, download_id = %local_id, "failed to persist pull progress");
                    }
                    if events.send(Event::DownloadProgress { download_id: local_id, progress: percent }).is_err() {
                        warn!(download_id = %local_id, "failed to publish pull progress event");
                    }
                }
            }
        }
    }

    Ok(destination.to_string_lossy().into_owned())
}

fn parse_content_disposition_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|part| part.strip_prefix("filename=")).map(|raw| raw.trim_matches('"').to_string())
}

async fn finalize(store: &Store, events: &EventBus, local_id: Uuid, file_path: &str, options: &PullOptions) {
    let completed = match store.complete_download(local_id, file_path, None).await {
        Ok(download) => download,
        Err(err) => {
            warn!(error = %err, download_id = %local_id, "failed to record pull completion");
            return;
        }
    };
    if events
        .send(Event::DownloadCompleted {
            download_id: local_id,
            file_path: file_path.to_string(),
        })
        .is_err()
    {
        warn!(download_id = %local_id, "failed to publish pull completion event");
    }

    if options.auto_move {
        if let Some(library_id) = options.library_id {
            move_into_library(store, events, &completed, library_id, file_path).await;
        }
    }
}

async fn move_into_library(store: &Store, events: &EventBus, completed: &Download, library_id: Uuid, file_path: &str) {
    let Ok(Some(library)) = store.get_library(library_id).await else {
        warn!(download_id = %completed.id, "auto-move library not found");
        return;
    };
    let destination_root = Path::new(&library.path);
    let placement = Placement {
        category: completed.category,
        title: &completed.title,
        season: completed.season,
        episode: completed.episode,
    };
    let source = Path::new(file_path);
    let destination = match downlink_organizer::destination_path(destination_root, &placement, source) {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, download_id = %completed.id, "failed to compute auto-move destination");
            return;
        }
    };
    if let Err(err) = downlink_organizer::place_into_library(source, &destination) {
        warn!(error = %err, download_id = %completed.id, "auto-move failed");
        return;
    }
    let new_path = destination.to_string_lossy().into_owned();
    if let Err(err) = store.set_download_moved(completed.id, true, Some(library_id), &new_path).await {
        warn!(error = %err, download_id = %completed.id, "failed to record auto-move");
        return;
    }
    if events
        .send(Event::DownloadMoved {
            download_id: completed.id,
            library_id: Some(library_id),
            file_path: new_path,
        })
        .is_err()
    {
        warn!(download_id = %completed.id, "failed to publish auto-move event");
    }
}

async fn fail(store: &Store, events: &EventBus, local_id: Uuid, error: &str) {
    if let Err(err) = store.force_fail_download(local_id, error).await {
        warn!(error = %err, download_id = %local_id, "failed to record pull failure");
        return;
    }
    if events
        .send(Event::DownloadFailed {
            download_id: local_id,
            error: error.to_string(),
            attempts: 1,
        })
        .is_err()
    {
        warn!(download_id = %local_id, "failed to publish pull failure event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_content_disposition_filename_strips_quotes() {
        let header = "attachment; filename=\"My Movie.mkv\"";
        assert_eq!(parse_content_disposition_filename(header), Some("My Movie.mkv".to_string()));
    }

    #[test]
    fn parse_content_disposition_filename_none_when_absent() {
        assert_eq!(parse_content_disposition_filename("attachment"), None);
    }
}
