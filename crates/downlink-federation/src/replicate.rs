//! Replicating a peer's entire library (§4.7.4). The synchronous phase
//! dedupes against local rows and inserts `queued` placeholders; the
//! sequential per-peer transfer loop that follows reuses
//! [`crate::pull::run_transfer`] per item so the two flows never diverge.

use std::path::PathBuf;

use downlink_data::{DownloadStatus, NewDownload, Peer, Store};
use downlink_events::{Event, EventBus};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::client::FederationClient;
use crate::error::{FederationError, FederationResult};
use crate::pull::{self, PullOptions};

/// Counts returned synchronously from [`begin_replicate`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReplicateSummary {
    /// Items present in the peer's library.
    pub total: u32,
    /// Items newly enqueued this call.
    pub queued: u32,
    /// Items skipped because an equivalent local row already existed.
    pub skipped: u32,
}

fn federation_url(peer_url: &str, remote_id: Uuid) -> String {
    format!("federation://{peer_url}/{remote_id}")
}

/// Validates the optional library, fetches the peer's library (15s timeout,
/// enforced by [`FederationClient::get_library`]), and inserts one `queued`
/// row per item not already present locally under any of
/// `queued`/`downloading`/`completed` (the idempotence guarantee).
///
/// # Errors
///
/// Returns [`FederationError::LibraryNotFound`] if `library_id` is supplied
/// but unknown, or a transport/store error.
pub async fn begin_replicate(
    store: &Store,
    client: &FederationClient,
    peer: &Peer,
    library_id: Option<Uuid>,
) -> FederationResult<ReplicateSummary> {
    if let Some(library_id) = library_id {
        let exists = store.get_library(library_id).await.map_err(|source| FederationError::Store { source })?;
        if exists.is_none() {
            return Err(FederationError::LibraryNotFound { library_id });
        }
    }

    let library = client.get_library(&peer.url, &peer.api_key).await?;
    let total = u32::try_from(library.items.len()).unwrap_or(u32::MAX);
    let mut queued = 0u32;
    let mut skipped = 0u32;

    for item in library.items {
        let url = federation_url(&peer.url, item.id);
        let existing = store.find_by_url(&url).await.map_err(|source| FederationError::Store { source })?;
        if existing.is_some() {
            skipped += 1;
            continue;
        }
        store
            .insert_download(NewDownload {
                id: Uuid::new_v4(),
                url,
                title: item.title,
                category: item.category,
                season: item.season,
                episode: item.episode,
                status: DownloadStatus::Queued,
            })
            .await
            .map_err(|source| FederationError::Store { source })?;
        queued += 1;
    }

    Ok(ReplicateSummary { total, queued, skipped })
}

/// Processes every `queued` row whose `url` was enqueued for `peer` by the
/// preceding [`begin_replicate`] call, sequentially, isolating per-item
/// failures. Intended to run as a detached background task started right
/// after `begin_replicate` returns; `summary` is that call's result, carried
/// along purely to report accurate totals in progress events.
pub async fn process_queued_for_peer(
    store: Store,
    client: FederationClient,
    events: EventBus,
    download_root: PathBuf,
    peer: Peer,
    library_id: Option<Uuid>,
    summary: ReplicateSummary,
) {
    let prefix = format!("federation://{}/", peer.url);
    let rows = match store.list_queued_with_url_prefix(&prefix).await {
        Ok(rows) => rows,
        Err(err) => {
            warn!(error = %err, peer = %peer.name, "failed to list queued replicate rows");
            return;
        }
    };

    for (index, row) in rows.into_iter().enumerate() {
        let Some(remote_id) = remote_id_from_url(&row.url) else {
            warn!(download_id = %row.id, "replicate row has an unparseable federation url, skipping");
            continue;
        };
        if let Err(err) = store.mark_downloading(row.id).await {
            warn!(error = %err, download_id = %row.id, "failed to start replicate transfer");
            continue;
        }
        if events.send(Event::DownloadStarted { download_id: row.id }).is_err() {
            warn!(download_id = %row.id, "failed to publish replicate start event");
        }

        pull::run_transfer(
            store.clone(),
            client.clone(),
            events.clone(),
            download_root.clone(),
            peer.url.clone(),
            peer.api_key.clone(),
            remote_id,
            row.id,
            PullOptions { auto_move: library_id.is_some(), library_id },
        )
        .await;

        #[allow(clippy::cast_possible_truncation)]
        let completed = (index + 1) as u32;
        if events
            .send(Event::FederationReplicateProgress {
                peer_id: peer.id,
                total: summary.total,
                queued: summary.queued,
                skipped: summary.skipped,
                completed,
            })
            .is_err()
        {
            warn!(peer = %peer.name, "failed to publish replicate progress event");
        }
    }
}

fn remote_id_from_url(url: &str) -> Option<Uuid> {
    url.rsplit('/').next().and_then(|tail| Uuid::parse_str(tail).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn federation_url_matches_the_scheme_pull_expects() {
        let id = Uuid::nil();
        assert_eq!(federation_url("http://peer:3000", id), format!("federation://http://peer:3000/{id}"));
    }

    #[test]
    fn remote_id_from_url_parses_trailing_uuid() {
        let id = Uuid::new_v4();
        let url = format!("federation://http://peer:3000/{id}");
        assert_eq!(remote_id_from_url(&url), Some(id));
        assert_eq!(remote_id_from_url("federation://http://peer:3000/not-a-uuid"), None);
    }
}
