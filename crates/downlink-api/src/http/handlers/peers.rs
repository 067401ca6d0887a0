//! `/peers*`: trusted-peer CRUD plus the federation actions (connect, pull,
//! replicate, resolve) a peer entry exposes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use downlink_api_models::{
    PeerConnectRequest, PeerCreateRequest, PeerListResponse, PeerPatchRequest, PeerView,
    PullAcceptedResponse, PullRequest, ReplicateRequest, ReplicateSummaryView,
};
use downlink_data::DownloadStatus;
use downlink_federation::{connect, gossip, probe, pull, replicate};

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub async fn list_peers(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<PeerListResponse>, ApiError> {
    let peers = state.store.list_peers().await?;
    Ok(Json(PeerListResponse {
        peers: peers.into_iter().map(PeerView::from).collect(),
    }))
}

pub async fn get_peer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PeerView>, ApiError> {
    let peer = state.store.require_peer(id).await?;
    Ok(Json(PeerView::from(peer)))
}

/// `POST /peers`: probes the peer's federation library with the supplied
/// key before persisting (§4.7.1), capturing the instance id it reports.
pub async fn create_peer(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PeerCreateRequest>,
) -> Result<(axum::http::StatusCode, Json<PeerView>), ApiError> {
    let peer = probe::probe_and_register(&state.store, &state.federation_client, &request.name, &request.url, &request.api_key)
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(PeerView::from(peer))))
}

pub async fn patch_peer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PeerPatchRequest>,
) -> Result<Json<PeerView>, ApiError> {
    let updated = state.store.update_peer(id, request.into()).await?;
    Ok(Json(PeerView::from(updated)))
}

pub async fn delete_peer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, ApiError> {
    let deleted = state.store.delete_peer(id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("peer {id} not found")))
    }
}

/// `POST /peers/connect`: decodes an `adb-connect:` connection string, probes
/// the peer, and registers it.
pub async fn connect_peer(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PeerConnectRequest>,
) -> Result<(axum::http::StatusCode, Json<PeerView>), ApiError> {
    let peer = connect::connect(&state.store, &state.federation_client, &request.connection_string).await?;
    Ok((axum::http::StatusCode::CREATED, Json(PeerView::from(peer))))
}

/// `GET /peers/{id}/library`: proxies the peer's own federation library listing.
pub async fn get_peer_library(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<downlink_federation::FederationLibrary>, ApiError> {
    let peer = state.store.require_peer(id).await?;
    let library = state
        .federation_client
        .get_library(&peer.url, &peer.api_key)
        .await?;
    Ok(Json(library))
}

/// `POST /peers/{id}/pull/{remote_id}`: begins pulling a single remote item.
pub async fn pull_from_peer(
    State(state): State<Arc<ApiState>>,
    Path((id, remote_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<PullRequest>,
) -> Result<(axum::http::StatusCode, Json<PullAcceptedResponse>), ApiError> {
    let peer = state.store.require_peer(id).await?;
    let download = pull::begin_pull(&state.store, &state.federation_client, &peer.url, &peer.api_key, remote_id)
        .await?;

    tokio::spawn(pull::run_transfer(
        state.store.clone(),
        state.federation_client.clone(),
        state.events.clone(),
        state.config.download_root.clone(),
        peer.url,
        peer.api_key,
        remote_id,
        download.id,
        pull::PullOptions { auto_move: request.auto_move, library_id: request.library_id },
    ));

    debug_assert_eq!(download.status, DownloadStatus::Downloading);
    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(PullAcceptedResponse { id: download.id, status: "downloading" }),
    ))
}

/// `POST /peers/{id}/replicate`: queues every item in the peer's library not
/// already present locally, then processes the queue in the background.
pub async fn replicate_peer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplicateRequest>,
) -> Result<Json<ReplicateSummaryView>, ApiError> {
    let peer = state.store.require_peer(id).await?;
    let summary =
        replicate::begin_replicate(&state.store, &state.federation_client, &peer, request.library_id).await?;

    tokio::spawn(replicate::process_queued_for_peer(
        state.store.clone(),
        state.federation_client.clone(),
        state.events.clone(),
        state.config.download_root.clone(),
        peer,
        request.library_id,
        summary.clone(),
    ));

    Ok(Json(ReplicateSummaryView {
        total: summary.total,
        queued: summary.queued,
        skipped: summary.skipped,
    }))
}

/// `POST /peers/{id}/resolve`: gossip-recovers a peer's current URL.
pub async fn resolve_peer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PeerView>, ApiError> {
    let target = state.store.require_peer(id).await?;
    let resolved = gossip::resolve_peer(&state.store, &state.federation_client, &target).await?;
    Ok(Json(PeerView::from(resolved.target)))
}
