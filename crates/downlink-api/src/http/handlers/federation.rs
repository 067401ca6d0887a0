//! The federation server surface (§4.6): the four endpoints a peer calls on
//! this node. API-key gated like every other route, never session-gated.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use downlink_federation::{AnnounceRequest, AnnounceResponse, FederationLibrary, FederationLibraryItem, ResolveResponse};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// `GET /federation/library`: every completed, non-replicated download this
/// node holds, shaped for a peer's browse/pull/replicate flows.
pub async fn get_library(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FederationLibrary>, ApiError> {
    let downloads = state.store.list_completed_originals().await?;
    let items = downloads
        .into_iter()
        .map(|download| FederationLibraryItem {
            id: download.id,
            title: download.title,
            category: download.category,
            season: download.season,
            episode: download.episode,
            status: "completed".to_string(),
            created_at: download.created_at,
        })
        .collect();
    Ok(Json(FederationLibrary {
        instance_id: state.config.instance_id,
        instance_name: state.config.instance_name.clone(),
        items,
    }))
}

/// `GET /federation/download/{id}/stream`: full-file stream, no range support.
pub async fn stream_library_item(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let download = state.store.require_download(id).await?;
    let path = download
        .file_path
        .ok_or_else(|| ApiError::not_found(format!("download {id} has no file to stream")))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|err| ApiError::internal(format!("failed to open {path}: {err}")))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|err| ApiError::internal(format!("failed to stat {path}: {err}")))?;

    let filename = std::path::Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{id}"));
    let content_type = content_type_for(&filename);

    let body = Body::from_stream(ReaderStream::new(file));
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(response.into_response())
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase().as_str() {
        "mkv" => "video/x-matroska",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// `POST /federation/announce`: refresh a known peer's URL on their own announce.
pub async fn announce(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AnnounceRequest>,
) -> Result<Json<AnnounceResponse>, ApiError> {
    let updated = state
        .store
        .apply_announce(request.instance_id, &request.url)
        .await?;
    Ok(Json(AnnounceResponse { updated }))
}

/// `GET /federation/resolve/{instanceId}`: the gossip substrate other peers
/// use to recover our knowledge of `instanceId`'s current address.
pub async fn resolve(
    State(state): State<Arc<ApiState>>,
    Path(instance_id): Path<Uuid>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let peer = state
        .store
        .find_peer_by_instance_id(instance_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no peer known for instance {instance_id}")))?;
    Ok(Json(ResolveResponse {
        instance_id,
        name: peer.name,
        url: peer.url,
        last_seen: peer.last_seen,
    }))
}
