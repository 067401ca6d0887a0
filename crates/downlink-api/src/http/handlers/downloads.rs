//! `/downloads*`: CRUD, lifecycle transitions, and file streaming.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use downlink_api_models::{
    DownloadCreateRequest, DownloadCreateResponse, DownloadListResponse, DownloadMoveRequest,
    DownloadPatchRequest, DownloadView,
};
use downlink_data::{Category, DownloadStatus, NewDownload};
use downlink_events::Event;
use downlink_organizer::{Placement, destination_path, place_into_library, restore_to_staging};

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub async fn list_downloads(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DownloadListResponse>, ApiError> {
    let downloads = state.store.list_downloads().await?;
    Ok(Json(DownloadListResponse {
        downloads: downloads.into_iter().map(DownloadView::from).collect(),
    }))
}

pub async fn get_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadView>, ApiError> {
    let download = state.store.require_download(id).await?;
    Ok(Json(DownloadView::from(download)))
}

pub async fn create_download(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<DownloadCreateRequest>,
) -> Result<(axum::http::StatusCode, Json<DownloadCreateResponse>), ApiError> {
    if !host_allowed(&request.url, &state.config.allowed_download_hosts) {
        return Err(ApiError::bad_request(
            "url must be http(s) and match an allowed host",
        ));
    }

    let title = request.title.unwrap_or_else(|| request.url.clone());
    let category = request
        .category
        .unwrap_or_else(|| Category::detect(&title));
    let id = Uuid::new_v4();

    state
        .store
        .insert_download(NewDownload {
            id,
            url: request.url.clone(),
            title,
            category,
            season: request.season,
            episode: request.episode,
            status: DownloadStatus::Queued,
        })
        .await?;

    if state
        .events
        .send(Event::DownloadQueued {
            download_id: id,
            url: request.url,
        })
        .is_err()
    {
        warn!(download_id = %id, "failed to publish download-queued event");
    }
    state.queue.wake();

    Ok((
        axum::http::StatusCode::CREATED,
        Json(DownloadCreateResponse { id, status: "queued" }),
    ))
}

pub async fn patch_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<DownloadPatchRequest>,
) -> Result<Json<DownloadView>, ApiError> {
    let updated = state.store.update_download(id, request.into()).await?;
    Ok(Json(DownloadView::from(updated)))
}

pub async fn delete_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, ApiError> {
    let deleted = state.store.delete_download(id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("download {id} not found")))
    }
}

pub async fn cancel_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, ApiError> {
    let download = state.store.require_download(id).await?;
    if matches!(
        download.status,
        DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
    ) {
        return Err(ApiError::bad_request("cannot cancel a terminal download"));
    }
    state
        .queue
        .cancel(id)
        .await
        .map_err(ApiError::from)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn move_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<DownloadMoveRequest>,
) -> Result<Json<DownloadView>, ApiError> {
    let download = state.store.require_download(id).await?;
    if download.status != DownloadStatus::Completed {
        return Err(ApiError::bad_request("download is not completed"));
    }
    if download.moved_to_library {
        return Err(ApiError::bad_request("download is already moved"));
    }
    let library_id = request
        .library_id
        .ok_or_else(|| ApiError::bad_request("library_id is required"))?;
    let library = state.store.require_library(library_id).await?;
    let source = download
        .file_path
        .as_deref()
        .ok_or_else(|| ApiError::internal("completed download is missing a file_path"))?;
    let source_path = std::path::Path::new(source);

    let placement = Placement {
        category: download.category,
        title: &download.title,
        season: download.season,
        episode: download.episode,
    };
    let destination = destination_path(std::path::Path::new(&library.path), &placement, source_path)?;
    place_into_library(source_path, &destination)?;

    let destination_str = destination.to_string_lossy().into_owned();
    let updated = state
        .store
        .set_download_moved(id, true, Some(library_id), &destination_str)
        .await?;
    if state
        .events
        .send(Event::DownloadMoved {
            download_id: id,
            library_id,
            file_path: destination_str,
        })
        .is_err()
    {
        warn!(download_id = %id, "failed to publish download-moved event");
    }
    Ok(Json(DownloadView::from(updated)))
}

pub async fn unmove_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadView>, ApiError> {
    let download = state.store.require_download(id).await?;
    if !download.moved_to_library {
        return Err(ApiError::bad_request("download is not moved"));
    }
    let source = download
        .file_path
        .as_deref()
        .ok_or_else(|| ApiError::internal("moved download is missing a file_path"))?;
    let restored = restore_to_staging(
        std::path::Path::new(source),
        &state.config.download_root,
        id,
    )?;

    let updated = state
        .store
        .set_download_moved(id, false, None, &restored.to_string_lossy())
        .await?;
    Ok(Json(DownloadView::from(updated)))
}

/// `GET /downloads/{id}/stream`: delegates byte-range handling to
/// `tower-http`'s file service rather than hand-rolling `Range` parsing.
pub async fn stream_download(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    req: axum::extract::Request,
) -> Result<axum::response::Response, ApiError> {
    let download = state.store.require_download(id).await?;
    let path = download
        .file_path
        .ok_or_else(|| ApiError::bad_request("download has no file to stream yet"))?;

    ServeFile::new(path)
        .oneshot(req)
        .await
        .map_err(|err: std::io::Error| ApiError::internal(err.to_string()))
        .map(axum::response::IntoResponse::into_response)
}

fn host_allowed(raw_url: &str, allowed_hosts: &[String]) -> bool {
    let Ok(url) = Url::parse(raw_url) else {
        return false;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    allowed_hosts
        .iter()
        .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["youtube.com".to_string(), "youtu.be".to_string()]
    }

    #[test]
    fn accepts_exact_and_subdomain_matches() {
        assert!(host_allowed("https://youtube.com/watch?v=x", &hosts()));
        assert!(host_allowed("https://www.youtube.com/watch?v=x", &hosts()));
        assert!(host_allowed("https://youtu.be/x", &hosts()));
    }

    #[test]
    fn rejects_other_hosts_and_schemes() {
        assert!(!host_allowed("https://evil.example/watch?v=x", &hosts()));
        assert!(!host_allowed("ftp://youtube.com/watch?v=x", &hosts()));
        assert!(!host_allowed("not a url", &hosts()));
    }
}
