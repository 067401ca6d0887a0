//! `/libraries*`: CRUD plus the unregistered-subdirectory scan.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use downlink_api_models::{
    LibraryCreateRequest, LibraryListResponse, LibraryPatchRequest, LibraryScanEntry,
    LibraryScanResponse, LibraryView,
};
use downlink_data::{Category, NewLibrary};

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub async fn list_libraries(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<LibraryListResponse>, ApiError> {
    let libraries = state.store.list_libraries().await?;
    Ok(Json(LibraryListResponse {
        libraries: libraries.into_iter().map(LibraryView::from).collect(),
    }))
}

pub async fn get_library(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LibraryView>, ApiError> {
    let library = state.store.require_library(id).await?;
    Ok(Json(LibraryView::from(library)))
}

pub async fn create_library(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<LibraryCreateRequest>,
) -> Result<(axum::http::StatusCode, Json<LibraryView>), ApiError> {
    let kind = request.kind.unwrap_or_else(|| Category::detect(&request.name));
    let library = state
        .store
        .insert_library(NewLibrary {
            name: request.name,
            path: request.path,
            kind,
            plex_section_id: request.plex_section_id,
        })
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(LibraryView::from(library))))
}

pub async fn patch_library(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<LibraryPatchRequest>,
) -> Result<Json<LibraryView>, ApiError> {
    let updated = state.store.update_library(id, request.into()).await?;
    Ok(Json(LibraryView::from(updated)))
}

pub async fn delete_library(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, ApiError> {
    let deleted = state.store.delete_library(id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("library {id} not found")))
    }
}

/// `GET /libraries/scan`: media-root subdirectories not yet registered as a library.
pub async fn scan_libraries(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<LibraryScanResponse>, ApiError> {
    let registered = state.store.list_libraries().await?;
    let registered_paths: std::collections::HashSet<_> =
        registered.into_iter().map(|library| library.path).collect();

    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(&state.config.media_root)
        .await
        .map_err(|err| ApiError::internal(format!("failed to read media root: {err}")))?;
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|err| ApiError::internal(format!("failed to read media root entry: {err}")))?
    {
        if !entry
            .file_type()
            .await
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false)
        {
            continue;
        }
        let path = entry.path();
        let path_str = path.to_string_lossy().into_owned();
        if registered_paths.contains(&path_str) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(LibraryScanEntry {
            suggested_kind: Category::detect(&name),
            name,
            path: path_str,
        });
    }

    Ok(Json(LibraryScanResponse { entries }))
}
