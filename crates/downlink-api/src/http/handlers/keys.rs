//! `/keys*`: API key minting and management.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use rand::Rng;
use rand::distr::Alphanumeric;
use uuid::Uuid;

use downlink_api_models::{ApiKeyCreateRequest, ApiKeyCreateResponse, ApiKeyListResponse, ApiKeyView};
use downlink_data::hash_raw_key;

use crate::http::errors::ApiError;
use crate::state::ApiState;

const RAW_KEY_LENGTH: usize = 32;

pub async fn list_keys(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ApiKeyListResponse>, ApiError> {
    let keys = state.store.list_api_keys().await?;
    Ok(Json(ApiKeyListResponse {
        keys: keys.into_iter().map(ApiKeyView::from).collect(),
    }))
}

pub async fn create_key(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ApiKeyCreateRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiKeyCreateResponse>), ApiError> {
    let raw_key = generate_raw_key();
    let key_hash = hash_raw_key(&raw_key);
    let key = state.store.insert_api_key(request.label, key_hash).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiKeyCreateResponse {
            id: key.id,
            label: key.label,
            key: raw_key,
            created_at: key.created_at,
        }),
    ))
}

pub async fn delete_key(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, ApiError> {
    let deleted = state.store.delete_api_key(id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("api key {id} not found")))
    }
}

fn generate_raw_key() -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(RAW_KEY_LENGTH)
        .collect()
}
