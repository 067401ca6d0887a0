//! `/system*`: self-update check and trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use tracing::warn;

use downlink_api_models::UpdateCheckResponse;

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub async fn update_check(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<UpdateCheckResponse>, ApiError> {
    let current_sha = tokio::fs::read_to_string(&state.config.build_sha_path)
        .await
        .map(|contents| contents.trim().to_string())
        .unwrap_or_default();

    let latest_sha = match &state.config.update_manifest_url {
        Some(url) => fetch_latest_sha(url).await,
        None => None,
    };
    let update_available = latest_sha.as_deref().is_some_and(|sha| sha != current_sha);

    Ok(Json(UpdateCheckResponse { current_sha, latest_sha, update_available }))
}

pub async fn trigger_update(State(state): State<Arc<ApiState>>) -> Result<axum::http::StatusCode, ApiError> {
    state.update.begin_update()?;
    Ok(axum::http::StatusCode::OK)
}

async fn fetch_latest_sha(url: &str) -> Option<String> {
    match reqwest::get(url).await {
        Ok(response) => match response.error_for_status() {
            Ok(response) => response.text().await.ok().map(|text| text.trim().to_string()),
            Err(err) => {
                warn!(error = %err, "update manifest fetch returned an error status");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "failed to fetch update manifest");
            None
        }
    }
}
