//! `GET /config`: the only endpoint exposed without an API key besides
//! health and the federation surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use downlink_api_models::PublicConfigView;

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub async fn get_config(State(state): State<Arc<ApiState>>) -> Result<Json<PublicConfigView>, ApiError> {
    let plex_url = state.store.get_setting("plex_url").await?;
    Ok(Json(PublicConfigView {
        output_format: state.config.output_format.clone(),
        plex_connected: plex_url.is_some(),
        plex_url,
    }))
}
