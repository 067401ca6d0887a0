//! `/networking*`: UPnP/NAT state and manual external-URL override.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use downlink_api_models::{NetworkingStateView, SetExternalUrlRequest};
use downlink_nat::NatState;

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub async fn get_networking_state(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<NetworkingStateView>, ApiError> {
    let nat_state = state.nat.state().await;
    let external_url = state.nat.external_url().await;
    Ok(Json(NetworkingStateView {
        active: matches!(nat_state, NatState::Active { .. } | NatState::Manual { .. }),
        external_url,
    }))
}

pub async fn set_external_url(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SetExternalUrlRequest>,
) -> Result<Json<NetworkingStateView>, ApiError> {
    state.nat.set_manual_external_url(request.url).await;
    let nat_state = state.nat.state().await;
    let external_url = state.nat.external_url().await;
    Ok(Json(NetworkingStateView {
        active: matches!(nat_state, NatState::Active { .. } | NatState::Manual { .. }),
        external_url,
    }))
}

pub async fn retry_upnp(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<NetworkingStateView>, ApiError> {
    let port = state.config.port;
    let local_addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let nat_state = state.nat.retry_upnp(local_addr, port).await;
    let external_url = state.nat.external_url().await;
    Ok(Json(NetworkingStateView {
        active: matches!(nat_state, NatState::Active { .. } | NatState::Manual { .. }),
        external_url,
    }))
}
