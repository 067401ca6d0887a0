//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, Method, Request, header::CONTENT_TYPE};
use axum::routing::{get, post, put};
use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use downlink_telemetry::build_sha;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::require_api_key;
use crate::http::constants::{HEADER_API_KEY, HEADER_REQUEST_ID};
use crate::http::handlers::{config, downloads, federation, health, keys, libraries, networking, peers, system};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper that hosts the downlink node's HTTP API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Assembles the router around shared `state`, laying public, API-key
    /// gated, and federation routes over the standard trace/metrics/CORS
    /// middleware stack.
    #[must_use]
    pub fn new(state: Arc<ApiState>) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_API_KEY)]);

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(|response: &axum::response::Response, latency: Duration, span: &Span| {
                span.record("status_code", response.status().as_u16());
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                span.record("latency_ms", latency_ms);
            });

        let layered = ServiceBuilder::new()
            .layer(downlink_telemetry::propagate_request_id_layer())
            .layer(downlink_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(state.telemetry.clone()));

        let router = Self::build_router(&state).layer(cors_layer).route_layer(layered).with_state(state);

        Self { router }
    }

    fn build_router(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        Self::public_routes()
            .merge(Self::gated_routes(state))
            .merge(Self::federation_routes(state))
    }

    /// Routes reachable without an API key: liveness, metrics, public config.
    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health::health))
            .route("/metrics", get(health::metrics))
            .route("/config", get(config::get_config))
    }

    /// Every operator-facing resource, gated by [`require_api_key`].
    fn gated_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_api = middleware::from_fn_with_state(state.clone(), require_api_key);

        Router::new()
            .route("/downloads", get(downloads::list_downloads).post(downloads::create_download))
            .route(
                "/downloads/{id}",
                get(downloads::get_download).patch(downloads::patch_download).delete(downloads::delete_download),
            )
            .route("/downloads/{id}/cancel", post(downloads::cancel_download))
            .route("/downloads/{id}/move", post(downloads::move_download))
            .route("/downloads/{id}/unmove", post(downloads::unmove_download))
            .route("/downloads/{id}/stream", get(downloads::stream_download))
            .route("/libraries", get(libraries::list_libraries).post(libraries::create_library))
            .route("/libraries/scan", get(libraries::scan_libraries))
            .route(
                "/libraries/{id}",
                get(libraries::get_library).patch(libraries::patch_library).delete(libraries::delete_library),
            )
            .route("/keys", get(keys::list_keys).post(keys::create_key))
            .route("/keys/{id}", axum::routing::delete(keys::delete_key))
            .route("/peers", get(peers::list_peers).post(peers::create_peer))
            .route("/peers/connect", post(peers::connect_peer))
            .route(
                "/peers/{id}",
                get(peers::get_peer).patch(peers::patch_peer).delete(peers::delete_peer),
            )
            .route("/peers/{id}/library", get(peers::get_peer_library))
            .route("/peers/{id}/pull/{remote_id}", post(peers::pull_from_peer))
            .route("/peers/{id}/replicate", post(peers::replicate_peer))
            .route("/peers/{id}/resolve", post(peers::resolve_peer))
            .route("/networking", get(networking::get_networking_state))
            .route("/networking/external-url", put(networking::set_external_url))
            .route("/networking/upnp-retry", post(networking::retry_upnp))
            .route("/system/update-check", get(system::update_check))
            .route("/system/update", post(system::trigger_update))
            .route_layer(require_api)
    }

    /// The federation server surface (§4.6): what a peer calls on this node,
    /// gated by the same API-key middleware as every other route.
    fn federation_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_api = middleware::from_fn_with_state(state.clone(), require_api_key);

        Router::new()
            .route("/federation/library", get(federation::get_library))
            .route("/federation/download/{id}/stream", get(federation::stream_library_item))
            .route("/federation/announce", post(federation::announce))
            .route("/federation/resolve/{instance_id}", get(federation::resolve))
            .route_layer(require_api)
    }

    /// Serves the API on `addr` until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the listener cannot bind, or
    /// [`ApiServerError::Serve`] if the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        tracing::info!(%addr, "starting downlink API");
        let listener = TcpListener::bind(addr).await.map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
