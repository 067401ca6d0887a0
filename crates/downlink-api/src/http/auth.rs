//! API key authentication middleware.
//!
//! Every route that isn't explicitly public is gated by [`require_api_key`]:
//! a single shared bearer token authenticates both interactive clients and
//! federation peers alike (there is no separate session-login flow in this
//! core; see `/auth/*` in the route table, which this crate does not serve).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, warn};

use crate::http::constants::HEADER_API_KEY;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Marker inserted into request extensions once a request has been authenticated.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext;

/// Requires a valid API key on the request, unless [`crate::state::ApiStaticConfig::auth_disabled`]
/// is set, in which case every request is admitted unauthenticated.
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.auth_disabled {
        req.extensions_mut().insert(AuthContext);
        return Ok(next.run(req).await);
    }

    let raw_key = extract_api_key(&req)
        .ok_or_else(|| ApiError::unauthorized("missing Authorization header or api_key"))?;

    let valid = state.store.verify_api_key(&raw_key).await.map_err(|err| {
        error!(error = %err, "failed to verify api key");
        ApiError::internal("failed to verify api key")
    })?;

    if !valid {
        warn!("rejected request with unknown api key");
        return Err(ApiError::unauthorized("invalid API key"));
    }

    req.extensions_mut().insert(AuthContext);
    Ok(next.run(req).await)
}

/// Extracts the raw API key from `Authorization: Bearer <key>`, the
/// `x-downlink-api-key` header, or an `?api_key=` query parameter, in that
/// order of preference.
fn extract_api_key(req: &Request) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(value.to_string());
    }

    if let Some(value) = req
        .headers()
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(value.to_string());
    }

    let query = req.uri().query()?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("api_key=")
            && !value.is_empty()
        {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_header(name: &str, value: &str) -> Request {
        HttpRequest::builder()
            .uri("/downloads")
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn extracts_bearer_token_from_authorization_header() {
        let req = request_with_header("authorization", "Bearer secret-token");
        assert_eq!(extract_api_key(&req), Some("secret-token".to_string()));
    }

    #[test]
    fn extracts_legacy_header() {
        let req = request_with_header(HEADER_API_KEY, "legacy-token");
        assert_eq!(extract_api_key(&req), Some("legacy-token".to_string()));
    }

    #[test]
    fn extracts_query_param() {
        let req = HttpRequest::builder()
            .uri("/downloads?api_key=query-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&req), Some("query-token".to_string()));
    }

    #[test]
    fn missing_key_returns_none() {
        let req = HttpRequest::builder()
            .uri("/downloads")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&req), None);
    }
}
