//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONFLICT, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
    PROBLEM_UNAUTHORIZED, PROBLEM_UPSTREAM_FAILURE,
};
use downlink_api_models::ProblemDetails;
use downlink_data::DataError;
use downlink_federation::FederationError;
use downlink_nat::NatError;
use downlink_organizer::OrganizerError;
use downlink_update::UpdateError;

/// Structured API error, rendered as an RFC9457 problem-details body.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn upstream_failure(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_UPSTREAM_FAILURE,
            "upstream peer request failed",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound { entity, id } => {
                Self::not_found(format!("{entity} {id} not found"))
            }
            DataError::Conflict { reason } => Self::conflict(reason),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<FederationError> for ApiError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::Transport { .. }
            | FederationError::InvalidKey { .. }
            | FederationError::NotAnAnimeDbInstance { .. }
            | FederationError::UnexpectedStatus { .. }
            | FederationError::Decode { .. } => Self::upstream_failure(err.to_string()),
            FederationError::AlreadyPulled { .. } => Self::conflict(err.to_string()),
            FederationError::RemoteItemNotFound { .. }
            | FederationError::LibraryNotFound { .. }
            | FederationError::UnresolvedPeer { .. } => Self::not_found(err.to_string()),
            FederationError::MissingInstanceId { .. } => Self::bad_request(err.to_string()),
            FederationError::Store { source } => source.into(),
            FederationError::Io { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::AlreadyInProgress => Self::conflict(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<NatError> for ApiError {
    fn from(err: NatError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<OrganizerError> for ApiError {
    fn from(err: OrganizerError) -> Self {
        Self::internal(err.to_string())
    }
}
