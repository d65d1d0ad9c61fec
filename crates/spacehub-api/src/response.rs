//! Response envelope, error mapping and caller identity.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use spacehub_env::EnvError;
use spacehub_lifecycle::LifecycleError;
use spacehub_logs::LogRelayError;
use tracing::error;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> Response {
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %msg, "request failed");
    }
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

pub(crate) fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::ConcurrentUpdate(_) | LifecycleError::UnmatchedStatus { .. } => {
            StatusCode::CONFLICT
        }
        LifecycleError::RestartTooSoon { .. } => StatusCode::TOO_MANY_REQUESTS,
        LifecycleError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LifecycleError::Publish(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn lifecycle_error(err: LifecycleError) -> Response {
    error_response(&err.to_string(), lifecycle_status(&err))
}

pub(crate) fn env_error(err: EnvError) -> Response {
    let status = match &err {
        EnvError::NotFound(_) => StatusCode::NOT_FOUND,
        EnvError::ConcurrentUpdate(_) | EnvError::Duplicate(_) => StatusCode::CONFLICT,
        EnvError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        EnvError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EnvError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EnvError::Vault(_) | EnvError::Publish(_) | EnvError::Restart(_) => StatusCode::BAD_GATEWAY,
        EnvError::State(_) | EnvError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&err.to_string(), status)
}

pub(crate) fn relay_error(err: LogRelayError) -> Response {
    let status = match &err {
        LogRelayError::NotReady { .. } => StatusCode::CONFLICT,
        LogRelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_response(&err.to_string(), status)
}

/// Account making the request, taken from the `x-account` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

pub const CALLER_HEADER: &str = "x-account";

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
        {
            Some(account) if !account.is_empty() => Ok(Caller(account.to_string())),
            _ => Err(error_response(
                "missing x-account header",
                StatusCode::UNAUTHORIZED,
            )),
        }
    }
}
