//! Space secrets and variables.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use spacehub_env::{EnvEntry, EnvUpdate, NewEnvEntry};
use spacehub_state::Identity;

use crate::ApiState;
use crate::response::{ApiResponse, Caller, env_error};

/// GET /api/v1/spaces/:id/env
pub async fn list_env(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> impl IntoResponse {
    match state.env.list(&user, space_id) {
        Ok(entries) => ApiResponse::ok(entries).into_response(),
        Err(e) => env_error(e),
    }
}

// ── Secrets ────────────────────────────────────────────────────

/// POST /api/v1/spaces/:id/secret
pub async fn create_secret(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
    Json(req): Json<NewEnvEntry>,
) -> impl IntoResponse {
    match state.env.create_secret(&user, space_id, req).await {
        Ok(secret) => (StatusCode::CREATED, ApiResponse::ok(EnvEntry::from(&secret))).into_response(),
        Err(e) => env_error(e),
    }
}

/// PUT /api/v1/spaces/:id/secret/:entry_id
pub async fn update_secret(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path((space_id, secret_id)): Path<(Identity, Identity)>,
    Json(req): Json<EnvUpdate>,
) -> impl IntoResponse {
    match state.env.update_secret(&user, space_id, secret_id, req).await {
        Ok(secret) => ApiResponse::ok(EnvEntry::from(&secret)).into_response(),
        Err(e) => env_error(e),
    }
}

/// DELETE /api/v1/spaces/:id/secret/:entry_id
pub async fn delete_secret(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path((space_id, secret_id)): Path<(Identity, Identity)>,
) -> impl IntoResponse {
    match state.env.delete_secret(&user, space_id, secret_id).await {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => env_error(e),
    }
}

// ── Variables ──────────────────────────────────────────────────

/// POST /api/v1/spaces/:id/variable
pub async fn create_variable(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
    Json(req): Json<NewEnvEntry>,
) -> impl IntoResponse {
    match state.env.create_variable(&user, space_id, req).await {
        Ok(variable) => {
            (StatusCode::CREATED, ApiResponse::ok(EnvEntry::from(&variable))).into_response()
        }
        Err(e) => env_error(e),
    }
}

/// PUT /api/v1/spaces/:id/variable/:entry_id
pub async fn update_variable(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path((space_id, variable_id)): Path<(Identity, Identity)>,
    Json(req): Json<EnvUpdate>,
) -> impl IntoResponse {
    match state.env.update_variable(&user, space_id, variable_id, req).await {
        Ok(variable) => ApiResponse::ok(EnvEntry::from(&variable)).into_response(),
        Err(e) => env_error(e),
    }
}

/// DELETE /api/v1/spaces/:id/variable/:entry_id
pub async fn delete_variable(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path((space_id, variable_id)): Path<(Identity, Identity)>,
) -> impl IntoResponse {
    match state.env.delete_variable(&user, space_id, variable_id).await {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => env_error(e),
    }
}
