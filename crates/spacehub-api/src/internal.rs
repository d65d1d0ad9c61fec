//! Notifier webhooks called by the build/deploy infrastructure.
//!
//! Notifications are not deduplicated. A replayed notification answers
//! 409, which the notifier treats as already applied.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use spacehub_lifecycle::AppView;
use spacehub_state::{Account, Identity, Space, SpaceAppIndex, Visibility, epoch_secs};
use tracing::info;

use crate::ApiState;
use crate::response::{ApiResponse, lifecycle_error};

/// Register space body.
#[derive(Deserialize)]
pub struct RegisterSpaceRequest {
    pub owner: Account,
    /// Defaults to the owner, which makes the space personal.
    #[serde(default)]
    pub created_by: Option<Account>,
    pub name: String,
    pub sdk: String,
    pub hardware: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub commit_id: String,
}

/// POST /internal/v1/spaces
pub async fn register_space(
    State(state): State<ApiState>,
    Json(req): Json<RegisterSpaceRequest>,
) -> impl IntoResponse {
    let now = epoch_secs();
    let mut space = Space {
        id: 0,
        created_by: req.created_by.unwrap_or_else(|| req.owner.clone()),
        owner: req.owner,
        name: req.name,
        sdk: req.sdk,
        hardware: req.hardware,
        description: req.description,
        visibility: req.visibility,
        commit_id: req.commit_id,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert(&mut space) {
        Ok(()) => {
            info!(space_id = space.id, owner = %space.owner, "space registered");
            (StatusCode::CREATED, ApiResponse::ok(space)).into_response()
        }
        Err(e) => lifecycle_error(e.into()),
    }
}

/// POST /internal/v1/space-app
pub async fn create_app(
    State(state): State<ApiState>,
    Json(index): Json<SpaceAppIndex>,
) -> impl IntoResponse {
    match state.lifecycle.create(index).await {
        Ok(app) => (StatusCode::CREATED, ApiResponse::ok(AppView::from(&app))).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// Build started body.
#[derive(Deserialize)]
pub struct BuildingRequest {
    #[serde(flatten)]
    pub index: SpaceAppIndex,
    pub log_url: String,
}

/// PUT /internal/v1/space-app/building
pub async fn building(
    State(state): State<ApiState>,
    Json(req): Json<BuildingRequest>,
) -> impl IntoResponse {
    match state.lifecycle.build_started(&req.index, &req.log_url) {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// Build finished body.
#[derive(Deserialize)]
pub struct BuildDoneRequest {
    #[serde(flatten)]
    pub index: SpaceAppIndex,
    pub success: bool,
    #[serde(default)]
    pub logs: String,
}

/// PUT /internal/v1/space-app/build-done
pub async fn build_done(
    State(state): State<ApiState>,
    Json(req): Json<BuildDoneRequest>,
) -> impl IntoResponse {
    match state.lifecycle.build_done(&req.index, req.success, &req.logs) {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// Deploy finished body. No `app_url` means the service failed to start.
#[derive(Deserialize)]
pub struct ServingRequest {
    #[serde(flatten)]
    pub index: SpaceAppIndex,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub log_url: Option<String>,
}

/// PUT /internal/v1/space-app/serving
pub async fn serving(
    State(state): State<ApiState>,
    Json(req): Json<ServingRequest>,
) -> impl IntoResponse {
    let result = state.lifecycle.service_started(
        &req.index,
        req.app_url.as_deref(),
        req.log_url.as_deref(),
    );
    match result {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// PUT /internal/v1/space-app/restart-failed
pub async fn restart_failed(
    State(state): State<ApiState>,
    Json(index): Json<SpaceAppIndex>,
) -> impl IntoResponse {
    match state.lifecycle.restart_failed(&index) {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// Resume failed body.
#[derive(Deserialize)]
pub struct ResumeFailedRequest {
    pub space_id: Identity,
}

/// PUT /internal/v1/space-app/resume-failed
pub async fn resume_failed(
    State(state): State<ApiState>,
    Json(req): Json<ResumeFailedRequest>,
) -> impl IntoResponse {
    match state.lifecycle.resume_failed(req.space_id) {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}
