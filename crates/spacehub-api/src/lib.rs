//! spacehub-api: REST API for Spacehub.
//!
//! Two audiences share one router. The build/deploy infrastructure reports
//! progress on the internal notifier routes; users drive their apps and
//! environments on the `/api/v1` routes, identifying themselves with the
//! `x-account` header.
//!
//! # Notifier routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/internal/v1/spaces` | Register a space |
//! | POST | `/internal/v1/space-app` | Create the app for a new build |
//! | PUT | `/internal/v1/space-app/building` | Build started |
//! | PUT | `/internal/v1/space-app/build-done` | Build finished |
//! | PUT | `/internal/v1/space-app/serving` | Deploy finished |
//! | PUT | `/internal/v1/space-app/restart-failed` | Restart failed |
//! | PUT | `/internal/v1/space-app/resume-failed` | Resume failed |
//!
//! # User routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/spaces/{id}/app` | Current app |
//! | POST | `/api/v1/spaces/{id}/app/restart` | Force a restart |
//! | POST | `/api/v1/spaces/{id}/app/pause` | Pause the app |
//! | POST | `/api/v1/spaces/{id}/app/resume` | Resume the app |
//! | GET | `/api/v1/spaces/{id}/app/buildlog` | Final build log |
//! | GET | `/api/v1/spaces/{id}/app/buildlog/realtime` | Live build log (SSE) |
//! | GET | `/api/v1/spaces/{id}/app/spacelog/realtime` | Live service log (SSE) |
//! | GET | `/api/v1/spaces/{id}/env` | Secrets and variables |
//! | POST | `/api/v1/spaces/{id}/secret` | Create a secret |
//! | PUT/DELETE | `/api/v1/spaces/{id}/secret/{entry_id}` | Change or drop a secret |
//! | POST | `/api/v1/spaces/{id}/variable` | Create a variable |
//! | PUT/DELETE | `/api/v1/spaces/{id}/variable/{entry_id}` | Change or drop a variable |

pub mod app;
pub mod env;
pub mod internal;
mod response;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use spacehub_env::EnvConfigManager;
use spacehub_lifecycle::SpaceAppLifecycle;
use spacehub_logs::LogRelay;
use spacehub_state::StateStore;

pub use response::Caller;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub lifecycle: Arc<SpaceAppLifecycle>,
    pub env: Arc<EnvConfigManager>,
    pub relay: Arc<LogRelay>,
}

/// Build the complete router (notifier + user routes).
pub fn build_router(state: ApiState) -> Router {
    let internal_routes = Router::new()
        .route("/spaces", post(internal::register_space))
        .route("/space-app", post(internal::create_app))
        .route("/space-app/building", put(internal::building))
        .route("/space-app/build-done", put(internal::build_done))
        .route("/space-app/serving", put(internal::serving))
        .route("/space-app/restart-failed", put(internal::restart_failed))
        .route("/space-app/resume-failed", put(internal::resume_failed));

    let api_routes = Router::new()
        .route("/spaces/{id}/app", get(app::get_app))
        .route("/spaces/{id}/app/restart", post(app::restart))
        .route("/spaces/{id}/app/pause", post(app::pause))
        .route("/spaces/{id}/app/resume", post(app::resume))
        .route("/spaces/{id}/app/buildlog", get(app::build_log))
        .route("/spaces/{id}/app/buildlog/realtime", get(app::build_log_realtime))
        .route("/spaces/{id}/app/spacelog/realtime", get(app::service_log_realtime))
        .route("/spaces/{id}/env", get(env::list_env))
        .route("/spaces/{id}/secret", post(env::create_secret))
        .route(
            "/spaces/{id}/secret/{entry_id}",
            put(env::update_secret).delete(env::delete_secret),
        )
        .route("/spaces/{id}/variable", post(env::create_variable))
        .route(
            "/spaces/{id}/variable/{entry_id}",
            put(env::update_variable).delete(env::delete_variable),
        );

    Router::new()
        .nest("/internal/v1", internal_routes)
        .nest("/api/v1", api_routes)
        .with_state(state)
}
