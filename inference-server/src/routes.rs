use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use inference_core::Capability;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::handlers::{admin, health, jobs};
use crate::middleware::auth::{auth_middleware, require_capability};

/// Builds the full router: `/health` and `GET /job/{job_id}` are public;
/// submission/deletion require the `inference` capability and the admin
/// endpoints require `admin`, each enforced by its own auth+capability
/// middleware pair.
///
/// Submission lives under `/job/by-type/{task_type}` rather than
/// `/job/{task_type}` because axum's router matches purely on path shape:
/// a bare `/job/{task_type}` POST would share a shape with the `/job/{job_id}`
/// GET/DELETE routes but bind a differently-named capture, which `matchit`
/// rejects as a conflicting route at insertion time.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/job/{job_id}", get(jobs::get_job))
        .merge(inference_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Route groups apply `require_capability` before `auth_middleware` in
/// call order so that `auth_middleware`, added last, wraps outermost and
/// runs first, populating the `Identity` extension the capability check
/// reads.
fn inference_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/job/by-type/{task_type}", post(jobs::submit_job))
        .route("/job/{job_id}", delete(jobs::delete_job))
        .route_layer(middleware::from_fn(require_capability(Capability::Inference)))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(admin::stats))
        .route("/admin/cleanup", delete(admin::cleanup))
        .route_layer(middleware::from_fn(require_capability(Capability::Admin)))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
