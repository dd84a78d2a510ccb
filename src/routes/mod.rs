pub mod api;
pub mod sse;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Snapshot views
        .route("/api/v1/snapshot", get(api::handle_snapshot))
        .route("/api/v1/cluster", get(api::handle_cluster))
        .route("/api/v1/groups", get(api::handle_groups))
        .route(
            "/api/v1/groups/{name}/toggle",
            post(api::handle_toggle_group),
        )
        // Pods
        .route(
            "/api/v1/namespaces/{namespace}/pods/{name}",
            delete(api::handle_delete_pod),
        )
        // Refresher
        .route("/api/v1/refresh", post(api::handle_refresh))
        .route("/api/v1/refresh/start", post(api::handle_refresh_start))
        .route("/api/v1/refresh/stop", post(api::handle_refresh_stop))
        // Change notifications
        .route("/api/v1/events", get(sse::handle_snapshot_events))
        // Health
        .route("/healthz", get(api::handle_healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
