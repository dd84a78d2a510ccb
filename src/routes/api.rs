use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AppState;
use crate::models::views::{self, ClusterView, GroupView, SnapshotView};

#[derive(Debug, Serialize)]
pub struct ToggleResult {
    pub name: String,
    pub collapsed: bool,
}

#[derive(Debug, Serialize)]
pub struct RefresherStatus {
    pub running: bool,
}

pub async fn handle_snapshot(State(state): State<AppState>) -> Json<SnapshotView> {
    let snap = state.aggregator.snapshot().await;
    Json(views::build_snapshot_view(
        snap.cluster.as_ref(),
        &snap.groups,
        &snap.pod_usage,
        &snap.node_usage,
        chrono::Utc::now(),
    ))
}

pub async fn handle_cluster(State(state): State<AppState>) -> Json<ClusterView> {
    let snap = state.aggregator.snapshot().await;
    Json(views::build_cluster_view(
        snap.cluster.as_ref(),
        &snap.groups,
        &snap.pod_usage,
        &snap.node_usage,
        chrono::Utc::now(),
    ))
}

pub async fn handle_groups(State(state): State<AppState>) -> Json<Vec<GroupView>> {
    let snap = state.aggregator.snapshot().await;
    Json(views::build_group_views(
        snap.cluster.as_ref(),
        &snap.groups,
        &snap.pod_usage,
        chrono::Utc::now(),
    ))
}

pub async fn handle_toggle_group(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match state.aggregator.toggle_group(&name).await {
        Some(collapsed) => Json(ToggleResult { name, collapsed }).into_response(),
        None => (StatusCode::NOT_FOUND, format!("group {:?} not found", name)).into_response(),
    }
}

pub async fn handle_delete_pod(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    let message = state.aggregator.delete_pod(&namespace, &name).await;
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

pub async fn handle_refresh(State(state): State<AppState>) -> StatusCode {
    state.refresher.refresh_now().await;
    StatusCode::OK
}

pub async fn handle_refresh_start(State(state): State<AppState>) -> Response {
    let code = if state.refresher.start().await {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    let running = state.refresher.is_running().await;
    (code, Json(RefresherStatus { running })).into_response()
}

pub async fn handle_refresh_stop(State(state): State<AppState>) -> Response {
    let code = if state.refresher.stop().await {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    let running = state.refresher.is_running().await;
    (code, Json(RefresherStatus { running })).into_response()
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}
