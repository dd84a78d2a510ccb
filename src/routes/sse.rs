use axum::{
    extract::State,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::AppState;
use crate::clients::aggregator::{Aggregator, SnapshotEvent};
use crate::models::views;

/// SSE endpoint that pushes the changed part of the snapshot whenever the
/// refresher publishes one.
pub async fn handle_snapshot_events(State(state): State<AppState>) -> Response {
    Sse::new(snapshot_events(state.aggregator.clone()))
        .keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
        .into_response()
}

fn snapshot_events(agg: Arc<Aggregator>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(agg.subscribe()).filter_map(move |msg| {
        let agg = agg.clone();
        async move {
            match msg {
                Ok(event) => Some(Ok(render_event(&agg, event).await)),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::debug!("sse subscriber lagged by {} events", n);
                    None
                }
            }
        }
    })
}

async fn render_event(agg: &Aggregator, event: SnapshotEvent) -> Event {
    let snap = agg.snapshot().await;
    let now = chrono::Utc::now();
    let data = match event {
        SnapshotEvent::Groups | SnapshotEvent::Usage => serde_json::to_string(
            &views::build_group_views(snap.cluster.as_ref(), &snap.groups, &snap.pod_usage, now),
        ),
        SnapshotEvent::Cluster => serde_json::to_string(&views::build_cluster_view(
            snap.cluster.as_ref(),
            &snap.groups,
            &snap.pod_usage,
            &snap.node_usage,
            now,
        )),
    };
    Event::default()
        .event(event.as_str())
        .data(data.unwrap_or_default())
}
