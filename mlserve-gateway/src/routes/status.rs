//! Cluster status endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use mlserve_common::ClusterSnapshot;

use crate::state::AppState;

/// Build the status router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ray/status", get(cluster_status))
}

/// GET /ray/status - Last cluster snapshot published by the poller.
async fn cluster_status(State(state): State<Arc<AppState>>) -> Json<ClusterSnapshot> {
    Json(state.status_aggregator.snapshot())
}
