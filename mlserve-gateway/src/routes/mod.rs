//! HTTP API.

pub mod health;
pub mod models;
pub mod predict;
pub mod status;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the API router (mounted under the configured prefix).
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(predict::router())
        .merge(models::router())
        .merge(status::router())
        .merge(health::router())
}
