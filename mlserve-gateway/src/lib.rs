//! MLServe gateway - model registry and inference router in front of a
//! distributed serving runtime.

pub mod cluster;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod routes;
pub mod serving;
pub mod state;
pub mod test_util;

pub use config::Config;
pub use error::Error;
pub use gateway::{InferenceRouter, ModelRegistry};
pub use state::AppState;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full HTTP application: API routes under the configured prefix,
/// the root welcome route, CORS and request logging.
pub fn app(state: Arc<AppState>) -> Router {
    let prefix = state.config.api.prefix.trim_end_matches('/').to_string();

    let api = if prefix.is_empty() {
        Router::new().merge(routes::router())
    } else {
        Router::new().nest(&prefix, routes::router())
    };

    api.route("/", get(root))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET / - Service information.
async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "Welcome to MLServe API",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "api": state.config.api.prefix,
    }))
}
