//! Model registry endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use mlserve_common::ModelInfo;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::state::AppState;

/// Build the models router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models).post(register_model))
        .route("/models/:name", delete(deregister_model))
}

/// Model list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// GET /models - List registered models in registration order.
async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let models = state
        .registry
        .list()
        .await
        .iter()
        .map(|entry| entry.info())
        .collect();

    Json(ModelsResponse { models })
}

/// POST /models - Register a deployment, typically right after its archive was deployed.
///
/// The model starts in `loading`; a health probe is started immediately.
async fn register_model(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ModelConfig>, JsonRejection>,
) -> Result<(StatusCode, Json<ModelInfo>)> {
    let Json(model) = payload?;
    state.deploy(&model).await?;

    let monitor = state.health_monitor.clone();
    let name = model.name.clone();
    tokio::spawn(async move {
        monitor.probe(&name).await;
    });

    let entry = state.registry.resolve(&model.name).await?;
    Ok((StatusCode::CREATED, Json(entry.info())))
}

/// DELETE /models/:name - Deregister a model. Repeating the call is harmless.
async fn deregister_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ModelInfo>> {
    state.registry.deregister(&name).await?;
    let entry = state.registry.resolve(&name).await?;
    Ok(Json(entry.info()))
}
