//! Prediction endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mlserve_common::{PredictionRequest, PredictionResponse};

use crate::error::Result;
use crate::state::AppState;

/// Build the prediction router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict))
}

/// POST /predict - Run inference on a batch.
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(request) = payload?;
    let model = request.model.clone();

    let result = state.router.predict(request).await?;

    Ok(Json(PredictionResponse { model, result }))
}
