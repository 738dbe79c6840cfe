//! Inference router: resolves the target model, validates the payload,
//! forwards it to the model's handle once and normalizes the reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mlserve_common::{
    rank_predictions, ClassPrediction, ModelStatus, PredictionRequest, PredictionResult,
};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::serving::{BackendError, BackendOutput};

use super::registry::{ModelEntry, ModelRegistry, RegistryError};
use super::validator::{PayloadValidator, ValidationError};

/// Errors from the inference router.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Model '{name}' is unavailable: {reason}")]
    ModelUnavailable { name: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Backend did not respond within {0:?}")]
    BackendTimeout(Duration),

    #[error("Registry entry for '{name}' is corrupt: {reason}")]
    RegistryCorruption { name: String, reason: String },
}

impl From<RegistryError> for RouterError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ModelNotFound(name) => RouterError::ModelNotFound(name),
            RegistryError::RegistryCorruption { name, reason } => {
                RouterError::RegistryCorruption { name, reason }
            }
            RegistryError::DuplicateModel(name) => RouterError::RegistryCorruption {
                reason: "duplicate active entry".to_string(),
                name,
            },
            RegistryError::InvalidModelName(name) => RouterError::ModelNotFound(name),
            RegistryError::InvalidInputShape { name, dims } => RouterError::RegistryCorruption {
                reason: format!("unusable input shape {:?}", dims),
                name,
            },
        }
    }
}

/// Router for prediction requests.
pub struct InferenceRouter {
    registry: Arc<ModelRegistry>,
    validator: PayloadValidator,
    request_timeout: Duration,
    top_k: usize,
}

impl InferenceRouter {
    pub fn new(registry: Arc<ModelRegistry>, validator: PayloadValidator, config: &RouterConfig) -> Self {
        Self {
            registry,
            validator,
            request_timeout: config.request_timeout(),
            top_k: config.top_k,
        }
    }

    /// Route a prediction request to its model.
    ///
    /// Backend failures are never retried here; retry policy belongs to the caller.
    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult, RouterError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("predict", %request_id, model = %request.model);
        self.route(request).instrument(span).await
    }

    async fn route(&self, request: PredictionRequest) -> Result<PredictionResult, RouterError> {
        let entry = self.registry.resolve(&request.model).await?;
        self.check_available(&entry).await?;
        let handle = entry.handle.clone().ok_or_else(|| RouterError::RegistryCorruption {
            name: entry.name.clone(),
            reason: format!("{} entry has no backend handle", entry.status),
        })?;

        let payload = self.validator.validate(&entry, request)?;
        let batch_size = payload.batch_size();

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.request_timeout, handle.predict(&payload)).await {
            Ok(Ok(output)) => normalize(output, batch_size, self.top_k).map_err(RouterError::from),
            Ok(Err(e)) => Err(RouterError::Backend(e)),
            Err(_) => Err(RouterError::BackendTimeout(self.request_timeout)),
        };
        let latency = started.elapsed();
        entry.counters.record(latency, outcome.is_ok());

        match &outcome {
            Ok(_) => tracing::debug!(
                batch_size,
                latency_ms = latency.as_millis() as u64,
                "Prediction served"
            ),
            Err(e) => tracing::warn!(
                backend = %handle.describe(),
                latency_ms = latency.as_millis() as u64,
                error = %e,
                "Prediction failed"
            ),
        }
        outcome
    }

    /// Ready models serve; degraded ones only when no ready model of the same family exists.
    async fn check_available(&self, entry: &ModelEntry) -> Result<(), RouterError> {
        let reason = match entry.status {
            ModelStatus::Ready => return Ok(()),
            ModelStatus::Degraded => match self.registry.ready_alternative(entry).await {
                None => return Ok(()),
                Some(alternative) => format!("model is degraded, use '{}' instead", alternative),
            },
            ModelStatus::Loading => "model is still loading".to_string(),
            ModelStatus::Removed => "model has been removed".to_string(),
        };
        Err(RouterError::ModelUnavailable {
            name: entry.name.clone(),
            reason,
        })
    }
}

/// Convert a backend reply into ranked, bounded predictions.
fn normalize(output: BackendOutput, batch_size: usize, top_k: usize) -> Result<PredictionResult, BackendError> {
    let items = output.into_items();
    if items.len() != batch_size {
        return Err(BackendError::InvalidResponse(format!(
            "expected {} batch items, got {}",
            batch_size,
            items.len()
        )));
    }

    let mut predictions = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let mut ranked = Vec::new();
        for raw in item.into_classes() {
            if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
                return Err(BackendError::InvalidResponse(format!(
                    "batch item {} has confidence {} for class {}",
                    index, raw.confidence, raw.class_id
                )));
            }
            ranked.push(ClassPrediction {
                class_name: raw
                    .class_name
                    .unwrap_or_else(|| format!("class_{}", raw.class_id)),
                class_id: raw.class_id,
                confidence: raw.confidence,
            });
        }
        rank_predictions(&mut ranked);
        if top_k > 0 {
            ranked.truncate(top_k);
        }
        predictions.push(ranked);
    }

    Ok(PredictionResult { predictions })
}
