//! Prediction request/response payloads.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound prediction request: a batch of flattened feature vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Registered model name to route to (e.g., "resnet18").
    pub model: String,
    /// One flattened input tensor per batch item.
    ///
    /// Values are kept as raw JSON so a non-numeric entry is reported with
    /// its batch index and position instead of failing the whole body.
    pub data: Vec<Vec<Value>>,
}

impl PredictionRequest {
    pub fn new(model: impl Into<String>, rows: Vec<Vec<f32>>) -> Self {
        Self {
            model: model.into(),
            data: rows
                .into_iter()
                .map(|row| row.into_iter().map(Value::from).collect())
                .collect(),
        }
    }
}

/// A single ranked class prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    pub class_id: u32,
    pub class_name: String,
    /// Probability in [0, 1].
    pub confidence: f32,
}

/// Normalized prediction output, one ranked list per batch item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<Vec<ClassPrediction>>,
}

impl PredictionResult {
    /// Number of batch items.
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// HTTP response body for `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// The model that served the request.
    pub model: String,
    #[serde(flatten)]
    pub result: PredictionResult,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error kind (e.g., "shape_mismatch").
    pub kind: String,
    /// Human-readable explanation.
    pub detail: String,
}

/// Sort class predictions by confidence descending, ties broken by ascending class id.
///
/// The sort is stable, so repeated ranking of the same list never reorders it.
pub fn rank_predictions(predictions: &mut [ClassPrediction]) {
    predictions.sort_by(|a, b| match b.confidence.total_cmp(&a.confidence) {
        Ordering::Equal => a.class_id.cmp(&b.class_id),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(class_id: u32, confidence: f32) -> ClassPrediction {
        ClassPrediction {
            class_id,
            class_name: format!("class_{}", class_id),
            confidence,
        }
    }

    #[test]
    fn test_rank_orders_by_confidence_then_class_id() {
        let mut preds = vec![class(7, 0.1), class(3, 0.4), class(9, 0.4), class(1, 0.1), class(2, 0.9)];
        rank_predictions(&mut preds);

        let ids: Vec<u32> = preds.iter().map(|p| p.class_id).collect();
        assert_eq!(ids, vec![2, 3, 9, 1, 7]);
        assert!(preds.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"model": "resnet18", "data": [[0.5, 0.25, 1.0]]}"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.model, "resnet18");
        assert_eq!(request, PredictionRequest::new("resnet18", vec![vec![0.5, 0.25, 1.0]]));
    }

    #[test]
    fn test_request_keeps_non_numeric_values() {
        let json = r#"{"model": "resnet18", "data": [["a", 0.25]]}"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.data[0][0], Value::from("a"));
    }

    #[test]
    fn test_request_requires_nested_rows() {
        let json = r#"{"model": "resnet18", "data": [0.5, 0.25]}"#;
        assert!(serde_json::from_str::<PredictionRequest>(json).is_err());
    }

    #[test]
    fn test_response_flattens_predictions() {
        let response = PredictionResponse {
            model: "resnet18".to_string(),
            result: PredictionResult {
                predictions: vec![vec![class(1, 0.5)]],
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["model"], "resnet18");
        assert_eq!(json["predictions"][0][0]["class_id"], 1);
        assert_eq!(json["predictions"][0][0]["class_name"], "class_1");
    }
}
