//! Serving backend abstraction layer.
//!
//! This module defines the `ModelHandle` trait that abstracts a deployed model
//! instance on the serving runtime (a Ray Serve deployment, a test double, ...)
//! behind a common capability interface. The registry stores handles, never
//! concrete backend types.

mod http;

pub use http::HttpModelHandle;

use async_trait::async_trait;
use serde::Deserialize;

use crate::gateway::ValidatedPayload;

/// Errors raised by a serving backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Raw class prediction as produced by a backend, before ranking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawClassPrediction {
    #[serde(alias = "index")]
    pub class_id: u32,
    #[serde(default, alias = "class", alias = "label")]
    pub class_name: Option<String>,
    #[serde(alias = "score", alias = "probability")]
    pub confidence: f32,
}

/// One batch item of a backend reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BackendItem {
    /// `{"predictions": [...]}`
    Wrapped { predictions: Vec<RawClassPrediction> },
    /// `[...]`
    Bare(Vec<RawClassPrediction>),
}

impl BackendItem {
    pub fn into_classes(self) -> Vec<RawClassPrediction> {
        match self {
            BackendItem::Wrapped { predictions } | BackendItem::Bare(predictions) => predictions,
        }
    }
}

/// Backend reply, in any of the shapes the serving runtime produces.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BackendOutput {
    /// `{"predictions": [item, ...]}`
    Wrapped { predictions: Vec<BackendItem> },
    /// `[item, ...]`
    Items(Vec<BackendItem>),
}

impl BackendOutput {
    pub fn into_items(self) -> Vec<BackendItem> {
        match self {
            BackendOutput::Wrapped { predictions } | BackendOutput::Items(predictions) => {
                predictions
            }
        }
    }
}

/// Capability every deployed model handle must provide.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    /// Short description for logs (e.g., the endpoint URL).
    fn describe(&self) -> String;

    /// Run inference on a validated batch. Called exactly once per request.
    async fn predict(&self, payload: &ValidatedPayload) -> Result<BackendOutput, BackendError>;

    /// Check that the deployment is reachable.
    async fn health_check(&self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_wrapped_items() {
        let json = r#"{"predictions": [{"predictions": [
            {"class_id": 281, "class_name": "tabby", "confidence": 0.7},
            {"class_id": 282, "class_name": "tiger cat", "confidence": 0.2}
        ]}]}"#;
        let output: BackendOutput = serde_json::from_str(json).unwrap();
        let items = output.into_items();
        assert_eq!(items.len(), 1);
        let classes = items.into_iter().next().unwrap().into_classes();
        assert_eq!(classes[0].class_id, 281);
        assert_eq!(classes[1].class_name.as_deref(), Some("tiger cat"));
    }

    #[test]
    fn test_parses_bare_lists_with_aliases() {
        let json = r#"[[{"index": 0, "class": "placeholder", "score": 0.99}]]"#;
        let output: BackendOutput = serde_json::from_str(json).unwrap();
        let classes = output.into_items().remove(0).into_classes();
        assert_eq!(
            classes,
            vec![RawClassPrediction {
                class_id: 0,
                class_name: Some("placeholder".to_string()),
                confidence: 0.99,
            }]
        );
    }

    #[test]
    fn test_missing_class_name_is_allowed() {
        let json = r#"[[{"class_id": 5, "confidence": 0.5}]]"#;
        let output: BackendOutput = serde_json::from_str(json).unwrap();
        let classes = output.into_items().remove(0).into_classes();
        assert_eq!(classes[0].class_name, None);
    }
}
