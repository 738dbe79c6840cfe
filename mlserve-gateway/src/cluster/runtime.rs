//! Serving-runtime resource queries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Errors from querying the serving runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Runtime request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Runtime returned {0}")]
    Status(u16),

    #[error("Runtime unavailable: {0}")]
    Unavailable(String),
}

/// Resource totals and availability, keyed by resource kind (e.g., "CPU").
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceReport {
    #[serde(default)]
    pub total: BTreeMap<String, f64>,
    #[serde(default)]
    pub available: BTreeMap<String, f64>,
}

/// Source of live cluster resource data.
#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    async fn resources(&self) -> Result<ResourceReport, RuntimeError>;
}

/// Reads resource totals from an HTTP endpoint exposed next to the serving runtime.
pub struct HttpClusterRuntime {
    http_client: Client,
    resources_url: String,
}

impl HttpClusterRuntime {
    pub fn new(resources_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            resources_url: resources_url.to_string(),
        }
    }
}

#[async_trait]
impl ClusterRuntime for HttpClusterRuntime {
    async fn resources(&self) -> Result<ResourceReport, RuntimeError> {
        let response = self.http_client.get(&self.resources_url).send().await?;
        if !response.status().is_success() {
            return Err(RuntimeError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetches_resources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": {"CPU": 8.0, "memory": 16e9},
                "available": {"CPU": 6.0, "memory": 12e9}
            })))
            .mount(&server)
            .await;

        let runtime = HttpClusterRuntime::new(&format!("{}/resources", server.uri()));
        let report = runtime.resources().await.unwrap();
        assert_eq!(report.total["CPU"], 8.0);
        assert_eq!(report.available["memory"], 12e9);
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let runtime = HttpClusterRuntime::new(&server.uri());
        assert!(matches!(
            runtime.resources().await,
            Err(RuntimeError::Status(503))
        ));
    }
}
