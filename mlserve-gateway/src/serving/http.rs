//! HTTP model handle for deployments exposed by the serving runtime.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{BackendError, BackendOutput, ModelHandle};
use crate::gateway::ValidatedPayload;

/// A model deployment reachable over HTTP (e.g., a Ray Serve route).
pub struct HttpModelHandle {
    http_client: Client,
    endpoint: String,
    health_url: String,
}

#[derive(Debug, Serialize)]
struct DeploymentRequest<'a> {
    data: &'a [Vec<f32>],
}

impl HttpModelHandle {
    pub fn new(endpoint: &str, health_url: Option<&str>) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let health_url = health_url
            .map(|url| url.to_string())
            .unwrap_or_else(|| endpoint.clone());
        Self {
            http_client: Client::new(),
            endpoint,
            health_url,
        }
    }
}

#[async_trait]
impl ModelHandle for HttpModelHandle {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn predict(&self, payload: &ValidatedPayload) -> Result<BackendOutput, BackendError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&DeploymentRequest {
                data: payload.rows(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<BackendOutput>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self.http_client.get(&self.health_url).send().await?;

        // Routes that only accept POST still prove the deployment is up.
        if response.status().is_server_error() {
            Err(BackendError::Unavailable(format!(
                "{} returned {}",
                self.health_url,
                response.status()
            )))
        } else {
            Ok(())
        }
    }
}
