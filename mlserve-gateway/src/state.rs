//! Shared application state.

use std::sync::Arc;

use crate::cluster::{ClusterRuntime, HttpClusterRuntime, StatusAggregator};
use crate::config::{Config, ModelConfig};
use crate::gateway::{
    HealthMonitor, InferenceRouter, ModelMetadata, ModelRegistry, PayloadValidator, RegistryError,
};
use crate::serving::HttpModelHandle;

/// Shared application state passed to all handlers.
///
/// The registry is created here and injected into the router, the health
/// monitor and the status aggregator.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ModelRegistry>,
    pub router: InferenceRouter,
    pub health_monitor: Arc<HealthMonitor>,
    pub status_aggregator: Arc<StatusAggregator>,
}

impl AppState {
    /// Build state with the cluster runtime named in the configuration, if any.
    pub fn new(config: Config) -> Self {
        let runtime = config
            .cluster
            .resources_url
            .as_deref()
            .map(|url| Arc::new(HttpClusterRuntime::new(url)) as Arc<dyn ClusterRuntime>);
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: Config, runtime: Option<Arc<dyn ClusterRuntime>>) -> Self {
        let registry = Arc::new(ModelRegistry::new());
        let router = InferenceRouter::new(
            registry.clone(),
            PayloadValidator::new(&config.validation),
            &config.router,
        );
        let health_monitor = Arc::new(HealthMonitor::new(registry.clone(), &config.health));
        let status_aggregator = Arc::new(StatusAggregator::new(
            runtime,
            registry.clone(),
            &config.cluster,
        ));

        Self {
            config,
            registry,
            router,
            health_monitor,
            status_aggregator,
        }
    }

    /// Register a deployment reachable over HTTP.
    pub async fn deploy(&self, model: &ModelConfig) -> Result<(), RegistryError> {
        let handle = Arc::new(HttpModelHandle::new(&model.endpoint, model.health_url.as_deref()));
        let metadata = ModelMetadata {
            version: model.version.clone(),
            framework: model.framework.clone(),
            description: model.description.clone(),
            input_shape: model.input_shape.clone(),
            family: model.family.clone(),
        };
        self.registry.register(&model.name, handle, metadata).await
    }

    /// Register every model listed in the configuration.
    pub async fn deploy_configured_models(&self) {
        for model in &self.config.models {
            match self.deploy(model).await {
                Ok(()) => tracing::info!(
                    model = %model.name,
                    endpoint = %model.endpoint,
                    "Registered configured model"
                ),
                Err(e) => tracing::warn!(model = %model.name, "Skipping configured model: {}", e),
            }
        }
    }
}
