//! Configuration for the MLServe gateway.

use std::path::Path;
use std::time::Duration;

use config::{builder::DefaultState, Config as ConfigLoader, ConfigBuilder, ConfigError, Environment, File};
use mlserve_common::{InputShape, ReplicaRange};
use serde::Deserialize;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Models registered at startup.
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prefix every API route is nested under.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Bounds applied to every value of an inbound payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_value")]
    pub min_value: f32,
    #[serde(default = "default_max_value")]
    pub max_value: f32,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_value: default_min_value(),
            max_value: default_max_value(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// How long a request may wait on the backend before it is abandoned.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Number of ranked classes kept per batch item.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            top_k: default_top_k(),
        }
    }
}

impl RouterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Health-check sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
    /// Consecutive failures that move a ready model to degraded.
    #[serde(default = "default_failure_threshold")]
    pub degrade_after: u32,
    /// Further consecutive failures that remove a degraded model.
    #[serde(default = "default_failure_threshold")]
    pub remove_after: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
            timeout_secs: default_health_timeout(),
            degrade_after: default_failure_threshold(),
            remove_after: default_failure_threshold(),
        }
    }
}

/// Serving-runtime status polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// URL returning `{"total": {...}, "available": {...}}`. Polling is off when unset.
    #[serde(default)]
    pub resources_url: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Consecutive failed polls before the cluster is reported offline.
    #[serde(default = "default_failure_threshold")]
    pub offline_after: u32,
    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            resources_url: None,
            poll_interval_secs: default_poll_interval(),
            offline_after: default_failure_threshold(),
            min_replicas: default_min_replicas(),
            max_replicas: default_max_replicas(),
        }
    }
}

impl ClusterConfig {
    pub fn replica_range(&self) -> ReplicaRange {
        ReplicaRange {
            min: self.min_replicas,
            max: self.max_replicas.max(self.min_replicas),
        }
    }
}

/// A model deployment on the serving runtime.
///
/// Used both for startup registrations and as the body of `POST /models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Prediction route of the deployment (e.g., "http://localhost:8001/ray/models/resnet").
    pub endpoint: String,
    /// Health probe URL; the prediction endpoint is probed when unset.
    #[serde(default)]
    pub health_url: Option<String>,
    #[serde(default = "default_model_version")]
    pub version: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    pub input_shape: InputShape,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_prefix() -> String {
    "/api/v1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_min_value() -> f32 {
    -1000.0
}
fn default_max_value() -> f32 {
    1000.0
}
fn default_max_batch_size() -> usize {
    64
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_top_k() -> usize {
    5
}
fn default_health_interval() -> u64 {
    10
}
fn default_health_timeout() -> u64 {
    30
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_poll_interval() -> u64 {
    5
}
fn default_min_replicas() -> u32 {
    1
}
fn default_max_replicas() -> u32 {
    3
}
fn default_model_version() -> String {
    "1.0".to_string()
}
fn default_models() -> Vec<ModelConfig> {
    vec![ModelConfig {
        name: "resnet18".to_string(),
        endpoint: "http://localhost:8001/ray/models/resnet".to_string(),
        health_url: None,
        version: "1.0".to_string(),
        framework: Some("pytorch".to_string()),
        description: Some("ResNet-18 image classification model".to_string()),
        family: Some("resnet".to_string()),
        input_shape: InputShape::new(vec![224, 224, 3]),
    }]
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MLSERVE__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("config").required(false))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from an explicit file, still honoring environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .set_default("api.prefix", default_prefix())?
            .set_default("logging.level", default_log_level())
    }

    fn environment() -> Environment {
        Environment::with_prefix("MLSERVE")
            .separator("__")
            .try_parsing(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_api_config() {
        let api = ApiConfig::default();
        assert_eq!(api.host, "0.0.0.0");
        assert_eq!(api.port, 8000);
        assert_eq!(api.prefix, "/api/v1");
    }

    #[test]
    fn test_default_health_thresholds() {
        let health = HealthConfig::default();
        assert_eq!(health.degrade_after, 3);
        assert_eq!(health.remove_after, 3);
        assert_eq!(health.interval_secs, 10);
    }

    #[test]
    fn test_default_models_include_resnet18() {
        let models = default_models();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "resnet18");
        assert_eq!(models[0].input_shape.flattened_size(), Some(150528));
    }

    #[test]
    fn test_replica_range_never_inverted() {
        let cluster = ClusterConfig {
            min_replicas: 4,
            max_replicas: 2,
            ..ClusterConfig::default()
        };
        assert_eq!(cluster.replica_range(), ReplicaRange { min: 4, max: 4 });
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
port = 9100

[router]
request_timeout_ms = 500

[cluster]
resources_url = "http://ray:8265/resources"
offline_after = 5

[[models]]
name = "tiny"
endpoint = "http://localhost:8001/tiny"
input_shape = {{ dims = [3] }}
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.api.port, 9100);
        assert_eq!(config.api.prefix, "/api/v1");
        assert_eq!(config.router.request_timeout_ms, 500);
        assert_eq!(config.router.top_k, 5);
        assert_eq!(config.cluster.offline_after, 5);
        assert_eq!(config.cluster.resources_url.as_deref(), Some("http://ray:8265/resources"));
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].name, "tiny");
        assert_eq!(config.models[0].version, "1.0");
    }
}
