//! Test doubles and fixtures shared by unit and integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mlserve_common::{InputShape, ModelStatus};

use crate::cluster::{ClusterRuntime, ResourceReport, RuntimeError};
use crate::config::{
    ApiConfig, ClusterConfig, Config, HealthConfig, LoggingConfig, RouterConfig, ValidationConfig,
};
use crate::gateway::{ModelEntry, ModelMetadata, PayloadValidator, ValidatedPayload};
use crate::serving::{BackendError, BackendItem, BackendOutput, ModelHandle, RawClassPrediction};

/// In-memory model handle returning three unranked classes per batch item.
pub struct MockModelHandle {
    healthy: AtomicBool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockModelHandle {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// A handle whose `predict` takes `delay` to answer.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            healthy: AtomicBool::new(true),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// When unhealthy, both `predict` and `health_check` fail.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `predict` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("mock backend is down".to_string()))
        }
    }
}

impl Default for MockModelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelHandle for MockModelHandle {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    async fn predict(&self, payload: &ValidatedPayload) -> Result<BackendOutput, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check()?;

        let item = || BackendItem::Wrapped {
            predictions: vec![
                class(0, "tench", 0.1),
                class(1, "goldfish", 0.6),
                class(2, "great white shark", 0.3),
            ],
        };
        Ok(BackendOutput::Wrapped {
            predictions: (0..payload.batch_size()).map(|_| item()).collect(),
        })
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        self.check()
    }
}

fn class(class_id: u32, name: &str, confidence: f32) -> RawClassPrediction {
    RawClassPrediction {
        class_id,
        class_name: Some(name.to_string()),
        confidence,
    }
}

/// Cluster runtime reporting a fixed CPU total/availability.
pub struct MockClusterRuntime {
    healthy: AtomicBool,
    total_cpu: f64,
    available_cpu: f64,
}

impl MockClusterRuntime {
    pub fn new(total_cpu: f64, available_cpu: f64) -> Self {
        Self {
            healthy: AtomicBool::new(true),
            total_cpu,
            available_cpu,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterRuntime for MockClusterRuntime {
    async fn resources(&self) -> Result<ResourceReport, RuntimeError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable("mock runtime is down".to_string()));
        }
        Ok(ResourceReport {
            total: [("CPU".to_string(), self.total_cpu)].into_iter().collect(),
            available: [("CPU".to_string(), self.available_cpu)].into_iter().collect(),
        })
    }
}

pub fn test_metadata(dims: Vec<usize>) -> ModelMetadata {
    ModelMetadata {
        version: "1.0".to_string(),
        framework: Some("pytorch".to_string()),
        description: None,
        input_shape: InputShape::new(dims),
        family: None,
    }
}

/// A ready entry backed by a `MockModelHandle`.
pub fn test_entry(name: &str, dims: Vec<usize>) -> ModelEntry {
    ModelEntry {
        name: name.to_string(),
        handle: Some(Arc::new(MockModelHandle::new())),
        status: ModelStatus::Ready,
        metadata: test_metadata(dims),
        registered_at: Utc::now(),
        counters: Default::default(),
    }
}

pub fn test_validator() -> PayloadValidator {
    PayloadValidator::new(&ValidationConfig::default())
}

pub fn validated(rows: Vec<Vec<f32>>) -> ValidatedPayload {
    ValidatedPayload::from_rows(rows)
}

/// Configuration with no startup models and no cluster polling.
pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            ..ApiConfig::default()
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        validation: ValidationConfig::default(),
        router: RouterConfig::default(),
        health: HealthConfig::default(),
        cluster: ClusterConfig::default(),
        models: vec![],
    }
}
