//! Model registry for tracking deployed models.
//!
//! Each entry is guarded by its own lock, so status transitions on one model
//! never serialize traffic to another. The name index has its own lock that
//! is only held for lookups and insertions. Lock order is always index, then entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mlserve_common::{InputShape, ModelInfo, ModelStatus, ModelTraffic};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::HealthConfig;
use crate::serving::ModelHandle;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Model '{0}' is already registered")]
    DuplicateModel(String),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Registry entry for '{name}' is corrupt: {reason}")]
    RegistryCorruption { name: String, reason: String },

    #[error("Invalid model name '{0}': use 1-128 ASCII letters, digits, '-', '_' or '.'")]
    InvalidModelName(String),

    #[error("Model '{name}' declares input shape {dims:?}, which has no elements or is too large")]
    InvalidInputShape { name: String, dims: Vec<usize> },
}

const MAX_NAME_LEN: usize = 128;

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Descriptive metadata supplied at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub version: String,
    pub framework: Option<String>,
    pub description: Option<String>,
    pub input_shape: InputShape,
    /// Models in the same family can stand in for each other.
    pub family: Option<String>,
}

/// Request counters for one model. Updated without taking the entry lock.
#[derive(Debug, Default)]
pub struct ModelCounters {
    requests: AtomicU64,
    failures: AtomicU64,
    latency_ms_total: AtomicU64,
}

impl ModelCounters {
    /// Record one forwarded request.
    pub fn record(&self, latency: Duration, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms_total
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn latency_ms_total(&self) -> u64 {
        self.latency_ms_total.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> Option<f64> {
        match self.requests() {
            0 => None,
            n => Some(self.latency_ms_total() as f64 / n as f64),
        }
    }
}

/// Consistent copy of a registry entry.
///
/// `handle` is only present while the model is ready or degraded.
#[derive(Clone)]
pub struct ModelEntry {
    pub name: String,
    pub handle: Option<Arc<dyn ModelHandle>>,
    pub status: ModelStatus,
    pub metadata: ModelMetadata,
    pub registered_at: DateTime<Utc>,
    pub counters: Arc<ModelCounters>,
}

impl ModelEntry {
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            version: self.metadata.version.clone(),
            status: self.status,
            framework: self.metadata.framework.clone(),
            description: self.metadata.description.clone(),
            input_shape: self.metadata.input_shape.clone(),
            family: self.metadata.family.clone(),
        }
    }

    pub fn traffic(&self) -> ModelTraffic {
        ModelTraffic {
            model: self.name.clone(),
            status: self.status,
            requests: self.counters.requests(),
            failures: self.counters.failures(),
            avg_latency_ms: self.counters.avg_latency_ms(),
        }
    }
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("name", &self.name)
            .field("handle", &self.handle.as_ref().map(|h| h.describe()))
            .field("status", &self.status)
            .field("metadata", &self.metadata)
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// Thresholds driving health-probe status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive failures that move `ready` to `degraded`.
    pub degrade_after: u32,
    /// Further consecutive failures that move `degraded` to `removed`.
    pub remove_after: u32,
}

impl HealthPolicy {
    fn removal_threshold(&self) -> u32 {
        self.degrade_after.saturating_add(self.remove_after)
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degrade_after: 3,
            remove_after: 3,
        }
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            degrade_after: config.degrade_after.max(1),
            remove_after: config.remove_after.max(1),
        }
    }
}

/// A handle due for a health probe.
#[derive(Clone)]
pub struct ProbeTarget {
    pub name: String,
    /// Registration generation; stale probe results are discarded.
    pub generation: u64,
    pub handle: Arc<dyn ModelHandle>,
}

struct SlotState {
    status: ModelStatus,
    metadata: ModelMetadata,
    // Held from registration until removal; exposed only while ready/degraded.
    handle: Option<Arc<dyn ModelHandle>>,
    consecutive_failures: u32,
    generation: u64,
    registered_at: DateTime<Utc>,
}

impl SlotState {
    fn corruption(&self) -> Option<&'static str> {
        if self.status != ModelStatus::Removed && self.handle.is_none() {
            Some("active entry has no backend handle")
        } else {
            None
        }
    }

    fn remove(&mut self) {
        self.status = ModelStatus::Removed;
        self.handle = None;
    }
}

struct Slot {
    name: String,
    state: RwLock<SlotState>,
    counters: Arc<ModelCounters>,
}

impl Slot {
    fn entry(&self, state: &SlotState) -> ModelEntry {
        ModelEntry {
            name: self.name.clone(),
            handle: if state.status.holds_handle() {
                state.handle.clone()
            } else {
                None
            },
            status: state.status,
            metadata: state.metadata.clone(),
            registered_at: state.registered_at,
            counters: self.counters.clone(),
        }
    }
}

#[derive(Default)]
struct Index {
    order: Vec<Arc<Slot>>,
    by_name: HashMap<String, Arc<Slot>>,
}

/// Registry of deployed models, keyed by name, in registration order.
#[derive(Default)]
pub struct ModelRegistry {
    index: RwLock<Index>,
    generations: AtomicU64,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. The entry starts in `loading` until a health probe succeeds.
    ///
    /// A name whose previous entry was removed is reused in place, keeping its
    /// position and counters. Names and input shapes are checked before anything
    /// is stored.
    pub async fn register(
        &self,
        name: &str,
        handle: Arc<dyn ModelHandle>,
        metadata: ModelMetadata,
    ) -> Result<(), RegistryError> {
        if !valid_name(name) {
            return Err(RegistryError::InvalidModelName(name.to_string()));
        }
        if metadata.input_shape.flattened_size().is_none() {
            return Err(RegistryError::InvalidInputShape {
                name: name.to_string(),
                dims: metadata.input_shape.dims.clone(),
            });
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let fresh = SlotState {
            status: ModelStatus::Loading,
            metadata,
            handle: Some(handle),
            consecutive_failures: 0,
            generation,
            registered_at: Utc::now(),
        };

        let mut index = self.index.write().await;
        if let Some(slot) = index.by_name.get(name) {
            let mut state = slot.state.write().await;
            if state.status != ModelStatus::Removed {
                return Err(RegistryError::DuplicateModel(name.to_string()));
            }
            *state = fresh;
        } else {
            let slot = Arc::new(Slot {
                name: name.to_string(),
                state: RwLock::new(fresh),
                counters: Arc::new(ModelCounters::default()),
            });
            index.order.push(slot.clone());
            index.by_name.insert(name.to_string(), slot);
        }

        tracing::info!(model = %name, generation, "Model registered");
        Ok(())
    }

    /// Look up a model by name.
    ///
    /// A corrupt entry is force-deregistered and reported as `RegistryCorruption`.
    pub async fn resolve(&self, name: &str) -> Result<ModelEntry, RegistryError> {
        let slot = self
            .slot(name)
            .await
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))?;

        {
            let state = slot.state.read().await;
            if state.corruption().is_none() {
                return Ok(slot.entry(&state));
            }
        }

        Err(Self::force_deregister(&slot).await)
    }

    /// All entries in registration order, removed ones included.
    pub async fn list(&self) -> Vec<ModelEntry> {
        let slots = self.index.read().await.order.clone();
        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.state.read().await;
            entries.push(slot.entry(&state));
        }
        entries
    }

    /// Mark a model removed and drop its handle. Calling it again is a no-op.
    pub async fn deregister(&self, name: &str) -> Result<(), RegistryError> {
        let slot = self
            .slot(name)
            .await
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))?;

        let mut state = slot.state.write().await;
        if state.status != ModelStatus::Removed {
            state.remove();
            tracing::info!(model = %name, "Model deregistered");
        }
        Ok(())
    }

    /// Handles of every entry that should be probed (loading, ready, degraded).
    ///
    /// Corrupt entries found along the way are force-deregistered.
    pub async fn probe_targets(&self) -> Vec<ProbeTarget> {
        let slots = self.index.read().await.order.clone();
        let mut targets = Vec::new();
        for slot in slots {
            let target = {
                let state = slot.state.read().await;
                if state.status == ModelStatus::Removed {
                    continue;
                }
                state.handle.clone().map(|handle| ProbeTarget {
                    name: slot.name.clone(),
                    generation: state.generation,
                    handle,
                })
            };
            match target {
                Some(target) => targets.push(target),
                None => {
                    Self::force_deregister(&slot).await;
                }
            }
        }
        targets
    }

    /// Apply a health-probe outcome. Returns the new status when it changed.
    ///
    /// Outcomes for a previous registration of the same name are ignored.
    pub async fn record_probe(
        &self,
        target: &ProbeTarget,
        healthy: bool,
        policy: &HealthPolicy,
    ) -> Option<ModelStatus> {
        let slot = self.slot(&target.name).await?;
        let mut state = slot.state.write().await;
        if state.generation != target.generation || state.status == ModelStatus::Removed {
            return None;
        }

        let previous = state.status;
        if healthy {
            state.consecutive_failures = 0;
            state.status = ModelStatus::Ready;
        } else {
            state.consecutive_failures += 1;
            let failures = state.consecutive_failures;
            match previous {
                ModelStatus::Ready if failures >= policy.degrade_after => {
                    state.status = ModelStatus::Degraded;
                }
                ModelStatus::Loading | ModelStatus::Degraded
                    if failures >= policy.removal_threshold() =>
                {
                    state.remove();
                    tracing::error!(
                        model = %target.name,
                        failures,
                        "Model removed after repeated failed health probes"
                    );
                }
                _ => {}
            }
        }

        if state.status == previous {
            return None;
        }
        if state.status != ModelStatus::Removed {
            tracing::info!(
                model = %target.name,
                from = %previous,
                to = %state.status,
                "Model status changed"
            );
        }
        Some(state.status)
    }

    /// Name of a ready model in the same family, if any.
    pub async fn ready_alternative(&self, entry: &ModelEntry) -> Option<String> {
        let family = entry.metadata.family.as_deref()?;
        self.list()
            .await
            .into_iter()
            .find(|other| {
                other.name != entry.name
                    && other.status == ModelStatus::Ready
                    && other.metadata.family.as_deref() == Some(family)
            })
            .map(|other| other.name)
    }

    /// Whether at least one model is ready to serve.
    pub async fn has_ready(&self) -> bool {
        self.list()
            .await
            .iter()
            .any(|entry| entry.status == ModelStatus::Ready)
    }

    /// Request counters for every entry.
    pub async fn traffic(&self) -> Vec<ModelTraffic> {
        self.list().await.iter().map(ModelEntry::traffic).collect()
    }

    async fn slot(&self, name: &str) -> Option<Arc<Slot>> {
        self.index.read().await.by_name.get(name).cloned()
    }

    async fn force_deregister(slot: &Slot) -> RegistryError {
        let mut state = slot.state.write().await;
        let reason = state
            .corruption()
            .unwrap_or("entry changed while being repaired")
            .to_string();
        state.remove();
        tracing::error!(model = %slot.name, %reason, "Corrupt registry entry force-deregistered");
        RegistryError::RegistryCorruption {
            name: slot.name.clone(),
            reason,
        }
    }
}
