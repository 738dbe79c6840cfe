//! Periodic health-check sweep over registered models.

use std::sync::Arc;
use std::time::Duration;

use mlserve_common::ModelStatus;
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::config::HealthConfig;

use super::registry::{HealthPolicy, ModelRegistry, ProbeTarget};

/// Probes every live registry entry on a fixed cadence, off the request path.
pub struct HealthMonitor {
    registry: Arc<ModelRegistry>,
    policy: HealthPolicy,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ModelRegistry>, config: &HealthConfig) -> Self {
        Self {
            registry,
            policy: HealthPolicy::from(config),
            interval: Duration::from_secs(config.interval_secs.max(1)),
            probe_timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Run the sweep loop. The first sweep starts immediately.
    pub async fn run(&self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let probed = self.sweep().await;
            tracing::debug!(probed, "Health sweep finished");
        }
    }

    /// Probe all loading, ready and degraded models concurrently.
    ///
    /// Returns the number of models probed.
    pub async fn sweep(&self) -> usize {
        let targets = self.registry.probe_targets().await;
        let count = targets.len();

        let mut probes = JoinSet::new();
        for target in targets {
            let probe_timeout = self.probe_timeout;
            probes.spawn(async move {
                let healthy = check(&target, probe_timeout).await;
                (target, healthy)
            });
        }

        while let Some(result) = probes.join_next().await {
            match result {
                Ok((target, healthy)) => {
                    self.registry
                        .record_probe(&target, healthy, &self.policy)
                        .await;
                }
                Err(e) => tracing::warn!("Health probe task failed: {}", e),
            }
        }

        count
    }

    /// Probe a single model right away (e.g., just after it was registered).
    pub async fn probe(&self, name: &str) -> Option<ModelStatus> {
        let target = self
            .registry
            .probe_targets()
            .await
            .into_iter()
            .find(|t| t.name == name)?;
        let healthy = check(&target, self.probe_timeout).await;
        self.registry
            .record_probe(&target, healthy, &self.policy)
            .await
    }
}

async fn check(target: &ProbeTarget, probe_timeout: Duration) -> bool {
    match timeout(probe_timeout, target.handle.health_check()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(model = %target.name, error = %e, "Health probe failed");
            false
        }
        Err(_) => {
            tracing::warn!(
                model = %target.name,
                timeout_secs = probe_timeout.as_secs(),
                "Health probe timed out"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{test_metadata, MockModelHandle};

    fn monitor(registry: Arc<ModelRegistry>) -> HealthMonitor {
        HealthMonitor::new(registry, &HealthConfig::default())
    }

    #[tokio::test]
    async fn test_sweep_promotes_loading_models() {
        let registry = Arc::new(ModelRegistry::new());
        registry
            .register("a", Arc::new(MockModelHandle::new()), test_metadata(vec![3]))
            .await
            .unwrap();

        assert_eq!(monitor(registry.clone()).sweep().await, 1);
        assert_eq!(registry.resolve("a").await.unwrap().status, ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_sweep_degrades_after_three_failures() {
        let registry = Arc::new(ModelRegistry::new());
        let handle = Arc::new(MockModelHandle::new());
        registry
            .register("a", handle.clone(), test_metadata(vec![3]))
            .await
            .unwrap();
        let monitor = monitor(registry.clone());
        monitor.sweep().await;

        handle.set_healthy(false);
        monitor.sweep().await;
        monitor.sweep().await;
        assert_eq!(registry.resolve("a").await.unwrap().status, ModelStatus::Ready);
        monitor.sweep().await;
        assert_eq!(registry.resolve("a").await.unwrap().status, ModelStatus::Degraded);
    }

    #[tokio::test]
    async fn test_sweep_isolates_models() {
        let registry = Arc::new(ModelRegistry::new());
        let broken = Arc::new(MockModelHandle::new());
        broken.set_healthy(false);
        registry
            .register("broken", broken, test_metadata(vec![3]))
            .await
            .unwrap();
        registry
            .register("fine", Arc::new(MockModelHandle::new()), test_metadata(vec![3]))
            .await
            .unwrap();

        let monitor = monitor(registry.clone());
        for _ in 0..6 {
            monitor.sweep().await;
        }

        assert_eq!(registry.resolve("broken").await.unwrap().status, ModelStatus::Removed);
        assert_eq!(registry.resolve("fine").await.unwrap().status, ModelStatus::Ready);
        assert_eq!(monitor.sweep().await, 1);
    }

    #[tokio::test]
    async fn test_probe_single_model() {
        let registry = Arc::new(ModelRegistry::new());
        registry
            .register("a", Arc::new(MockModelHandle::new()), test_metadata(vec![3]))
            .await
            .unwrap();

        let monitor = monitor(registry.clone());
        assert_eq!(monitor.probe("a").await, Some(ModelStatus::Ready));
        assert_eq!(monitor.probe("missing").await, None);
    }
}
