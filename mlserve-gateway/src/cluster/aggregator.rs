//! Status aggregator: polls the runtime and publishes cluster snapshots.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mlserve_common::{ClusterSnapshot, ClusterStatus, ReplicaRange, ResourceUsage};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ClusterConfig;
use crate::gateway::ModelRegistry;

use super::runtime::{ClusterRuntime, ResourceReport};

/// Polls the serving runtime and keeps the last snapshot for on-demand reads.
///
/// The poller is the only writer; snapshots are replaced whole.
pub struct StatusAggregator {
    runtime: Option<Arc<dyn ClusterRuntime>>,
    registry: Arc<ModelRegistry>,
    poll_interval: Duration,
    offline_after: u32,
    replica_estimate: ReplicaRange,
    snapshot: watch::Sender<ClusterSnapshot>,
    consecutive_failures: AtomicU32,
}

impl StatusAggregator {
    /// Without a runtime the cluster is reported offline and only model traffic is refreshed.
    pub fn new(
        runtime: Option<Arc<dyn ClusterRuntime>>,
        registry: Arc<ModelRegistry>,
        config: &ClusterConfig,
    ) -> Self {
        let replica_estimate = config.replica_range();
        let (snapshot, _) = watch::channel(ClusterSnapshot::offline(replica_estimate));
        Self {
            runtime,
            registry,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            offline_after: config.offline_after.max(1),
            replica_estimate,
            snapshot,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Last published snapshot. Never waits on the runtime.
    pub fn snapshot(&self) -> ClusterSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ClusterSnapshot> {
        self.snapshot.subscribe()
    }

    /// Run the polling loop. The first poll starts immediately.
    pub async fn run(&self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Query the runtime once and publish the resulting snapshot.
    pub async fn poll_once(&self) -> ClusterStatus {
        let models = self.registry.traffic().await;

        let Some(runtime) = &self.runtime else {
            self.snapshot.send_modify(|snapshot| snapshot.models = models);
            return self.snapshot.borrow().status;
        };

        let next = match runtime.resources().await {
            Ok(report) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                ClusterSnapshot {
                    status: ClusterStatus::Running,
                    resources: usage(&report),
                    replica_estimate: self.replica_estimate,
                    models,
                    last_updated: Some(Utc::now()),
                    consecutive_failures: 0,
                }
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                let mut next = self.snapshot();
                next.status = if failures >= self.offline_after || next.last_updated.is_none() {
                    ClusterStatus::Offline
                } else {
                    ClusterStatus::Degraded
                };
                next.models = models;
                next.consecutive_failures = failures;
                tracing::warn!(
                    failures,
                    status = ?next.status,
                    error = %e,
                    "Cluster status poll failed, serving last snapshot"
                );
                next
            }
        };

        let status = next.status;
        self.snapshot.send_replace(next);
        status
    }
}

fn usage(report: &ResourceReport) -> BTreeMap<String, ResourceUsage> {
    report
        .total
        .iter()
        .map(|(kind, &total)| {
            let available = report.available.get(kind).copied().unwrap_or(total);
            (kind.clone(), ResourceUsage::from_totals(total, available))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockClusterRuntime;

    fn aggregator(runtime: Arc<MockClusterRuntime>, offline_after: u32) -> StatusAggregator {
        let config = ClusterConfig {
            offline_after,
            ..ClusterConfig::default()
        };
        StatusAggregator::new(
            Some(runtime as Arc<dyn ClusterRuntime>),
            Arc::new(ModelRegistry::new()),
            &config,
        )
    }

    #[tokio::test]
    async fn test_offline_before_first_poll() {
        let runtime = Arc::new(MockClusterRuntime::new(8.0, 6.0));
        let aggregator = aggregator(runtime, 3);
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.status, ClusterStatus::Offline);
        assert!(snapshot.resources.is_empty());
        assert_eq!(snapshot.replica_estimate, ReplicaRange { min: 1, max: 3 });
    }

    #[tokio::test]
    async fn test_successful_poll_computes_usage() {
        let runtime = Arc::new(MockClusterRuntime::new(8.0, 6.0));
        let aggregator = aggregator(runtime, 3);

        assert_eq!(aggregator.poll_once().await, ClusterStatus::Running);
        let snapshot = aggregator.snapshot();
        let cpu = snapshot.resources["CPU"];
        assert_eq!(cpu.used, 2.0);
        assert_eq!(cpu.utilization_percent, 25.0);
        assert!(snapshot.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_failures_degrade_then_go_offline() {
        let runtime = Arc::new(MockClusterRuntime::new(8.0, 6.0));
        let aggregator = aggregator(runtime.clone(), 3);
        aggregator.poll_once().await;
        let good = aggregator.snapshot();

        runtime.set_healthy(false);
        assert_eq!(aggregator.poll_once().await, ClusterStatus::Degraded);
        assert_eq!(aggregator.poll_once().await, ClusterStatus::Degraded);
        let degraded = aggregator.snapshot();
        assert_eq!(degraded.resources, good.resources);
        assert_eq!(degraded.last_updated, good.last_updated);
        assert_eq!(degraded.consecutive_failures, 2);

        assert_eq!(aggregator.poll_once().await, ClusterStatus::Offline);
        assert_eq!(aggregator.snapshot().resources, good.resources);

        runtime.set_healthy(true);
        assert_eq!(aggregator.poll_once().await, ClusterStatus::Running);
        assert_eq!(aggregator.snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_failure_without_prior_data_is_offline() {
        let runtime = Arc::new(MockClusterRuntime::new(8.0, 6.0));
        runtime.set_healthy(false);
        let aggregator = aggregator(runtime, 3);
        assert_eq!(aggregator.poll_once().await, ClusterStatus::Offline);
    }

    #[tokio::test]
    async fn test_readers_see_whole_snapshots() {
        let runtime = Arc::new(MockClusterRuntime::new(4.0, 1.0));
        let aggregator = aggregator(runtime, 3);
        let mut receiver = aggregator.subscribe();

        aggregator.poll_once().await;
        assert!(receiver.has_changed().unwrap());
        let snapshot = receiver.borrow_and_update().clone();
        assert_eq!(snapshot.status, ClusterStatus::Running);
        assert_eq!(snapshot.resources["CPU"].available, 1.0);
    }

    #[tokio::test]
    async fn test_without_runtime_stays_offline() {
        let aggregator =
            StatusAggregator::new(None, Arc::new(ModelRegistry::new()), &ClusterConfig::default());
        assert_eq!(aggregator.poll_once().await, ClusterStatus::Offline);
    }
}
