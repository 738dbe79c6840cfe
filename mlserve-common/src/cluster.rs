//! Cluster status snapshot types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelStatus;

/// Overall state of the serving cluster as seen by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    /// Last poll succeeded.
    Running,
    /// Recent polls failed; data is from the last good poll.
    Degraded,
    /// Too many consecutive failures, or never polled successfully.
    Offline,
}

/// Totals for one resource kind (e.g., "CPU", "memory").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub total: f64,
    pub available: f64,
    pub used: f64,
    pub utilization_percent: f64,
}

impl ResourceUsage {
    pub fn from_totals(total: f64, available: f64) -> Self {
        let used = (total - available).max(0.0);
        let utilization_percent = if total > 0.0 {
            (used / total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            total,
            available,
            used,
            utilization_percent,
        }
    }
}

/// Configured autoscaling bounds. This is not a live replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRange {
    pub min: u32,
    pub max: u32,
}

/// Per-model request counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTraffic {
    pub model: String,
    pub status: ModelStatus,
    pub requests: u64,
    pub failures: u64,
    #[serde(default)]
    pub avg_latency_ms: Option<f64>,
}

/// Point-in-time view of cluster resources and model traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub status: ClusterStatus,
    pub resources: BTreeMap<String, ResourceUsage>,
    pub replica_estimate: ReplicaRange,
    #[serde(default)]
    pub models: Vec<ModelTraffic>,
    /// When resources were last fetched successfully.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl ClusterSnapshot {
    /// Snapshot used before the first successful poll.
    pub fn offline(replica_estimate: ReplicaRange) -> Self {
        Self {
            status: ClusterStatus::Offline,
            resources: BTreeMap::new(),
            replica_estimate,
            models: vec![],
            last_updated: None,
            consecutive_failures: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_usage_from_totals() {
        let cpu = ResourceUsage::from_totals(8.0, 6.0);
        assert_eq!(cpu.used, 2.0);
        assert_eq!(cpu.utilization_percent, 25.0);
    }

    #[test]
    fn test_resource_usage_zero_total() {
        let gpu = ResourceUsage::from_totals(0.0, 0.0);
        assert_eq!(gpu.used, 0.0);
        assert_eq!(gpu.utilization_percent, 0.0);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = ClusterSnapshot::offline(ReplicaRange { min: 1, max: 3 });
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["replica_estimate"]["min"], 1);
        assert_eq!(json["replica_estimate"]["max"], 3);
    }
}
