//! Cluster status aggregation.
//!
//! A background poller queries the serving runtime for resource totals and
//! publishes a whole `ClusterSnapshot` at a time; readers only ever see the
//! last published snapshot.

mod aggregator;
mod runtime;

pub use aggregator::StatusAggregator;
pub use runtime::{ClusterRuntime, HttpClusterRuntime, ResourceReport, RuntimeError};
