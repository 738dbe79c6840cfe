//! MLServe Common Types
//!
//! Shared types used by the gateway and by clients/tooling talking to it.

pub mod cluster;
pub mod model;
pub mod prediction;

pub use cluster::{ClusterSnapshot, ClusterStatus, ModelTraffic, ReplicaRange, ResourceUsage};
pub use model::{DType, InputShape, ModelInfo, ModelStatus};
pub use prediction::{
    rank_predictions, ClassPrediction, ErrorBody, PredictionRequest, PredictionResponse,
    PredictionResult,
};
