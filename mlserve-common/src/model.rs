//! Model metadata types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Registered, waiting for the first successful health probe.
    Loading,
    /// Healthy and serving.
    Ready,
    /// Failing health probes but still reachable.
    Degraded,
    /// Deregistered or failed irrecoverably.
    Removed,
}

impl ModelStatus {
    /// Whether a backend handle is held in this state.
    pub fn holds_handle(&self) -> bool {
        matches!(self, ModelStatus::Ready | ModelStatus::Degraded)
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Loading => write!(f, "loading"),
            ModelStatus::Ready => write!(f, "ready"),
            ModelStatus::Degraded => write!(f, "degraded"),
            ModelStatus::Removed => write!(f, "removed"),
        }
    }
}

/// Element type of a model's input tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    #[default]
    Float32,
    /// Raw pixel data; every value must be an integer in 0..=255.
    Uint8,
}

/// Expected tensor shape/dtype of a model input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    /// Tensor dimensions, e.g. `[224, 224, 3]`.
    pub dims: Vec<usize>,
    #[serde(default)]
    pub dtype: DType,
}

impl InputShape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self {
            dims,
            dtype: DType::Float32,
        }
    }

    /// Total element count when the tensor is flattened.
    ///
    /// `None` when the shape is unusable: no dims, a zero dim, or a product that
    /// overflows `usize`.
    pub fn flattened_size(&self) -> Option<usize> {
        if self.dims.is_empty() {
            return None;
        }
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| match dim {
                0 => None,
                _ => acc.checked_mul(dim),
            })
    }
}

/// Public view of a registry entry, as returned by `GET /models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub status: ModelStatus,
    /// Training framework (e.g., "pytorch").
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub input_shape: InputShape,
    /// Family used to find healthier alternatives (e.g., "resnet").
    #[serde(default)]
    pub family: Option<String>,
}
