//! Model registry and inference routing.
//!
//! Requests flow validator -> router -> registry handle lookup -> serving
//! backend. The health monitor runs independently and drives registry status.

pub mod health;
pub mod registry;
pub mod router;
pub mod validator;

pub use health::HealthMonitor;
pub use registry::{HealthPolicy, ModelCounters, ModelEntry, ModelMetadata, ModelRegistry, RegistryError};
pub use router::{InferenceRouter, RouterError};
pub use validator::{PayloadValidator, ValidatedPayload, ValidationError};
