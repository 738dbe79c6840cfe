//! Error types for the HTTP surface.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mlserve_common::ErrorBody;

use crate::gateway::{RegistryError, RouterError, ValidationError};

/// Every error an endpoint can return. Each maps to a status code and an
/// `{"kind", "detail"}` body.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] JsonRejection),
}

impl Error {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Router(err) => match err {
                RouterError::Validation(validation) => match validation {
                    ValidationError::EmptyBatch { .. } => "empty_batch",
                    ValidationError::BatchTooLarge { .. } => "batch_too_large",
                    ValidationError::ShapeMismatch { .. } => "shape_mismatch",
                    ValidationError::TypeError { .. } => "type_error",
                    ValidationError::InvalidShape { .. } => "invalid_input_shape",
                },
                RouterError::ModelNotFound(_) => "model_not_found",
                RouterError::ModelUnavailable { .. } => "model_unavailable",
                RouterError::Backend(_) => "backend_error",
                RouterError::BackendTimeout(_) => "backend_timeout",
                RouterError::RegistryCorruption { .. } => "registry_corruption",
            },
            Error::Registry(err) => match err {
                RegistryError::DuplicateModel(_) => "duplicate_model",
                RegistryError::ModelNotFound(_) => "model_not_found",
                RegistryError::RegistryCorruption { .. } => "registry_corruption",
                RegistryError::InvalidModelName(_) => "invalid_model_name",
                RegistryError::InvalidInputShape { .. } => "invalid_input_shape",
            },
            Error::MalformedBody(_) => "malformed_body",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Router(err) => match err {
                RouterError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RouterError::ModelNotFound(_) => StatusCode::NOT_FOUND,
                RouterError::ModelUnavailable { .. }
                | RouterError::Backend(_)
                | RouterError::BackendTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                RouterError::RegistryCorruption { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Registry(err) => match err {
                RegistryError::DuplicateModel(_) => StatusCode::CONFLICT,
                RegistryError::ModelNotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::RegistryCorruption { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                RegistryError::InvalidModelName(_) | RegistryError::InvalidInputShape { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            },
            Error::MalformedBody(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", self);
        }

        let body = Json(ErrorBody {
            kind: self.kind().to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let not_found: Error = RouterError::ModelNotFound("ghost".to_string()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.kind(), "model_not_found");

        let shape: Error = RouterError::from(ValidationError::ShapeMismatch {
            index: 0,
            expected: 150528,
            actual: 3,
        })
        .into();
        assert_eq!(shape.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(shape.kind(), "shape_mismatch");

        let timeout: Error = RouterError::BackendTimeout(Duration::from_secs(30)).into();
        assert_eq!(timeout.status(), StatusCode::SERVICE_UNAVAILABLE);

        let duplicate: Error = RegistryError::DuplicateModel("a".to_string()).into();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let shape: Error = RegistryError::InvalidInputShape {
            name: "a".to_string(),
            dims: vec![],
        }
        .into();
        assert_eq!(shape.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(shape.kind(), "invalid_input_shape");
    }

    #[test]
    fn test_detail_is_human_readable() {
        let err: Error = RouterError::ModelNotFound("ghost".to_string()).into();
        assert_eq!(err.to_string(), "Model 'ghost' not found");
    }
}
