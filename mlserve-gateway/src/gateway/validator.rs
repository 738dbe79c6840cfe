//! Payload validation against a model's declared input contract.

use mlserve_common::{DType, InputShape, PredictionRequest};
use serde_json::Value;
use thiserror::Error;

use crate::config::ValidationConfig;

use super::ModelEntry;

/// Client-caused payload errors. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Batch is empty (index {index})")]
    EmptyBatch { index: usize },

    #[error("Batch item {index} exceeds the maximum batch size of {max}")]
    BatchTooLarge { index: usize, max: usize },

    #[error("Batch item {index} has {actual} values, expected {expected}")]
    ShapeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Batch item {index}, value {position}: {reason}")]
    TypeError {
        index: usize,
        position: usize,
        reason: String,
    },

    #[error("Model input shape {dims:?} has no elements or is too large")]
    InvalidShape { dims: Vec<usize> },
}

impl ValidationError {
    /// Index of the offending batch item.
    pub fn index(&self) -> usize {
        match self {
            ValidationError::EmptyBatch { index }
            | ValidationError::BatchTooLarge { index, .. }
            | ValidationError::ShapeMismatch { index, .. }
            | ValidationError::TypeError { index, .. } => *index,
            ValidationError::InvalidShape { .. } => 0,
        }
    }
}

/// A batch that passed validation for a specific model.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayload {
    rows: Vec<Vec<f32>>,
}

impl ValidatedPayload {
    pub(crate) fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn batch_size(&self) -> usize {
        self.rows.len()
    }
}

/// Checks request tensors against a model's input shape and value bounds.
#[derive(Debug, Clone)]
pub struct PayloadValidator {
    min_value: f32,
    max_value: f32,
    max_batch_size: usize,
}

impl PayloadValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            min_value: config.min_value,
            max_value: config.max_value,
            max_batch_size: config.max_batch_size,
        }
    }

    /// Validate a request for the given model. Pure: no state is touched.
    pub fn validate(
        &self,
        entry: &ModelEntry,
        request: PredictionRequest,
    ) -> Result<ValidatedPayload, ValidationError> {
        let rows = request.data;
        if rows.is_empty() {
            return Err(ValidationError::EmptyBatch { index: 0 });
        }
        if self.max_batch_size > 0 && rows.len() > self.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                index: self.max_batch_size,
                max: self.max_batch_size,
            });
        }

        let shape = &entry.metadata.input_shape;
        let expected = shape
            .flattened_size()
            .ok_or_else(|| ValidationError::InvalidShape {
                dims: shape.dims.clone(),
            })?;

        let mut validated = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(ValidationError::ShapeMismatch {
                    index,
                    expected,
                    actual: row.len(),
                });
            }
            validated.push(self.parse_row(shape, index, row)?);
        }

        Ok(ValidatedPayload { rows: validated })
    }

    fn parse_row(&self, shape: &InputShape, index: usize, row: &[Value]) -> Result<Vec<f32>, ValidationError> {
        let mut values = Vec::with_capacity(row.len());
        for (position, raw) in row.iter().enumerate() {
            let Some(value) = raw.as_f64().map(|v| v as f32) else {
                return Err(ValidationError::TypeError {
                    index,
                    position,
                    reason: format!("expected a number, got {}", json_kind(raw)),
                });
            };

            let reason = if !value.is_finite() {
                Some(format!("{} is not a finite number", value))
            } else if value < self.min_value || value > self.max_value {
                Some(format!(
                    "{} is outside the plausible range [{}, {}]",
                    value, self.min_value, self.max_value
                ))
            } else if shape.dtype == DType::Uint8 && (value.fract() != 0.0 || !(0.0..=255.0).contains(&value)) {
                Some(format!("{} is not a valid uint8 value", value))
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(ValidationError::TypeError {
                    index,
                    position,
                    reason,
                });
            }
            values.push(value);
        }
        Ok(values)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
