//! Error taxonomy for prediction requests

use crate::encoding::EncodingError;
use crate::models::Task;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictionError {
    /// A required field is missing or not a number
    #[error("{0}")]
    InvalidInput(String),

    /// The model for the task failed to load at startup
    #[error("{0} model not loaded")]
    ModelUnavailable(Task),

    /// The predictor rejected the record or produced unusable output
    #[error("{0}")]
    InferenceFailure(String),

    /// The model returned a code the encoding tables cannot resolve
    #[error(transparent)]
    EncodingMismatch(#[from] EncodingError),
}

impl PredictionError {
    pub fn missing_field(field: &str) -> Self {
        Self::InvalidInput(format!("missing field '{}'", field))
    }

    pub fn not_a_number(field: &str, value: &str, expected: &str) -> Self {
        Self::InvalidInput(format!(
            "field '{}' must be {}, got '{}'",
            field, expected, value
        ))
    }

    pub fn inference(err: impl std::fmt::Display) -> Self {
        Self::InferenceFailure(err.to_string())
    }

    /// Stable identifier used for metric labels and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::InvalidInput(_) => "invalid_input",
            PredictionError::ModelUnavailable(_) => "model_unavailable",
            PredictionError::InferenceFailure(_) => "inference_failure",
            PredictionError::EncodingMismatch(_) => "encoding_mismatch",
        }
    }
}

pub type PredictionResult<T> = std::result::Result<T, PredictionError>;
