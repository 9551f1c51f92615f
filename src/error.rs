use thiserror::Error;

/// Failure of a single prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    /// A required field is absent or could not be coerced. Client-side.
    #[error("invalid input: `{field}` {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// The model rejected or could not score the feature record. Server-side.
    #[error("inference failed: {0}")]
    InferenceFailure(#[from] InferenceError),
}

impl PredictError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Stable tag used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::InferenceFailure(_) => "inference_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("unknown category {value:?} for column `{column}`")]
    UnknownCategory { column: String, value: String },

    #[error("column `{column}` expected a {expected} value")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureLength { got: usize, expected: usize },

    #[error("model produced a non-finite value: {0}")]
    NonFinite(f64),

    #[error("predicted value {0} does not fit an integer price")]
    OutOfRange(f64),

    #[error("model backend error: {0}")]
    Backend(String),
}
