//! Error types for the data adapter.

use thiserror::Error;

/// Errors that stop a dataset from being normalized.
///
/// Heuristic misses (unparseable cells, non-numeric extras, duplicates) are
/// absorbed and reported in the `TransformReport` instead.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The table cannot be read as a time series.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl AdapterError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<polars::prelude::PolarsError> for AdapterError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
