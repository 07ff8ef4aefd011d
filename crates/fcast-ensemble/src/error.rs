//! Error types for model fitting, ensemble runs and weight persistence.

use std::path::PathBuf;

use fcast_model::ModelFailure;
use fcast_transform::AdapterError;
use thiserror::Error;

/// Failure of a single forecaster. Never fatal to an ensemble run on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("empty input series")]
    EmptyData,

    #[error("insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("model must be fitted before prediction")]
    FitRequired,
}

/// Failure of a whole ensemble run.
#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("no model produced a forecast: {}", summarize(.failures))]
    PipelineFailure { failures: Vec<ModelFailure> },

    #[error("forecast cancelled before any model completed")]
    Cancelled,

    #[error("invalid forecast request: {message}")]
    InvalidRequest { message: String },

    #[error("could not aggregate the frame: {0}")]
    Data(#[from] AdapterError),
}

impl EnsembleError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

fn summarize(failures: &[ModelFailure]) -> String {
    if failures.is_empty() {
        return "nothing to run".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{} ({})", f.model, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reading or writing persisted weights or monitor state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, EnsembleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fcast_model::ModelId;

    #[test]
    fn pipeline_failure_lists_every_model() {
        let err = EnsembleError::PipelineFailure {
            failures: vec![
                ModelFailure {
                    model: ModelId::Prophet,
                    reason: "timed out".to_string(),
                },
                ModelFailure {
                    model: ModelId::Naive,
                    reason: "empty input series".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "no model produced a forecast: prophet (timed out), naive (empty input series)"
        );
    }
}
