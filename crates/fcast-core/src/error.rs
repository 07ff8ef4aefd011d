//! Errors surfaced by a pipeline run.

use fcast_ensemble::EnsembleError;
use fcast_transform::AdapterError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Ensemble(#[from] EnsembleError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
