//! Forecast Studio pipeline: schema analysis, normalization, routing and
//! ensemble forecasting behind one entry point.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{ConfigError, ForecastDefaults, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{
    Caveat, ForecastPipeline, ForecastRequest, LOW_CONFIDENCE_THRESHOLD, PipelineOutput,
    RunOptions, WeightSource, apply_feedback,
};
