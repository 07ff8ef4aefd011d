//! Dynamic ensemble forecasting for Forecast Studio.
//!
//! Fits every routed forecaster on its own worker thread, combines the
//! survivors with accuracy-informed weights and tracks accuracy afterwards
//! through the [`ModelMonitor`].

#![deny(unsafe_code)]

pub mod ensemble;
pub mod error;
pub mod models;
pub mod monitor;
pub mod series;
pub mod store;

pub use ensemble::{
    CancellationToken, DynamicEnsemble, EnsembleConfig, ForecastOptions,
    ProgressEvent, fit_and_predict, resolve_weights,
};
pub use error::{EnsembleError, ModelError, Result, StoreError};
pub use models::{
    BoostedLags, FittedModel, Forecaster, ForecasterRegistry, ModelResult, MovingAverage, Naive,
    TrendSeasonal, quantile_normal, z_score,
};
pub use monitor::{DriftAlert, ModelMonitor, MonitorConfig, MonitorReport, wape};
pub use series::TrainingSeries;
pub use store::{WeightStore, context_key};
