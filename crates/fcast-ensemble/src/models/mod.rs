//! Forecaster interface and the built-in reference models.
//!
//! The ensemble only sees [`Forecaster`] and [`FittedModel`] trait objects;
//! the numerics behind each implementation are intentionally small.

mod boosted;
mod moving_average;
mod naive;
mod registry;
mod trend;

use std::fmt;

use fcast_model::{ModelId, PredictionSet};

use crate::error::ModelError;
use crate::series::TrainingSeries;

pub use boosted::BoostedLags;
pub use moving_average::MovingAverage;
pub use naive::Naive;
pub use registry::ForecasterRegistry;
pub use trend::TrendSeasonal;

/// Result alias for model-level operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// An unfitted forecasting strategy.
///
/// Implementations are shared across worker threads, so fitting takes
/// `&self` and returns an owned fitted model.
pub trait Forecaster: Send + Sync + fmt::Debug {
    /// Identifier this forecaster is routed under.
    fn id(&self) -> ModelId;

    /// Static preference multiplied into historical ensemble weights.
    fn prior(&self) -> f64 {
        1.0
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>>;
}

/// A model trained on one series.
pub trait FittedModel: Send {
    /// Point forecasts with bounds at `level` (e.g. `0.95`).
    fn predict(&self, horizon: usize, level: f64) -> ModelResult<PredictionSet>;
}

/// Approximate standard normal quantile (Abramowitz and Stegun 26.2.23).
pub fn quantile_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let t = if p < 0.5 {
        (-2.0 * p.ln()).sqrt()
    } else {
        (-2.0 * (1.0 - p).ln()).sqrt()
    };
    let (c0, c1, c2) = (2.515517, 0.802853, 0.010328);
    let (d1, d2, d3) = (1.432788, 0.189269, 0.001308);
    let result = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);
    if p < 0.5 { -result } else { result }
}

/// Two-sided z score for a central interval at `level`.
pub fn z_score(level: f64) -> f64 {
    quantile_normal((1.0 + level) / 2.0)
}

/// Root mean square of the finite residuals; `0.0` when there are none.
///
/// Residuals are scaled by their largest magnitude first, so series near the
/// top of the `f64` range still give a finite sigma.
pub(crate) fn residual_sigma(residuals: impl IntoIterator<Item = f64>) -> f64 {
    let finite: Vec<f64> = residuals.into_iter().filter(|r| r.is_finite()).collect();
    let scale = finite.iter().fold(0.0_f64, |max, r| max.max(r.abs()));
    if finite.is_empty() || scale == 0.0 {
        return 0.0;
    }
    let mean_square =
        finite.iter().map(|r| (r / scale).powi(2)).sum::<f64>() / finite.len() as f64;
    scale * mean_square.sqrt()
}

/// Arithmetic mean that cannot overflow for finite inputs.
pub(crate) fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    values.iter().map(|v| v / n).sum()
}

/// Symmetric bands whose half-width at step `h` is `z * sigma * growth(h)`.
pub(crate) fn banded(
    predictions: Vec<f64>,
    sigma: f64,
    level: f64,
    growth: impl Fn(usize) -> f64,
) -> PredictionSet {
    let z = z_score(level);
    let half_widths: Vec<f64> = (1..=predictions.len())
        .map(|h| (z * sigma * growth(h)).min(f64::MAX))
        .collect();
    PredictionSet::symmetric(predictions, &half_widths)
}

pub(crate) fn require_len(series: &TrainingSeries, needed: usize) -> ModelResult<()> {
    if series.is_empty() {
        return Err(ModelError::EmptyData);
    }
    if series.len() < needed {
        return Err(ModelError::InsufficientData {
            needed,
            got: series.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_matches_tables() {
        assert!((quantile_normal(0.975) - 1.96).abs() < 1e-2);
        assert!((quantile_normal(0.5)).abs() < 1e-6);
        assert!((z_score(0.8) - 1.2816).abs() < 1e-2);
        assert_eq!(quantile_normal(1.0), f64::INFINITY);
    }

    #[test]
    fn sigma_ignores_non_finite_residuals() {
        assert_eq!(residual_sigma([f64::NAN, 3.0, -3.0]), 3.0);
        assert_eq!(residual_sigma([]), 0.0);
        assert_eq!(residual_sigma([0.0, 0.0]), 0.0);
    }

    #[test]
    fn sigma_and_mean_stay_finite_for_huge_values() {
        let sigma = residual_sigma([2e200, -2e200, 2e200]);
        assert!((sigma / 2e200 - 1.0).abs() < 1e-12);
        assert!(residual_sigma([f64::MAX, -f64::MAX]).is_finite());
        assert_eq!(mean(&[f64::MAX, f64::MAX]), f64::MAX);
    }

    #[test]
    fn bands_saturate_instead_of_overflowing() {
        let set = banded(vec![f64::MAX / 2.0; 3], f64::MAX, 0.99, |h| h as f64);
        assert!(set.is_well_formed());
        assert_eq!(set.upper_bound[2], f64::MAX);
        assert_eq!(set.lower_bound[2], f64::MIN);
    }
}
