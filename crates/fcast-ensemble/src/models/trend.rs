use fcast_model::{ModelId, PredictionSet};

use super::{FittedModel, Forecaster, ModelResult, banded, require_len, residual_sigma};
use crate::error::ModelError;
use crate::series::TrainingSeries;

/// Linear trend plus additive seasonal profile, routed as `prophet`.
///
/// The seasonal period comes from the series cadence and is only used when
/// at least two full cycles are observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendSeasonal;

const MIN_POINTS: usize = 4;

struct FittedTrend {
    intercept: f64,
    slope: f64,
    seasonal: Vec<f64>,
    sigma: f64,
    n: usize,
}

impl FittedTrend {
    fn at(&self, t: usize) -> f64 {
        let season = if self.seasonal.is_empty() {
            0.0
        } else {
            self.seasonal[t % self.seasonal.len()]
        };
        self.intercept + self.slope * t as f64 + season
    }
}

/// Ordinary least squares of `values` on `0..n`.
fn linear_fit(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len() as f64;
    let mean_t = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (t, y) in values.iter().enumerate() {
        let dt = t as f64 - mean_t;
        sxy += dt * (y - mean_y);
        sxx += dt * dt;
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((mean_y - slope * mean_t, slope))
}

impl Forecaster for TrendSeasonal {
    fn id(&self) -> ModelId {
        ModelId::Prophet
    }

    fn prior(&self) -> f64 {
        1.2
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        require_len(series, MIN_POINTS)?;
        let values = &series.values;
        let (intercept, slope) = linear_fit(values)
            .ok_or_else(|| ModelError::Computation("degenerate time index".to_string()))?;
        let detrended: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(t, y)| y - (intercept + slope * t as f64))
            .collect();

        let period = series
            .cadence
            .seasonal_period()
            .filter(|p| *p >= 2 && values.len() >= 2 * p);
        let seasonal = match period {
            Some(period) => {
                let mut sums = vec![0.0; period];
                let mut counts = vec![0usize; period];
                for (t, r) in detrended.iter().enumerate() {
                    sums[t % period] += r;
                    counts[t % period] += 1;
                }
                let profile: Vec<f64> = sums
                    .iter()
                    .zip(&counts)
                    .map(|(s, c)| s / (*c).max(1) as f64)
                    .collect();
                let center = profile.iter().sum::<f64>() / period as f64;
                profile.into_iter().map(|s| s - center).collect()
            }
            None => Vec::new(),
        };

        let mut fitted = FittedTrend {
            intercept,
            slope,
            seasonal,
            sigma: 0.0,
            n: values.len(),
        };
        fitted.sigma = residual_sigma(values.iter().enumerate().map(|(t, y)| y - fitted.at(t)));
        if !fitted.sigma.is_finite() || !slope.is_finite() {
            return Err(ModelError::Computation("non-finite trend fit".to_string()));
        }
        Ok(Box::new(fitted))
    }
}

impl FittedModel for FittedTrend {
    fn predict(&self, horizon: usize, level: f64) -> ModelResult<PredictionSet> {
        let predictions = (0..horizon).map(|h| self.at(self.n + h)).collect();
        let n = self.n as f64;
        Ok(banded(predictions, self.sigma, level, |h| {
            (1.0 + h as f64 / n).sqrt()
        }))
    }
}
