use fcast_model::{ModelId, PredictionSet};

use super::{FittedModel, Forecaster, ModelResult, banded, mean, require_len, residual_sigma};
use crate::series::TrainingSeries;

/// Mean of the trailing window, projected flat.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    window: usize,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(7)
    }
}

struct FittedMovingAverage {
    level: f64,
    sigma: f64,
    window: usize,
}

impl Forecaster for MovingAverage {
    fn id(&self) -> ModelId {
        ModelId::MovingAverage
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        require_len(series, 1)?;
        let values = &series.values;
        let window = self.window.min(values.len());
        let tail = &values[values.len() - window..];
        let level = mean(tail);

        // One-step-ahead errors of the trailing mean over the history.
        let residuals = (1..values.len()).map(|t| {
            let start = t.saturating_sub(window);
            values[t] - mean(&values[start..t])
        });
        let sigma = residual_sigma(residuals);
        Ok(Box::new(FittedMovingAverage {
            level,
            sigma,
            window,
        }))
    }
}

impl FittedModel for FittedMovingAverage {
    fn predict(&self, horizon: usize, level: f64) -> ModelResult<PredictionSet> {
        let window = self.window as f64;
        Ok(banded(vec![self.level; horizon], self.sigma, level, |h| {
            (1.0 + (h as f64 - 1.0) / window).sqrt()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn averages_the_trailing_window() {
        let series = TrainingSeries::from_values(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            vec![100.0, 1.0, 2.0, 3.0],
        );
        let set = MovingAverage::new(3)
            .fit(&series)
            .unwrap()
            .predict(2, 0.95)
            .unwrap();
        assert_eq!(set.predictions, vec![2.0, 2.0]);
        assert!(set.is_well_formed());
    }

    #[test]
    fn short_series_uses_what_it_has() {
        let series =
            TrainingSeries::from_values(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), vec![4.0, 6.0]);
        let set = MovingAverage::default()
            .fit(&series)
            .unwrap()
            .predict(1, 0.95)
            .unwrap();
        assert_eq!(set.predictions, vec![5.0]);
    }
}
