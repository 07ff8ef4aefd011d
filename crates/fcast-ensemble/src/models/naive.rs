use fcast_model::{ModelId, PredictionSet};

use super::{FittedModel, Forecaster, ModelResult, banded, require_len, residual_sigma};
use crate::series::TrainingSeries;

/// Repeats the last observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Naive;

struct FittedNaive {
    last: f64,
    sigma: f64,
}

impl Forecaster for Naive {
    fn id(&self) -> ModelId {
        ModelId::Naive
    }

    fn prior(&self) -> f64 {
        0.9
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        require_len(series, 1)?;
        let values = &series.values;
        let last = values[values.len() - 1];
        // Residuals of a random walk are the first differences.
        let sigma = residual_sigma(values.windows(2).map(|pair| pair[1] - pair[0]));
        Ok(Box::new(FittedNaive { last, sigma }))
    }
}

impl FittedModel for FittedNaive {
    fn predict(&self, horizon: usize, level: f64) -> ModelResult<PredictionSet> {
        Ok(banded(vec![self.last; horizon], self.sigma, level, |h| {
            (h as f64).sqrt()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::z_score;
    use chrono::NaiveDate;

    #[test]
    fn naive_repeats_last_value_with_widening_bands() {
        let series = TrainingSeries::from_values(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            vec![1.0, 3.0, 1.0, 3.0],
        );
        let fitted = Naive.fit(&series).unwrap();
        let set = fitted.predict(2, 0.95).unwrap();
        assert_eq!(set.predictions, vec![3.0, 3.0]);
        let z = z_score(0.95);
        assert!((set.upper_bound[0] - (3.0 + 2.0 * z)).abs() < 1e-9);
        assert!(set.upper_bound[1] - set.lower_bound[1] > set.upper_bound[0] - set.lower_bound[0]);
    }

    #[test]
    fn single_point_fits_with_zero_width() {
        let series =
            TrainingSeries::from_values(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), vec![5.0]);
        let set = Naive.fit(&series).unwrap().predict(3, 0.9).unwrap();
        assert_eq!(set.lower_bound, vec![5.0; 3]);
    }
}
