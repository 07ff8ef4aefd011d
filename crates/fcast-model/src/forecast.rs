//! Forecast outputs, per model and combined.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cadence::Cadence;
use crate::plan::ModelId;
use crate::weights::EnsembleWeights;

/// Point forecasts with interval bounds of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub predictions: Vec<f64>,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
}

impl PredictionSet {
    pub fn new(predictions: Vec<f64>, lower_bound: Vec<f64>, upper_bound: Vec<f64>) -> Self {
        Self {
            predictions,
            lower_bound,
            upper_bound,
        }
    }

    /// Symmetric interval `point ± half_width[h]`.
    /// Bounds saturate at the finite `f64` range instead of overflowing.
    pub fn symmetric(predictions: Vec<f64>, half_widths: &[f64]) -> Self {
        let lower_bound = predictions
            .iter()
            .zip(half_widths)
            .map(|(p, w)| (p - w).max(f64::MIN))
            .collect();
        let upper_bound = predictions
            .iter()
            .zip(half_widths)
            .map(|(p, w)| (p + w).min(f64::MAX))
            .collect();
        Self::new(predictions, lower_bound, upper_bound)
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Bounds match the point forecast length and every value is finite.
    pub fn is_well_formed(&self) -> bool {
        self.lower_bound.len() == self.predictions.len()
            && self.upper_bound.len() == self.predictions.len()
            && self
                .predictions
                .iter()
                .chain(&self.lower_bound)
                .chain(&self.upper_bound)
                .all(|v| v.is_finite())
    }
}

/// Error measures against a held-out tail of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Undefined when every held-out actual is zero.
    pub mape: Option<f64>,
    pub smape: f64,
    /// Number of held-out observations.
    pub holdout: usize,
}

impl ForecastMetrics {
    /// Compare forecasts to actuals over their common length.
    pub fn evaluate(actuals: &[f64], predicted: &[f64]) -> Option<Self> {
        let n = actuals.len().min(predicted.len());
        if n == 0 {
            return None;
        }
        let errors: Vec<f64> = actuals
            .iter()
            .zip(predicted)
            .take(n)
            .map(|(actual, forecast)| actual - forecast)
            .collect();
        // Scaled so that squaring huge errors cannot overflow.
        let scale = errors.iter().fold(0.0_f64, |max, e| max.max(e.abs()));
        let mut abs_sum = 0.0;
        let mut scaled_sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_count = 0usize;
        let mut smape_sum = 0.0;
        for ((actual, forecast), error) in actuals.iter().zip(predicted).zip(&errors) {
            abs_sum += error.abs() / n as f64;
            if scale > 0.0 {
                scaled_sq_sum += (error / scale).powi(2);
            }
            if *actual != 0.0 {
                pct_sum += (error / actual).abs();
                pct_count += 1;
            }
            let denom = actual.abs() + forecast.abs();
            if denom > 0.0 {
                smape_sum += 2.0 * error.abs() / denom;
            }
        }
        let count = n as f64;
        Some(Self {
            mae: abs_sum,
            rmse: scale * (scaled_sq_sum / count).sqrt(),
            mape: (pct_count > 0).then(|| 100.0 * pct_sum / pct_count as f64),
            smape: 100.0 * smape_sum / count,
            holdout: n,
        })
    }
}

/// Output of one model that fitted and predicted successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub model: ModelId,
    pub predictions: Vec<f64>,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
    pub metrics: Option<ForecastMetrics>,
}

impl ForecastResult {
    pub fn from_predictions(
        model: ModelId,
        set: PredictionSet,
        metrics: Option<ForecastMetrics>,
    ) -> Self {
        Self {
            model,
            predictions: set.predictions,
            lower_bound: set.lower_bound,
            upper_bound: set.upper_bound,
            metrics,
        }
    }

    pub fn width_at(&self, step: usize) -> Option<f64> {
        Some(self.upper_bound.get(step)? - self.lower_bound.get(step)?)
    }
}

/// A routed model that did not contribute to the combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model: ModelId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationStrategy {
    /// Weighted combination of every surviving model.
    Ensemble,
    /// First surviving model in plan order, used alone.
    Fallback,
}

/// The single forecast handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedForecast {
    pub dates: Vec<NaiveDate>,
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub confidence_level: f64,
    pub cadence: Cadence,
    pub strategy: CombinationStrategy,
    /// Weights of the models that make up `point`.
    pub weights: EnsembleWeights,
    /// Forecasts of the models in `weights`, in plan order.
    pub components: Vec<ForecastResult>,
    pub failures: Vec<ModelFailure>,
    /// Models stopped by cancellation before they completed.
    pub cancelled: Vec<ModelId>,
}

impl CombinedForecast {
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    /// Models that contributed to the point forecast.
    pub fn models_used(&self) -> Vec<ModelId> {
        self.weights.iter().map(|(id, _)| id).collect()
    }

    pub fn component(&self, model: ModelId) -> Option<&ForecastResult> {
        self.components.iter().find(|c| c.model == model)
    }

    pub fn width_at(&self, step: usize) -> Option<f64> {
        Some(self.upper.get(step)? - self.lower.get(step)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_skip_zero_actuals_for_mape() {
        let metrics = ForecastMetrics::evaluate(&[0.0, 10.0], &[1.0, 8.0]).unwrap();
        assert!((metrics.mae - 1.5).abs() < 1e-12);
        assert_eq!(metrics.mape, Some(20.0));
        assert_eq!(metrics.holdout, 2);
        assert!(ForecastMetrics::evaluate(&[], &[1.0]).is_none());
    }

    #[test]
    fn metrics_of_huge_values_are_finite() {
        let metrics = ForecastMetrics::evaluate(&[1e200, 3e200], &[3e200, 1e200]).unwrap();
        assert!((metrics.rmse / 2e200 - 1.0).abs() < 1e-12);
        assert!((metrics.mae / 2e200 - 1.0).abs() < 1e-12);
        let metrics = ForecastMetrics::evaluate(&[3.0, 4.0], &[0.0, 0.0]).unwrap();
        assert!((metrics.rmse - 12.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn symmetric_bounds_saturate() {
        let set = PredictionSet::symmetric(vec![f64::MAX, -f64::MAX], &[f64::MAX, f64::MAX]);
        assert_eq!(set.upper_bound[0], f64::MAX);
        assert_eq!(set.lower_bound[1], f64::MIN);
        assert!(set.is_well_formed());
    }

    #[test]
    fn symmetric_prediction_set() {
        let set = PredictionSet::symmetric(vec![10.0, 20.0], &[1.0, 2.0]);
        assert_eq!(set.lower_bound, vec![9.0, 18.0]);
        assert_eq!(set.upper_bound, vec![11.0, 22.0]);
        assert!(set.is_well_formed());
    }
}
