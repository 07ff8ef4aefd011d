use fcast_model::{ModelId, PredictionSet};

use super::{FittedModel, Forecaster, ModelResult, banded, require_len, residual_sigma};
use crate::error::ModelError;
use crate::series::TrainingSeries;

/// Gradient-boosted decision stumps over lagged targets and regressors,
/// routed as `xgboost`.
///
/// Regressors are held at their last observed value over the horizon.
#[derive(Debug, Clone, Copy)]
pub struct BoostedLags {
    pub lags: usize,
    pub rounds: usize,
    pub learning_rate: f64,
}

impl Default for BoostedLags {
    fn default() -> Self {
        Self {
            lags: 3,
            rounds: 60,
            learning_rate: 0.1,
        }
    }
}

const MAX_SPLITS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Stump {
    feature: usize,
    threshold: f64,
    left: f64,
    right: f64,
}

impl Stump {
    fn eval(&self, features: &[f64]) -> f64 {
        if features[self.feature] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

struct FittedBoosted {
    lags: usize,
    base: f64,
    learning_rate: f64,
    stumps: Vec<Stump>,
    history: Vec<f64>,
    regressors: Vec<f64>,
    sigma: f64,
}

impl FittedBoosted {
    fn score(&self, features: &[f64]) -> f64 {
        self.base
            + self.learning_rate * self.stumps.iter().map(|s| s.eval(features)).sum::<f64>()
    }
}

fn features_at(values: &[f64], regressors: &[f64], lags: usize) -> Vec<f64> {
    let n = values.len();
    (1..=lags)
        .map(|k| values[n - k])
        .chain(regressors.iter().copied())
        .collect()
}

/// Candidate thresholds: midpoints between evenly spaced distinct values.
fn split_points(column: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    if sorted.len() < 2 {
        return Vec::new();
    }
    let step = (sorted.len() - 1).div_ceil(MAX_SPLITS).max(1);
    (0..sorted.len() - 1)
        .step_by(step)
        .map(|i| (sorted[i] + sorted[i + 1]) / 2.0)
        .collect()
}

fn best_stump(rows: &[Vec<f64>], residuals: &[f64], splits: &[Vec<f64>]) -> Option<Stump> {
    let total: f64 = residuals.iter().sum();
    let count = residuals.len() as f64;
    let mut best: Option<(f64, Stump)> = None;
    for (feature, thresholds) in splits.iter().enumerate() {
        for threshold in thresholds {
            let (mut left_sum, mut left_count) = (0.0, 0usize);
            for (row, r) in rows.iter().zip(residuals) {
                if row[feature] <= *threshold {
                    left_sum += r;
                    left_count += 1;
                }
            }
            let right_count = count - left_count as f64;
            if left_count == 0 || right_count == 0.0 {
                continue;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_count as f64 + right_sum * right_sum / right_count;
            if best.as_ref().is_none_or(|(g, _)| gain > *g) {
                best = Some((
                    gain,
                    Stump {
                        feature,
                        threshold: *threshold,
                        left: left_sum / left_count as f64,
                        right: right_sum / right_count,
                    },
                ));
            }
        }
    }
    best.map(|(_, stump)| stump)
}

impl Forecaster for BoostedLags {
    fn id(&self) -> ModelId {
        ModelId::Xgboost
    }

    fn prior(&self) -> f64 {
        1.3
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        let lags = self.lags.max(1);
        require_len(series, lags + 8)?;
        let values = &series.values;
        let columns: Vec<&Vec<f64>> = series.exogenous.values().collect();
        if columns.iter().any(|c| c.len() != values.len()) {
            return Err(ModelError::Computation(
                "regressor length differs from target".to_string(),
            ));
        }

        let rows: Vec<Vec<f64>> = (lags..values.len())
            .map(|t| {
                let regressors: Vec<f64> = columns.iter().map(|c| c[t]).collect();
                features_at(&values[..t], &regressors, lags)
            })
            .collect();
        let targets = &values[lags..];
        let width = rows.first().map_or(0, Vec::len);
        let splits: Vec<Vec<f64>> = (0..width)
            .map(|j| split_points(&rows.iter().map(|r| r[j]).collect::<Vec<_>>()))
            .collect();

        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predicted = vec![base; targets.len()];
        let mut stumps = Vec::with_capacity(self.rounds);
        for _ in 0..self.rounds {
            let residuals: Vec<f64> = targets.iter().zip(&predicted).map(|(y, p)| y - p).collect();
            let Some(stump) = best_stump(&rows, &residuals, &splits) else {
                break;
            };
            for (row, p) in rows.iter().zip(predicted.iter_mut()) {
                *p += self.learning_rate * stump.eval(row);
            }
            stumps.push(stump);
        }

        let sigma = residual_sigma(targets.iter().zip(&predicted).map(|(y, p)| y - p));
        if !sigma.is_finite() {
            return Err(ModelError::Computation("non-finite boosting residuals".to_string()));
        }
        Ok(Box::new(FittedBoosted {
            lags,
            base,
            learning_rate: self.learning_rate,
            stumps,
            history: values.clone(),
            regressors: columns.iter().map(|c| c[c.len() - 1]).collect(),
            sigma,
        }))
    }
}

impl FittedModel for FittedBoosted {
    fn predict(&self, horizon: usize, level: f64) -> ModelResult<PredictionSet> {
        let mut history = self.history.clone();
        let mut predictions = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = self.score(&features_at(&history, &self.regressors, self.lags));
            predictions.push(next);
            history.push(next);
        }
        Ok(banded(predictions, self.sigma, level, |h| (h as f64).sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: Vec<f64>) -> TrainingSeries {
        TrainingSeries::from_values(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), values)
    }

    #[test]
    fn split_points_are_midpoints() {
        assert_eq!(split_points(&[3.0, 1.0, 2.0, 2.0]), vec![1.5, 2.5]);
        assert!(split_points(&[4.0, 4.0]).is_empty());
    }

    #[test]
    fn learns_an_alternating_pattern() {
        let values: Vec<f64> = (0..40).map(|t| if t % 2 == 0 { 10.0 } else { 20.0 }).collect();
        let set = BoostedLags::default()
            .fit(&series(values))
            .unwrap()
            .predict(2, 0.95)
            .unwrap();
        // Last observation is 20, so the next value should lean towards 10.
        assert!(set.predictions[0] < 15.0);
        assert!(set.predictions[1] > 15.0);
        assert!(set.is_well_formed());
    }

    #[test]
    fn uses_regressors_when_present() {
        let mut s = series((0..20).map(|t| t as f64).collect());
        s.exogenous.insert("price".to_string(), vec![1.0; 20]);
        assert!(BoostedLags::default().fit(&s).is_ok());
        s.exogenous.insert("promo".to_string(), vec![1.0; 3]);
        assert!(matches!(
            BoostedLags::default().fit(&s).err(),
            Some(ModelError::Computation(_))
        ));
    }

    #[test]
    fn needs_enough_lagged_rows() {
        assert_eq!(
            BoostedLags::default().fit(&series(vec![1.0; 5])).err(),
            Some(ModelError::InsufficientData { needed: 11, got: 5 })
        );
    }
}
