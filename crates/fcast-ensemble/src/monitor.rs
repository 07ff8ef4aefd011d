//! Post-hoc accuracy tracking, drift detection and weight updates.
//!
//! The monitor holds no hidden state: callers pass it in, record outcomes
//! and persist it again (JSON) between runs.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use fcast_model::{CombinedForecast, EnsembleWeights, ModelId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Floor applied to errors before inverting them into weights.
const MIN_ERROR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Errors kept per model.
    pub window: usize,
    /// The first this-many errors of a model define its baseline.
    pub baseline_window: usize,
    /// Recent errors averaged for drift checks and weights.
    pub rolling_window: usize,
    /// Drift is flagged when the rolling error exceeds `drift_ratio × baseline`.
    pub drift_ratio: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window: 30,
            baseline_window: 5,
            rolling_window: 3,
            drift_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ModelHistory {
    errors: VecDeque<f64>,
    baseline: Vec<f64>,
    observations: usize,
}

impl ModelHistory {
    fn push(&mut self, error: f64, config: &MonitorConfig) {
        self.errors.push_back(error);
        while self.errors.len() > config.window.max(1) {
            self.errors.pop_front();
        }
        if self.baseline.len() < config.baseline_window {
            self.baseline.push(error);
        }
        self.observations += 1;
    }

    fn baseline_error(&self, config: &MonitorConfig) -> Option<f64> {
        (config.baseline_window > 0 && self.baseline.len() >= config.baseline_window)
            .then(|| mean(&self.baseline))
    }

    fn rolling_error(&self, config: &MonitorConfig) -> Option<f64> {
        let take = config.rolling_window.max(1).min(self.errors.len());
        if take == 0 {
            return None;
        }
        let recent: Vec<f64> = self.errors.iter().rev().take(take).copied().collect();
        Some(mean(&recent))
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Raised when a model's recent error has degraded against its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAlert {
    pub model: ModelId,
    pub rolling_error: f64,
    pub baseline_error: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    /// WAPE of each component for the recorded outcome.
    pub errors: BTreeMap<ModelId, f64>,
    /// WAPE of the combined point forecast.
    pub ensemble_error: Option<f64>,
    pub rolling_errors: BTreeMap<ModelId, f64>,
    /// Inverse rolling error, normalized; feed into the next ensemble run.
    pub weights: EnsembleWeights,
    pub alerts: Vec<DriftAlert>,
}

/// Weighted absolute percentage error over the overlapping steps.
///
/// `None` when nothing overlaps, or when the actuals sum to zero and the
/// forecast is not exact.
pub fn wape(actuals: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = actuals.len().min(predicted.len());
    if n == 0 {
        return None;
    }
    let error: f64 = actuals
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    let scale: f64 = actuals[..n].iter().map(|a| a.abs()).sum();
    if scale > 0.0 {
        Some(error / scale)
    } else if error == 0.0 {
        Some(0.0)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMonitor {
    #[serde(default)]
    config: MonitorConfig,
    history: BTreeMap<ModelId, ModelHistory>,
}

impl ModelMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            history: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Replace the configuration, keeping the recorded history.
    pub fn set_config(&mut self, config: MonitorConfig) {
        self.config = config;
    }

    /// Models with at least one recorded error.
    pub fn tracked_models(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.history.keys().copied()
    }

    /// Score a past forecast against what actually happened.
    ///
    /// `actuals` align with the forecast steps; extra values on either side
    /// are ignored.
    pub fn record_outcome(&mut self, forecast: &CombinedForecast, actuals: &[f64]) -> MonitorReport {
        let mut errors = BTreeMap::new();
        for component in &forecast.components {
            if let Some(error) = wape(actuals, &component.predictions) {
                self.history
                    .entry(component.model)
                    .or_default()
                    .push(error, &self.config);
                errors.insert(component.model, error);
            }
        }
        let ensemble_error = wape(actuals, &forecast.point);
        debug!(models = errors.len(), ensemble_error, "recorded forecast outcome");

        let alerts = self.drift_alerts();
        for alert in &alerts {
            warn!(
                model = %alert.model,
                rolling = alert.rolling_error,
                baseline = alert.baseline_error,
                "accuracy drift detected"
            );
        }
        MonitorReport {
            errors,
            ensemble_error,
            rolling_errors: self.rolling_errors(),
            weights: self.weights(),
            alerts,
        }
    }

    pub fn rolling_errors(&self) -> BTreeMap<ModelId, f64> {
        self.history
            .iter()
            .filter_map(|(model, history)| Some((*model, history.rolling_error(&self.config)?)))
            .collect()
    }

    /// Inverse rolling error per tracked model, normalized to sum to one.
    pub fn weights(&self) -> EnsembleWeights {
        EnsembleWeights::normalized(
            self.rolling_errors()
                .into_iter()
                .map(|(model, error)| (model, 1.0 / error.max(MIN_ERROR))),
        )
    }

    /// Models whose rolling error exceeds the drift ratio over their baseline.
    ///
    /// A model is only checked once it has more observations than its
    /// baseline window.
    pub fn drift_alerts(&self) -> Vec<DriftAlert> {
        self.history
            .iter()
            .filter(|(_, history)| history.observations > self.config.baseline_window)
            .filter_map(|(model, history)| {
                let baseline_error = history.baseline_error(&self.config)?;
                let rolling_error = history.rolling_error(&self.config)?;
                (rolling_error > self.config.drift_ratio * baseline_error && rolling_error > 0.0)
                    .then(|| DriftAlert {
                        model: *model,
                        rolling_error,
                        baseline_error,
                        ratio: rolling_error / baseline_error.max(MIN_ERROR),
                    })
            })
            .collect()
    }

    /// Read monitor state; a missing file yields a fresh monitor.
    pub fn load(path: &Path, config: MonitorConfig) -> Result<Self, StoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(config)),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let mut monitor: Self = serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        monitor.set_config(config);
        Ok(monitor)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wape_weights_by_actual_volume() {
        assert_eq!(wape(&[10.0, 30.0], &[12.0, 26.0]), Some(0.15));
        assert_eq!(wape(&[0.0, 0.0], &[0.0, 0.0]), Some(0.0));
        assert_eq!(wape(&[0.0], &[1.0]), None);
        assert_eq!(wape(&[], &[1.0]), None);
    }

    #[test]
    fn history_window_is_bounded_but_baseline_is_kept() {
        let config = MonitorConfig {
            window: 3,
            baseline_window: 2,
            rolling_window: 2,
            drift_ratio: 1.5,
        };
        let mut history = ModelHistory::default();
        for error in [0.1, 0.1, 0.5, 0.6, 0.7] {
            history.push(error, &config);
        }
        assert_eq!(history.errors, VecDeque::from(vec![0.5, 0.6, 0.7]));
        assert_eq!(history.baseline_error(&config), Some(0.1));
        assert!((history.rolling_error(&config).unwrap() - 0.65).abs() < 1e-12);
    }
}
