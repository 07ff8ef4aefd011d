use fcast_model::{CanonicalRole, DataCharacteristics, ModelId, RoutingPlan};
use fcast_transform::NormalizedFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

/// Row-count thresholds that shape the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Below this many rows only the baselines are routed.
    pub min_rows: usize,
    /// Strictly more rows than this put `ensemble` at the head of the plan.
    pub ensemble_rows: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            min_rows: 30,
            ensemble_rows: 50,
        }
    }
}

/// Chooses forecasting strategies from data characteristics.
#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    config: RouterConfig,
}

/// Route `frame` with the default thresholds.
pub fn route_model(frame: &NormalizedFrame, target_col: &str, date_col: &str) -> RoutingPlan {
    ModelRouter::new().route(frame, target_col, date_col)
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Build the plan for `frame`.
    ///
    /// A missing or non-numeric `target_col` leaves volatility undefined; it
    /// never fails the routing.
    pub fn route(&self, frame: &NormalizedFrame, target_col: &str, date_col: &str) -> RoutingPlan {
        let span = info_span!("route", rows = frame.height());
        let _guard = span.enter();

        let characteristics = self.characteristics(frame, target_col, date_col);
        let rows = characteristics.row_count;
        let mut candidates = Vec::new();
        let mut reasons = Vec::new();

        if rows < self.config.min_rows {
            reasons.push(format!(
                "Only {rows} rows (< {}): baseline models only",
                self.config.min_rows
            ));
        } else {
            if rows > self.config.ensemble_rows {
                candidates.push(ModelId::Ensemble);
                reasons.push(format!(
                    "{rows} rows (> {}): combine all surviving models",
                    self.config.ensemble_rows
                ));
            }
            if !characteristics.exogenous_columns.is_empty() {
                candidates.push(ModelId::Xgboost);
                reasons.push(format!(
                    "Exogenous regressors available ({}): gradient-boosted lags",
                    characteristics.exogenous_columns.join(", ")
                ));
            }
            candidates.push(ModelId::Prophet);
            reasons.push("Trend and seasonality model for sufficient history".to_string());
        }
        candidates.extend([ModelId::Naive, ModelId::MovingAverage]);
        reasons.push("Naive and moving-average baselines always close the chain".to_string());
        if let Some(cv) = characteristics.volatility {
            debug!(volatility = cv, "target volatility");
        }

        let plan = RoutingPlan::new(candidates, characteristics, reasons);
        info!(
            models = ?plan.models.iter().map(ModelId::as_str).collect::<Vec<_>>(),
            "routing plan ready"
        );
        plan
    }

    fn characteristics(
        &self,
        frame: &NormalizedFrame,
        target_col: &str,
        date_col: &str,
    ) -> DataCharacteristics {
        let keys = [
            CanonicalRole::Item.frame_column(),
            CanonicalRole::Location.frame_column(),
        ];
        let exogenous_columns = frame
            .column_names()
            .into_iter()
            .filter(|name| name != target_col && name != date_col && !keys.contains(&name.as_str()))
            .collect();
        let volatility = frame.values(target_col).ok().and_then(|values| {
            let observed: Vec<f64> = values.into_iter().flatten().collect();
            coefficient_of_variation(&observed)
        });
        DataCharacteristics {
            row_count: frame.height(),
            exogenous_columns,
            volatility,
        }
    }
}

/// Sample standard deviation over the absolute mean; `None` for fewer than
/// two values or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() / mean.abs())
}
