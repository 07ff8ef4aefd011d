//! Model routing plans.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a forecasting strategy.
///
/// `Ensemble` is not a forecaster itself: its presence in a plan asks the
/// ensemble to combine every surviving candidate instead of using the first
/// one that succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    Ensemble,
    Xgboost,
    Prophet,
    Naive,
    MovingAverage,
}

impl ModelId {
    pub const ALL: [ModelId; 5] = [
        ModelId::Ensemble,
        ModelId::Xgboost,
        ModelId::Prophet,
        ModelId::Naive,
        ModelId::MovingAverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Ensemble => "ensemble",
            ModelId::Xgboost => "xgboost",
            ModelId::Prophet => "prophet",
            ModelId::Naive => "naive",
            ModelId::MovingAverage => "moving_average",
        }
    }

    /// Baselines fit any non-empty series.
    pub fn is_baseline(&self) -> bool {
        matches!(self, ModelId::Naive | ModelId::MovingAverage)
    }

    pub fn is_forecaster(&self) -> bool {
        !matches!(self, ModelId::Ensemble)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| format!("unknown model identifier: {s}"))
    }
}

/// Data characteristics the router based its decision on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCharacteristics {
    pub row_count: usize,
    pub exogenous_columns: Vec<String>,
    /// Coefficient of variation of the target, when defined.
    pub volatility: Option<f64>,
}

/// Ordered, deduplicated priority-with-fallback chain of strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPlan {
    pub models: Vec<ModelId>,
    pub characteristics: DataCharacteristics,
    /// Why each strategy was included.
    pub reasons: Vec<String>,
}

impl RoutingPlan {
    /// Build a plan, keeping the first occurrence of every identifier.
    ///
    /// The plan always ends with the baselines, `naive` then
    /// `moving_average`: baselines listed earlier move to the tail and
    /// missing ones are appended.
    pub fn new(
        candidates: impl IntoIterator<Item = ModelId>,
        characteristics: DataCharacteristics,
        reasons: Vec<String>,
    ) -> Self {
        let mut models: Vec<ModelId> = Vec::new();
        for id in candidates {
            if !id.is_baseline() && !models.contains(&id) {
                models.push(id);
            }
        }
        models.extend([ModelId::Naive, ModelId::MovingAverage]);
        Self {
            models,
            characteristics,
            reasons,
        }
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.models.contains(&id)
    }

    /// Whether survivors should be combined rather than picked in order.
    pub fn uses_ensemble(&self) -> bool {
        self.contains(ModelId::Ensemble)
    }

    /// Forecasters to run, in priority order.
    pub fn forecasters(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.models.iter().copied().filter(ModelId::is_forecaster)
    }

    /// True when only baselines were routed (too little history).
    pub fn is_baseline_only(&self) -> bool {
        self.models.iter().all(ModelId::is_baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_deduplicates_in_first_seen_order() {
        let plan = RoutingPlan::new(
            [
                ModelId::Ensemble,
                ModelId::Prophet,
                ModelId::Ensemble,
                ModelId::Naive,
                ModelId::MovingAverage,
                ModelId::Prophet,
            ],
            DataCharacteristics::default(),
            Vec::new(),
        );
        assert_eq!(
            plan.models,
            vec![
                ModelId::Ensemble,
                ModelId::Prophet,
                ModelId::Naive,
                ModelId::MovingAverage
            ]
        );
    }

    #[test]
    fn new_appends_missing_baselines() {
        let plan = RoutingPlan::new([ModelId::Prophet], DataCharacteristics::default(), vec![]);
        assert_eq!(
            plan.models,
            vec![ModelId::Prophet, ModelId::Naive, ModelId::MovingAverage]
        );

        let empty = RoutingPlan::new([], DataCharacteristics::default(), vec![]);
        assert!(empty.is_baseline_only());
        assert!(!empty.models.is_empty());
    }

    #[test]
    fn baselines_listed_early_move_to_the_tail() {
        let plan = RoutingPlan::new(
            [ModelId::Naive, ModelId::MovingAverage, ModelId::Prophet],
            DataCharacteristics::default(),
            vec![],
        );
        assert_eq!(
            plan.models,
            vec![ModelId::Prophet, ModelId::Naive, ModelId::MovingAverage]
        );

        let reversed = RoutingPlan::new(
            [ModelId::MovingAverage, ModelId::Xgboost, ModelId::Naive],
            DataCharacteristics::default(),
            vec![],
        );
        assert_eq!(
            reversed.models,
            vec![ModelId::Xgboost, ModelId::Naive, ModelId::MovingAverage]
        );
    }

    #[test]
    fn model_ids_parse_loosely() {
        assert_eq!("Moving-Average".parse(), Ok(ModelId::MovingAverage));
        assert_eq!("XGBOOST".parse(), Ok(ModelId::Xgboost));
        assert!("arima".parse::<ModelId>().is_err());
    }
}
