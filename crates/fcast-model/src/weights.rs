use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plan::ModelId;

/// Non-negative per-model weights that sum to 1.0 (or are empty).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnsembleWeights {
    weights: BTreeMap<ModelId, f64>,
}

impl EnsembleWeights {
    /// Equal weights across `models`.
    pub fn equal(models: impl IntoIterator<Item = ModelId>) -> Self {
        Self::normalized(models.into_iter().map(|id| (id, 1.0)))
    }

    /// Normalize raw scores into weights.
    ///
    /// Negative or non-finite scores count as zero. When every score is zero
    /// the models share the weight equally.
    pub fn normalized(raw: impl IntoIterator<Item = (ModelId, f64)>) -> Self {
        let cleaned: BTreeMap<ModelId, f64> = raw
            .into_iter()
            .map(|(id, score)| {
                let score = if score.is_finite() { score.max(0.0) } else { 0.0 };
                (id, score)
            })
            .collect();
        let total: f64 = cleaned.values().sum();
        let weights = if total > 0.0 {
            cleaned
                .into_iter()
                .map(|(id, score)| (id, score / total))
                .collect()
        } else {
            let count = cleaned.len() as f64;
            cleaned.into_keys().map(|id| (id, 1.0 / count)).collect()
        };
        Self { weights }
    }

    pub fn get(&self, model: ModelId) -> Option<f64> {
        self.weights.get(&model).copied()
    }

    pub fn contains(&self, model: ModelId) -> bool {
        self.weights.contains_key(&model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, f64)> + '_ {
        self.weights.iter().map(|(id, w)| (*id, *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}
