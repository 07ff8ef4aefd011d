use std::collections::BTreeMap;
use std::sync::Arc;

use fcast_model::ModelId;

use super::{BoostedLags, Forecaster, MovingAverage, Naive, TrendSeasonal};

/// Forecasters keyed by the identifier they are routed under.
///
/// Registering a forecaster for an identifier that is already present
/// replaces the previous one.
#[derive(Debug, Clone)]
pub struct ForecasterRegistry {
    forecasters: BTreeMap<ModelId, Arc<dyn Forecaster>>,
}

impl ForecasterRegistry {
    /// A registry without any forecaster.
    pub fn empty() -> Self {
        Self {
            forecasters: BTreeMap::new(),
        }
    }

    /// The built-in reference forecasters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(BoostedLags::default()));
        registry.register(Arc::new(TrendSeasonal));
        registry.register(Arc::new(Naive));
        registry.register(Arc::new(MovingAverage::default()));
        registry
    }

    pub fn register(&mut self, forecaster: Arc<dyn Forecaster>) {
        self.forecasters.insert(forecaster.id(), forecaster);
    }

    pub fn get(&self, id: ModelId) -> Option<Arc<dyn Forecaster>> {
        self.forecasters.get(&id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.forecasters.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.forecasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecasters.is_empty()
    }
}

impl Default for ForecasterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
