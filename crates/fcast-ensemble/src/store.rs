//! Shared, persistable ensemble weights per weight context.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use fcast_model::{Cadence, EnsembleWeights};

use crate::error::StoreError;

/// Key under which weights are stored: detected domain plus cadence.
pub fn context_key(domain: &str, cadence: Cadence) -> String {
    format!("{domain}|{}", cadence.label())
}

/// Weights by context behind a read/write lock.
///
/// Readers get snapshots; a write replaces a whole entry.
#[derive(Debug, Default)]
pub struct WeightStore {
    entries: RwLock<BTreeMap<String, EnsembleWeights>>,
}

impl WeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, context: &str) -> Option<EnsembleWeights> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(context)
            .cloned()
    }

    /// Replace the weights of `context`, returning the previous entry.
    pub fn set(&self, context: impl Into<String>, weights: EnsembleWeights) -> Option<EnsembleWeights> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(context.into(), weights)
    }

    pub fn snapshot(&self) -> BTreeMap<String, EnsembleWeights> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load a store from JSON; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let entries: BTreeMap<String, EnsembleWeights> =
            serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.snapshot()).map_err(|source| {
            StoreError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, text).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
