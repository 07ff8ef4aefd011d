//! Pipeline configuration loaded from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults of the
//! stage that owns them.
//!
//! ```toml
//! [forecast]
//! horizon = 28
//! confidence_level = 0.9
//!
//! [router]
//! min_rows = 30
//! ensemble_rows = 50
//!
//! [ensemble]
//! timeout_ms = 10000
//! max_workers = 2
//! ```

use std::path::{Path, PathBuf};

use fcast_ensemble::{EnsembleConfig, MonitorConfig};
use fcast_map::SchemaConfig;
use fcast_route::RouterConfig;
use fcast_transform::AdapterConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Defaults for requests that do not set their own horizon or level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastDefaults {
    pub horizon: usize,
    pub confidence_level: f64,
}

impl Default for ForecastDefaults {
    fn default() -> Self {
        Self {
            horizon: 14,
            confidence_level: 0.95,
        }
    }
}

/// Settings for every pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub forecast: ForecastDefaults,
    pub schema: SchemaConfig,
    pub adapter: AdapterConfig,
    pub router: RouterConfig,
    pub ensemble: EnsembleConfig,
    pub monitor: MonitorConfig,
}

impl PipelineConfig {
    /// Parse and validate a TOML document. `origin` only labels errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forecast.horizon == 0 {
            return Err(ConfigError::invalid("forecast.horizon must be at least 1"));
        }
        if !in_open_unit(self.forecast.confidence_level) {
            return Err(ConfigError::invalid(
                "forecast.confidence_level must be between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.schema.fuzzy_threshold) {
            return Err(ConfigError::invalid(
                "schema.fuzzy_threshold must be between 0 and 1",
            ));
        }
        if !(self.adapter.parse_threshold > 0.0 && self.adapter.parse_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "adapter.parse_threshold must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.adapter.wide_min_share) {
            return Err(ConfigError::invalid(
                "adapter.wide_min_share must be between 0 and 1",
            ));
        }
        if self.router.ensemble_rows < self.router.min_rows {
            return Err(ConfigError::invalid(
                "router.ensemble_rows must not be below router.min_rows",
            ));
        }
        if self.ensemble.timeout_ms == 0 {
            return Err(ConfigError::invalid("ensemble.timeout_ms must be positive"));
        }
        if let Some((model, prior)) = self
            .ensemble
            .priors
            .iter()
            .find(|(_, prior)| !prior.is_finite() || **prior < 0.0)
        {
            return Err(ConfigError::invalid(format!(
                "ensemble.priors.{model} must be a non-negative number, got {prior}"
            )));
        }
        if self.monitor.drift_ratio <= 0.0 {
            return Err(ConfigError::invalid("monitor.drift_ratio must be positive"));
        }
        Ok(())
    }
}

fn in_open_unit(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

#[cfg(test)]
mod tests {
    use fcast_model::ModelId;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::from_toml_str("", Path::new("empty.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.router.min_rows, 30);
        assert_eq!(config.router.ensemble_rows, 50);
        assert_eq!(config.adapter.parse_threshold, 0.8);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"
            [router]
            ensemble_rows = 80

            [ensemble]
            timeout_ms = 500

            [ensemble.priors]
            naive = 2.0
        "#;
        let config = PipelineConfig::from_toml_str(text, Path::new("partial.toml")).unwrap();
        assert_eq!(config.router.ensemble_rows, 80);
        assert_eq!(config.router.min_rows, 30);
        assert_eq!(config.ensemble.timeout_ms, 500);
        assert_eq!(config.ensemble.priors.get(&ModelId::Naive), Some(&2.0));
        assert_eq!(config.ensemble.priors.get(&ModelId::Prophet), None);
        assert_eq!(config.forecast.horizon, 14);
    }

    #[test]
    fn rejects_negative_priors() {
        let text = r#"
            [ensemble.priors]
            prophet = -1.0
        "#;
        let err = PipelineConfig::from_toml_str(text, Path::new("priors.toml")).unwrap_err();
        assert!(err.to_string().contains("ensemble.priors.prophet"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = PipelineConfig::from_toml_str(
            "[forecast]\nconfidence_level = 1.0\n",
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = PipelineConfig::from_toml_str(
            "[router]\nmin_rows = 60\nensemble_rows = 50\n",
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ensemble_rows"));
    }

    #[test]
    fn syntax_errors_name_the_file() {
        let err =
            PipelineConfig::from_toml_str("[router\n", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = PipelineConfig::default();
        config.forecast.horizon = 30;
        config.monitor.window = 12;
        let text = config.to_toml_string().unwrap();
        let parsed = PipelineConfig::from_toml_str(&text, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(parsed, config);
    }
}
