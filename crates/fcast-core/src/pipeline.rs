//! End-to-end pipeline: analyze, normalize, route, forecast.
//!
//! Each stage is also exposed on its own so front ends can stop early
//! (e.g. only analyze a schema) with the same configuration.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use fcast_ensemble::{
    CancellationToken, DynamicEnsemble, ForecastOptions, ForecasterRegistry, ModelMonitor,
    MonitorReport, ProgressEvent, WeightStore, context_key,
};
use fcast_map::SchemaEngine;
use fcast_model::{
    Cadence, CombinedForecast, EnsembleWeights, ModelId, RoutingPlan, SchemaReport,
    TransformReport,
};
use fcast_route::ModelRouter;
use fcast_transform::{DATE_COLUMN, DataAdapter, NormalizedFrame, TARGET_COLUMN};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::{ForecastDefaults, PipelineConfig};
use crate::error::Result;

/// Schema confidence below which the mapping is flagged for review.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastRequest {
    pub horizon: usize,
    pub confidence_level: f64,
}

impl ForecastRequest {
    pub fn new(horizon: usize, confidence_level: f64) -> Self {
        Self {
            horizon,
            confidence_level,
        }
    }
}

impl Default for ForecastRequest {
    fn default() -> Self {
        ForecastDefaults::default().into()
    }
}

impl From<ForecastDefaults> for ForecastRequest {
    fn from(defaults: ForecastDefaults) -> Self {
        Self::new(defaults.horizon, defaults.confidence_level)
    }
}

/// Something the user should know about a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Caveat {
    LowSchemaConfidence { confidence: f64 },
    DroppedRows { rows: usize },
    SmallDataFallback { rows: usize, min_rows: usize },
    ModelsFailed { models: Vec<ModelId> },
    Cancelled { models: Vec<ModelId> },
}

impl fmt::Display for Caveat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caveat::LowSchemaConfidence { confidence } => write!(
                f,
                "schema confidence {confidence:.0} is below {LOW_CONFIDENCE_THRESHOLD:.0}; review the column mapping"
            ),
            Caveat::DroppedRows { rows } => {
                write!(f, "{rows} rows were dropped because their date could not be parsed")
            }
            Caveat::SmallDataFallback { rows, min_rows } => write!(
                f,
                "only {rows} rows (fewer than {min_rows}); forecast uses baseline models only"
            ),
            Caveat::ModelsFailed { models } => write!(f, "models failed: {}", join(models)),
            Caveat::Cancelled { models } => {
                write!(f, "run cancelled; skipped models: {}", join(models))
            }
        }
    }
}

fn join(models: &[ModelId]) -> String {
    models
        .iter()
        .map(ModelId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub schema: SchemaReport,
    pub transform: TransformReport,
    pub plan: RoutingPlan,
    pub forecast: CombinedForecast,
    /// Key under which monitoring should store updated weights.
    pub weight_context: String,
    pub caveats: Vec<Caveat>,
}

/// Where a run takes its historical ensemble weights from.
#[derive(Debug, Clone, Copy, Default)]
pub enum WeightSource<'a> {
    /// Static priors only.
    #[default]
    Priors,
    Fixed(&'a EnsembleWeights),
    /// Looked up by the run's weight context.
    Store(&'a WeightStore),
}

#[derive(Default, Clone)]
pub struct RunOptions<'a> {
    pub weights: WeightSource<'a>,
    pub progress: Option<&'a dyn Fn(&ProgressEvent)>,
    pub cancel: Option<CancellationToken>,
}

impl<'a> RunOptions<'a> {
    pub fn with_weights(mut self, weights: WeightSource<'a>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn Fn(&ProgressEvent)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

pub struct ForecastPipeline {
    config: PipelineConfig,
    schema: SchemaEngine,
    adapter: DataAdapter,
    router: ModelRouter,
    ensemble: DynamicEnsemble,
}

impl Default for ForecastPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_registry(config, ForecasterRegistry::with_defaults())
    }

    pub fn with_registry(config: PipelineConfig, registry: ForecasterRegistry) -> Self {
        Self {
            schema: SchemaEngine::new().with_config(config.schema),
            adapter: DataAdapter::with_config(config.adapter),
            router: ModelRouter::with_config(config.router),
            ensemble: DynamicEnsemble::new(registry, config.ensemble.clone()),
            config,
        }
    }

    /// Build a pipeline from a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(PipelineConfig::load(path)?))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Request built from the configured defaults.
    pub fn default_request(&self) -> ForecastRequest {
        self.config.forecast.into()
    }

    pub fn analyze(&self, raw: &DataFrame) -> SchemaReport {
        let columns: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        self.schema.analyze(&columns)
    }

    pub fn normalize(
        &self,
        raw: &DataFrame,
        schema: &SchemaReport,
    ) -> Result<(NormalizedFrame, TransformReport)> {
        Ok(self.adapter.normalize(raw, schema)?)
    }

    pub fn route(&self, frame: &NormalizedFrame) -> RoutingPlan {
        self.router.route(frame, TARGET_COLUMN, DATE_COLUMN)
    }

    /// Weight context of a normalized dataset: detected domain plus cadence.
    pub fn weight_context(&self, schema: &SchemaReport, frame: &NormalizedFrame) -> Result<String> {
        let cadence = Cadence::infer(&frame.dates()?);
        Ok(context_key(&schema.detected_domain, cadence))
    }

    /// Run all four stages with explicit historical weights.
    pub fn run(
        &self,
        raw: &DataFrame,
        request: &ForecastRequest,
        weights: Option<&EnsembleWeights>,
    ) -> Result<PipelineOutput> {
        let options = RunOptions::default().with_weights(match weights {
            Some(weights) => WeightSource::Fixed(weights),
            None => WeightSource::Priors,
        });
        self.run_with(raw, request, options)
    }

    pub fn run_with(
        &self,
        raw: &DataFrame,
        request: &ForecastRequest,
        options: RunOptions<'_>,
    ) -> Result<PipelineOutput> {
        let span = info_span!("pipeline", rows = raw.height(), horizon = request.horizon);
        let _guard = span.enter();
        let start = Instant::now();

        let schema = self.analyze(raw);
        let (frame, transform) = self.normalize(raw, &schema)?;
        let plan = self.route(&frame);
        let weight_context = self.weight_context(&schema, &frame)?;

        let stored = match options.weights {
            WeightSource::Store(store) => store.get(&weight_context),
            _ => None,
        };
        let mut forecast_options = ForecastOptions::default();
        match options.weights {
            WeightSource::Fixed(weights) => forecast_options.weights = Some(weights),
            WeightSource::Store(_) => forecast_options.weights = stored.as_ref(),
            WeightSource::Priors => {}
        }
        forecast_options.progress = options.progress;
        forecast_options.cancel = options.cancel;

        let forecast = self.ensemble.forecast_with(
            &frame,
            &plan,
            request.horizon,
            request.confidence_level,
            forecast_options,
        )?;

        let caveats = self.caveats(&schema, &transform, &plan, &forecast);
        for caveat in &caveats {
            warn!(%caveat, "forecast caveat");
        }
        info!(
            domain = %schema.detected_domain,
            confidence = schema.overall_confidence,
            models = forecast.components.len(),
            caveats = caveats.len(),
            duration_ms = start.elapsed().as_millis(),
            "pipeline complete"
        );

        Ok(PipelineOutput {
            schema,
            transform,
            plan,
            forecast,
            weight_context,
            caveats,
        })
    }

    fn caveats(
        &self,
        schema: &SchemaReport,
        transform: &TransformReport,
        plan: &RoutingPlan,
        forecast: &CombinedForecast,
    ) -> Vec<Caveat> {
        let mut caveats = Vec::new();
        if schema.overall_confidence < LOW_CONFIDENCE_THRESHOLD {
            caveats.push(Caveat::LowSchemaConfidence {
                confidence: schema.overall_confidence,
            });
        }
        if transform.unparsed_dates > 0 {
            caveats.push(Caveat::DroppedRows {
                rows: transform.unparsed_dates,
            });
        }
        if plan.is_baseline_only() {
            caveats.push(Caveat::SmallDataFallback {
                rows: plan.characteristics.row_count,
                min_rows: self.config.router.min_rows,
            });
        }
        if !forecast.failures.is_empty() {
            caveats.push(Caveat::ModelsFailed {
                models: forecast.failures.iter().map(|f| f.model).collect(),
            });
        }
        if !forecast.cancelled.is_empty() {
            caveats.push(Caveat::Cancelled {
                models: forecast.cancelled.clone(),
            });
        }
        caveats
    }
}

/// Score a past forecast and store the refreshed weights under `context`.
pub fn apply_feedback(
    monitor: &mut ModelMonitor,
    store: &WeightStore,
    context: &str,
    forecast: &CombinedForecast,
    actuals: &[f64],
) -> MonitorReport {
    let report = monitor.record_outcome(forecast, actuals);
    if !report.weights.is_empty() {
        store.set(context, report.weights.clone());
    }
    report
}
