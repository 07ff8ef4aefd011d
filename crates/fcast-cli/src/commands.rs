//! Subcommand implementations. Printing lives in the binary; these return
//! the reports so they can be rendered as tables or JSON.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fcast_core::{ForecastPipeline, ForecastRequest, PipelineConfig, PipelineOutput, RunOptions};
use fcast_core::{WeightSource, apply_feedback};
use fcast_ensemble::{ModelMonitor, MonitorReport, ProgressEvent, WeightStore};
use fcast_ingest::{ColumnHint, build_column_hints, read_csv_frame, read_csv_table};
use fcast_model::{CombinedForecast, RoutingPlan, SchemaReport, TransformReport};
use fcast_transform::NormalizedFrame;
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use serde::{Deserialize, Serialize};
use tracing::info;

pub fn load_pipeline(config: Option<&Path>) -> Result<ForecastPipeline> {
    let config = match config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    Ok(ForecastPipeline::new(config))
}

pub fn read_input(path: &Path) -> Result<DataFrame> {
    read_csv_frame(path).with_context(|| format!("read {}", path.display()))
}

/// Schema mapping of an upload plus a profile of its raw columns.
#[derive(Debug, Serialize)]
pub struct Analysis {
    pub schema: SchemaReport,
    pub columns: BTreeMap<String, ColumnHint>,
}

pub fn analyze_file(pipeline: &ForecastPipeline, path: &Path) -> Result<Analysis> {
    let table = read_csv_table(path).with_context(|| format!("read {}", path.display()))?;
    let raw = table
        .to_dataframe()
        .with_context(|| format!("read {}", path.display()))?;
    Ok(Analysis {
        schema: pipeline.analyze(&raw),
        columns: build_column_hints(&table),
    })
}

pub struct Normalized {
    pub schema: SchemaReport,
    pub transform: TransformReport,
    pub frame: NormalizedFrame,
}

pub fn normalize_file(
    pipeline: &ForecastPipeline,
    path: &Path,
    output: Option<&Path>,
) -> Result<Normalized> {
    let raw = read_input(path)?;
    let schema = pipeline.analyze(&raw);
    let (frame, transform) = pipeline
        .normalize(&raw, &schema)
        .with_context(|| format!("normalize {}", path.display()))?;
    if let Some(output) = output {
        write_frame_csv(output, &frame)?;
        info!(path = %output.display(), rows = frame.height(), "wrote normalized table");
    }
    Ok(Normalized {
        schema,
        transform,
        frame,
    })
}

#[derive(Debug, Serialize)]
pub struct Routed {
    pub schema: SchemaReport,
    pub transform: TransformReport,
    pub plan: RoutingPlan,
}

pub fn route_file(pipeline: &ForecastPipeline, path: &Path) -> Result<Routed> {
    let normalized = normalize_file(pipeline, path, None)?;
    let plan = pipeline.route(&normalized.frame);
    Ok(Routed {
        schema: normalized.schema,
        transform: normalized.transform,
        plan,
    })
}

/// Inputs of a `forecast` run besides the pipeline itself.
#[derive(Debug, Clone)]
pub struct ForecastJob {
    pub input: PathBuf,
    pub request: ForecastRequest,
    pub weights: Option<PathBuf>,
    pub save: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// What `forecast --save` writes and `monitor` reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedForecast {
    pub weight_context: String,
    pub forecast: CombinedForecast,
}

pub fn forecast_file(
    pipeline: &ForecastPipeline,
    job: &ForecastJob,
    progress: Option<&dyn Fn(&ProgressEvent)>,
) -> Result<PipelineOutput> {
    let raw = read_input(&job.input)?;
    let store = match &job.weights {
        Some(path) => Some(
            WeightStore::load(path).with_context(|| format!("load weights {}", path.display()))?,
        ),
        None => None,
    };

    let mut options = RunOptions::default();
    if let Some(store) = &store {
        options = options.with_weights(WeightSource::Store(store));
    }
    if let Some(progress) = progress {
        options = options.with_progress(progress);
    }
    let output = pipeline
        .run_with(&raw, &job.request, options)
        .with_context(|| format!("forecast {}", job.input.display()))?;

    if let Some(path) = &job.save {
        let saved = SavedForecast {
            weight_context: output.weight_context.clone(),
            forecast: output.forecast.clone(),
        };
        let text = serde_json::to_string_pretty(&saved).context("serialize forecast")?;
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    }
    if let Some(path) = &job.output {
        write_forecast_csv(path, &output.forecast)?;
    }
    Ok(output)
}

pub fn load_saved_forecast(path: &Path) -> Result<SavedForecast> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse forecast {}", path.display()))
}

/// Inputs of a `monitor` run.
#[derive(Debug, Clone)]
pub struct MonitorJob {
    pub forecast: PathBuf,
    pub actuals: Vec<f64>,
    pub state: PathBuf,
    pub weights: PathBuf,
}

pub fn monitor_outcome(pipeline: &ForecastPipeline, job: &MonitorJob) -> Result<MonitorReport> {
    let saved = load_saved_forecast(&job.forecast)?;
    if job.actuals.is_empty() {
        bail!("no actual values given");
    }
    if job.actuals.len() > saved.forecast.horizon() {
        bail!(
            "{} actual values given but the forecast only has {} steps",
            job.actuals.len(),
            saved.forecast.horizon()
        );
    }

    let config = pipeline.config().monitor;
    let mut monitor = ModelMonitor::load(&job.state, config)
        .with_context(|| format!("load monitor state {}", job.state.display()))?;
    let store = WeightStore::load(&job.weights)
        .with_context(|| format!("load weights {}", job.weights.display()))?;

    let report = apply_feedback(
        &mut monitor,
        &store,
        &saved.weight_context,
        &saved.forecast,
        &job.actuals,
    );

    monitor
        .save(&job.state)
        .with_context(|| format!("save monitor state {}", job.state.display()))?;
    store
        .save(&job.weights)
        .with_context(|| format!("save weights {}", job.weights.display()))?;
    Ok(report)
}

fn write_frame_csv(path: &Path, frame: &NormalizedFrame) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut data = frame.data().clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut data)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn write_forecast_csv(path: &Path, forecast: &CombinedForecast) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["date", "forecast", "lower", "upper"])?;
    for (step, date) in forecast.dates.iter().enumerate() {
        writer.write_record([
            date.format("%Y-%m-%d").to_string(),
            forecast.point[step].to_string(),
            forecast.lower[step].to_string(),
            forecast.upper[step].to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
