//! Parallel fitting and weighted combination of routed forecasters.

use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use fcast_model::{
    CombinationStrategy, CombinedForecast, EnsembleWeights, ForecastMetrics, ForecastResult,
    ModelFailure, ModelId, RoutingPlan,
};
use fcast_transform::NormalizedFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::error::{EnsembleError, ModelError, Result};
use crate::models::{Forecaster, ForecasterRegistry, ModelResult, z_score};
use crate::series::TrainingSeries;

/// How often the coordinator wakes to check deadlines and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Per-model deadline, measured from the moment the fit is dispatched.
    pub timeout_ms: u64,
    /// Concurrent fits; `0` uses the available parallelism.
    pub max_workers: usize,
    /// Overrides of [`Forecaster::prior`] per model.
    pub priors: BTreeMap<ModelId, f64>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_workers: 0,
            priors: BTreeMap::new(),
        }
    }
}

impl EnsembleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn worker_limit(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        }
    }
}

/// Shared flag that stops dispatching new fits once set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of one model within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Queued { model: ModelId },
    Training { model: ModelId },
    Completed { model: ModelId, elapsed_ms: u64 },
    Failed { model: ModelId, reason: String },
    Cancelled { model: ModelId },
}

/// Optional inputs to [`DynamicEnsemble::forecast_with`].
#[derive(Default, Clone)]
pub struct ForecastOptions<'a> {
    /// Historical weights from earlier monitoring, if any.
    pub weights: Option<&'a EnsembleWeights>,
    /// Called on the coordinating thread for every [`ProgressEvent`].
    pub progress: Option<&'a dyn Fn(&ProgressEvent)>,
    pub cancel: Option<CancellationToken>,
}

impl<'a> ForecastOptions<'a> {
    pub fn with_weights(mut self, weights: &'a EnsembleWeights) -> Self {
        self.weights = Some(weights);
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

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = self.progress {
            progress(&event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// What came back from the workers.
#[derive(Default)]
struct RunOutcome {
    results: BTreeMap<ModelId, ForecastResult>,
    failures: Vec<ModelFailure>,
    cancelled: Vec<ModelId>,
}

impl RunOutcome {
    fn fail(&mut self, model: ModelId, reason: String, options: &ForecastOptions<'_>) {
        options.emit(ProgressEvent::Failed {
            model,
            reason: reason.clone(),
        });
        self.failures.push(ModelFailure { model, reason });
    }
}

type WorkerMessage = (ModelId, ModelResult<ForecastResult>);

/// Fits every routed forecaster and combines the survivors.
#[derive(Debug, Clone, Default)]
pub struct DynamicEnsemble {
    registry: ForecasterRegistry,
    config: EnsembleConfig,
}

impl DynamicEnsemble {
    pub fn new(registry: ForecasterRegistry, config: EnsembleConfig) -> Self {
        Self { registry, config }
    }

    pub fn with_config(config: EnsembleConfig) -> Self {
        Self::new(ForecasterRegistry::with_defaults(), config)
    }

    pub fn registry(&self) -> &ForecasterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Static preference for `model`: the configured override, else the
    /// registered forecaster's own prior, else neutral.
    pub fn prior(&self, model: ModelId) -> f64 {
        self.config
            .priors
            .get(&model)
            .copied()
            .or_else(|| self.registry.get(model).map(|forecaster| forecaster.prior()))
            .unwrap_or(1.0)
    }

    pub fn forecast(
        &self,
        frame: &NormalizedFrame,
        plan: &RoutingPlan,
        horizon: usize,
        confidence_level: f64,
    ) -> Result<CombinedForecast> {
        self.forecast_with(frame, plan, horizon, confidence_level, ForecastOptions::default())
    }

    /// [`Self::forecast`] with prior weights, progress reporting and cancellation.
    pub fn forecast_with(
        &self,
        frame: &NormalizedFrame,
        plan: &RoutingPlan,
        horizon: usize,
        confidence_level: f64,
        options: ForecastOptions<'_>,
    ) -> Result<CombinedForecast> {
        let series = if frame.is_empty() {
            TrainingSeries::from_values(chrono::NaiveDate::MIN, Vec::new())
        } else {
            TrainingSeries::from_aggregated(frame.aggregate()?)
        };
        self.forecast_series(series, plan, horizon, confidence_level, options)
    }

    /// Run the plan against an already aggregated series.
    pub fn forecast_series(
        &self,
        series: TrainingSeries,
        plan: &RoutingPlan,
        horizon: usize,
        confidence_level: f64,
        options: ForecastOptions<'_>,
    ) -> Result<CombinedForecast> {
        let span = info_span!("forecast", horizon, points = series.len());
        let _guard = span.enter();
        let start = Instant::now();

        if horizon == 0 {
            return Err(EnsembleError::invalid("horizon must be at least 1"));
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(EnsembleError::invalid(format!(
                "confidence level {confidence_level} is outside (0, 1)"
            )));
        }
        if series.is_empty() {
            let failures = plan
                .forecasters()
                .map(|model| ModelFailure {
                    model,
                    reason: ModelError::EmptyData.to_string(),
                })
                .collect();
            return Err(EnsembleError::PipelineFailure { failures });
        }
        let dates = series
            .future_dates(horizon)
            .ok_or_else(|| EnsembleError::invalid("horizon runs past the supported calendar"))?;
        let cadence = series.cadence;

        let outcome = self.run_models(Arc::new(series), plan, horizon, confidence_level, &options);
        let RunOutcome {
            mut results,
            mut failures,
            mut cancelled,
        } = outcome;
        // Arrival order depends on thread timing; report in routing order.
        failures.sort_by_key(|failure| failure.model);
        cancelled.sort_unstable();

        let survivors: Vec<ModelId> = plan
            .forecasters()
            .filter(|id| results.contains_key(id))
            .collect();
        if survivors.is_empty() {
            if options.is_cancelled() {
                return Err(EnsembleError::Cancelled);
            }
            return Err(EnsembleError::PipelineFailure { failures });
        }

        let (strategy, weights) = if plan.uses_ensemble() {
            let weights = resolve_weights(&survivors, options.weights, |id| self.prior(id));
            (CombinationStrategy::Ensemble, weights)
        } else {
            // Fallback chain: the first survivor in plan order stands alone.
            (
                CombinationStrategy::Fallback,
                EnsembleWeights::equal(survivors.iter().copied().take(1)),
            )
        };
        let components: Vec<ForecastResult> = survivors
            .iter()
            .filter(|id| weights.contains(**id))
            .filter_map(|id| results.remove(id))
            .collect();
        let (point, lower, upper) = combine(&components, &weights, horizon, confidence_level);

        info!(
            strategy = ?strategy,
            used = components.len(),
            failed = failures.len(),
            cancelled = cancelled.len(),
            duration_ms = start.elapsed().as_millis(),
            "forecast complete"
        );
        Ok(CombinedForecast {
            dates,
            point,
            lower,
            upper,
            confidence_level,
            cadence,
            strategy,
            weights,
            components,
            failures,
            cancelled,
        })
    }

    fn run_models(
        &self,
        series: Arc<TrainingSeries>,
        plan: &RoutingPlan,
        horizon: usize,
        level: f64,
        options: &ForecastOptions<'_>,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        let mut queue: VecDeque<(ModelId, Arc<dyn Forecaster>)> = VecDeque::new();
        for model in plan.forecasters() {
            match self.registry.get(model) {
                Some(forecaster) => {
                    options.emit(ProgressEvent::Queued { model });
                    queue.push_back((model, forecaster));
                }
                None => outcome.fail(model, "no forecaster registered".to_string(), options),
            }
        }

        let limit = self.config.worker_limit().max(1);
        let timeout = self.config.timeout();
        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let mut in_flight: BTreeMap<ModelId, (Instant, Instant)> = BTreeMap::new();

        loop {
            if options.is_cancelled() {
                let pending: Vec<ModelId> = in_flight
                    .keys()
                    .copied()
                    .chain(queue.iter().map(|(model, _)| *model))
                    .collect();
                for model in pending {
                    warn!(model = %model, "cancelled");
                    options.emit(ProgressEvent::Cancelled { model });
                    outcome.cancelled.push(model);
                }
                break;
            }

            while in_flight.len() < limit
                && let Some((model, forecaster)) = queue.pop_front()
            {
                options.emit(ProgressEvent::Training { model });
                match spawn_fit(forecaster, Arc::clone(&series), horizon, level, sender.clone()) {
                    Ok(()) => {
                        let started = Instant::now();
                        in_flight.insert(model, (started, started + timeout));
                    }
                    Err(err) => outcome.fail(model, format!("could not start worker: {err}"), options),
                }
            }
            if in_flight.is_empty() {
                break;
            }

            let now = Instant::now();
            let next_deadline = in_flight.values().map(|(_, deadline)| *deadline).min();
            let wait = next_deadline
                .map_or(POLL_INTERVAL, |deadline| deadline.saturating_duration_since(now))
                .min(POLL_INTERVAL);
            match receiver.recv_timeout(wait) {
                Ok((model, result)) => {
                    let Some((started, _)) = in_flight.remove(&model) else {
                        debug!(model = %model, "ignoring late result");
                        continue;
                    };
                    match result {
                        Ok(forecast) => {
                            let elapsed_ms =
                                u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                            debug!(model = %model, elapsed_ms, "model completed");
                            options.emit(ProgressEvent::Completed { model, elapsed_ms });
                            outcome.results.insert(model, forecast);
                        }
                        Err(err) => {
                            warn!(model = %model, error = %err, "model failed");
                            outcome.fail(model, err.to_string(), options);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let expired: Vec<ModelId> = in_flight
                        .iter()
                        .filter(|(_, (_, deadline))| *deadline <= now)
                        .map(|(model, _)| *model)
                        .collect();
                    for model in expired {
                        in_flight.remove(&model);
                        warn!(model = %model, timeout_ms = self.config.timeout_ms, "model timed out");
                        outcome.fail(
                            model,
                            format!("timed out after {} ms", self.config.timeout_ms),
                            options,
                        );
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let lost: Vec<ModelId> = in_flight.keys().copied().collect();
                    for model in lost {
                        outcome.fail(model, "worker disconnected".to_string(), options);
                    }
                    break;
                }
            }
        }
        outcome
    }
}

/// Start one worker thread; its result arrives on `sender`.
fn spawn_fit(
    forecaster: Arc<dyn Forecaster>,
    series: Arc<TrainingSeries>,
    horizon: usize,
    level: f64,
    sender: Sender<WorkerMessage>,
) -> std::io::Result<()> {
    let model = forecaster.id();
    thread::Builder::new()
        .name(format!("fit-{model}"))
        .spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                fit_and_predict(forecaster.as_ref(), &series, horizon, level)
            }))
            .unwrap_or_else(|_| Err(ModelError::Computation("model panicked".to_string())));
            // The coordinator may have moved on after a timeout.
            let _ = sender.send((model, result));
        })
        .map(|_| ())
}

/// Holdout evaluation followed by a full refit and prediction.
pub fn fit_and_predict(
    forecaster: &dyn Forecaster,
    series: &TrainingSeries,
    horizon: usize,
    level: f64,
) -> ModelResult<ForecastResult> {
    let model = forecaster.id();
    let n = series.len();
    let metrics = if n >= 10 {
        let holdout = horizon.min(n / 5);
        let train = series.head(n - holdout);
        match forecaster
            .fit(&train)
            .and_then(|fitted| fitted.predict(holdout, level))
        {
            Ok(set) => ForecastMetrics::evaluate(&series.values[n - holdout..], &set.predictions),
            Err(err) => {
                debug!(model = %model, error = %err, "holdout evaluation skipped");
                None
            }
        }
    } else {
        None
    };

    let set = forecaster.fit(series)?.predict(horizon, level)?;
    if set.len() != horizon || !set.is_well_formed() {
        return Err(ModelError::Computation(
            "prediction is non-finite or has the wrong length".to_string(),
        ));
    }
    Ok(ForecastResult::from_predictions(model, set, metrics))
}

/// Combination weights for the surviving models.
///
/// Without historical weight for any survivor the result is equal weights.
/// Otherwise each survivor scores `prior × historical`, where a survivor
/// lacking history takes the mean of the known historical weights.
pub fn resolve_weights(
    survivors: &[ModelId],
    historical: Option<&EnsembleWeights>,
    prior: impl Fn(ModelId) -> f64,
) -> EnsembleWeights {
    let known: Vec<f64> = survivors
        .iter()
        .filter_map(|id| historical.and_then(|w| w.get(*id)))
        .collect();
    if known.is_empty() {
        return EnsembleWeights::equal(survivors.iter().copied());
    }
    let mean = known.iter().sum::<f64>() / known.len() as f64;
    EnsembleWeights::normalized(survivors.iter().map(|id| {
        let history = historical.and_then(|w| w.get(*id)).unwrap_or(mean);
        (*id, prior(*id) * history)
    }))
}

/// Weighted point forecast and bounds.
///
/// Bounds are the weighted half-widths widened by `z` times the weighted
/// spread of the component points, and never narrower than the narrowest
/// component interval at the same step.
fn combine(
    components: &[ForecastResult],
    weights: &EnsembleWeights,
    horizon: usize,
    level: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let z = z_score(level);
    let mut point = Vec::with_capacity(horizon);
    let mut lower = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);
    for step in 0..horizon {
        let weighted: Vec<(f64, &ForecastResult)> = components
            .iter()
            .map(|c| (weights.get(c.model).unwrap_or(0.0), c))
            .collect();
        let mean: f64 = weighted.iter().map(|(w, c)| w * c.predictions[step]).sum();
        let lower_half: f64 = weighted
            .iter()
            .map(|(w, c)| w * (c.predictions[step] - c.lower_bound[step]))
            .sum();
        let upper_half: f64 = weighted
            .iter()
            .map(|(w, c)| w * (c.upper_bound[step] - c.predictions[step]))
            .sum();
        // Weighted std of the points, scaled by the largest deviation so
        // squaring cannot overflow.
        let deviations: Vec<(f64, f64)> = weighted
            .iter()
            .map(|(w, c)| (*w, c.predictions[step] - mean))
            .collect();
        let scale = deviations
            .iter()
            .fold(0.0_f64, |max, (_, d)| max.max(d.abs()));
        let spread = if scale > 0.0 && scale.is_finite() {
            let scaled_variance: f64 = deviations.iter().map(|(w, d)| w * (d / scale).powi(2)).sum();
            z * scale * scaled_variance.sqrt()
        } else {
            0.0
        };

        let mut lo = (mean - lower_half - spread).max(f64::MIN);
        let mut hi = (mean + upper_half + spread).min(f64::MAX);
        let narrowest = components
            .iter()
            .filter_map(|c| c.width_at(step))
            .fold(f64::INFINITY, f64::min);
        if narrowest.is_finite() && hi - lo < narrowest {
            let pad = (narrowest - (hi - lo)) / 2.0;
            lo = (lo - pad).max(f64::MIN);
            hi = (hi + pad).min(f64::MAX);
        }
        point.push(mean);
        lower.push(lo);
        upper.push(hi);
    }
    (point, lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcast_model::PredictionSet;

    fn component(model: ModelId, points: &[f64], half: f64) -> ForecastResult {
        let set = PredictionSet::symmetric(points.to_vec(), &vec![half; points.len()]);
        ForecastResult::from_predictions(model, set, None)
    }

    #[test]
    fn weights_default_to_equal_without_history() {
        let ensemble = DynamicEnsemble::default();
        let weights = resolve_weights(&[ModelId::Prophet, ModelId::Naive], None, |id| {
            ensemble.prior(id)
        });
        assert_eq!(weights.get(ModelId::Prophet), Some(0.5));
    }

    #[test]
    fn missing_history_takes_the_known_mean() {
        let history = EnsembleWeights::normalized([(ModelId::Prophet, 0.5), (ModelId::Naive, 0.5)]);
        let weights = resolve_weights(
            &[ModelId::Prophet, ModelId::Naive, ModelId::MovingAverage],
            Some(&history),
            |_| 1.0,
        );
        for id in [ModelId::Prophet, ModelId::Naive, ModelId::MovingAverage] {
            assert!((weights.get(id).unwrap() - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn priors_tilt_historical_weights() {
        let history = EnsembleWeights::normalized([(ModelId::Xgboost, 0.5), (ModelId::Naive, 0.5)]);
        let ensemble = DynamicEnsemble::default();
        let weights = resolve_weights(&[ModelId::Xgboost, ModelId::Naive], Some(&history), |id| {
            ensemble.prior(id)
        });
        assert!((weights.get(ModelId::Xgboost).unwrap() - 1.3 / 2.2).abs() < 1e-12);
    }

    #[test]
    fn priors_come_from_forecasters_unless_configured() {
        let defaults = DynamicEnsemble::default();
        assert_eq!(defaults.prior(ModelId::Xgboost), 1.3);
        assert_eq!(defaults.prior(ModelId::Prophet), 1.2);
        assert_eq!(defaults.prior(ModelId::MovingAverage), 1.0);
        assert_eq!(defaults.prior(ModelId::Naive), 0.9);

        let config = EnsembleConfig {
            priors: BTreeMap::from([(ModelId::Naive, 2.0)]),
            ..EnsembleConfig::default()
        };
        let tuned = DynamicEnsemble::with_config(config);
        assert_eq!(tuned.prior(ModelId::Naive), 2.0);
        assert_eq!(tuned.prior(ModelId::Prophet), 1.2);

        let bare = DynamicEnsemble::new(ForecasterRegistry::empty(), EnsembleConfig::default());
        assert_eq!(bare.prior(ModelId::Xgboost), 1.0);
    }

    #[test]
    fn combined_interval_covers_disagreement() {
        let components = vec![
            component(ModelId::Prophet, &[10.0], 1.0),
            component(ModelId::Naive, &[20.0], 3.0),
        ];
        let weights = EnsembleWeights::equal([ModelId::Prophet, ModelId::Naive]);
        let (point, lower, upper) = combine(&components, &weights, 1, 0.95);
        assert_eq!(point, vec![15.0]);
        let z = z_score(0.95);
        assert!((upper[0] - (15.0 + 2.0 + 5.0 * z)).abs() < 1e-9);
        assert!((lower[0] - (15.0 - 2.0 - 5.0 * z)).abs() < 1e-9);
    }

    #[test]
    fn combined_width_never_below_narrowest() {
        // All weight on a zero-width model: the other survivor sets the floor.
        let components = vec![
            component(ModelId::Prophet, &[10.0, 12.0], 0.0),
            component(ModelId::Naive, &[10.0, 12.0], 2.0),
        ];
        let weights = EnsembleWeights::normalized([(ModelId::Prophet, 1.0), (ModelId::Naive, 0.0)]);
        let (point, lower, upper) = combine(&components, &weights, 2, 0.9);
        assert_eq!(point, vec![10.0, 12.0]);
        for step in 0..2 {
            let narrowest = components
                .iter()
                .filter_map(|c| c.width_at(step))
                .fold(f64::INFINITY, f64::min);
            assert!(upper[step] - lower[step] >= narrowest - 1e-12);
        }
    }

    #[test]
    fn tokens_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
