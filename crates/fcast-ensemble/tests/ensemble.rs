use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use fcast_ensemble::{
    CancellationToken, DynamicEnsemble, EnsembleConfig, EnsembleError, FittedModel,
    ForecastOptions, Forecaster, ForecasterRegistry, ModelError, ModelResult, MovingAverage,
    Naive, ProgressEvent, TrainingSeries,
};
use fcast_model::{
    Cadence, CombinationStrategy, DataCharacteristics, EnsembleWeights, ModelId, RoutingPlan,
};
use fcast_transform::NormalizedFrame;
use polars::prelude::{Column, DataFrame, NamedFrom, Series};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

fn frame(points: usize) -> NormalizedFrame {
    let dates: Vec<String> = (0..points)
        .map(|i| {
            start()
                .checked_add_days(Days::new(i as u64))
                .unwrap()
                .format("%Y-%m-%d")
                .to_string()
        })
        .collect();
    let target: Vec<f64> = (0..points)
        .map(|i| 100.0 + i as f64 * 0.5 + if i % 7 >= 5 { 15.0 } else { 0.0 })
        .collect();
    let price: Vec<f64> = (0..points).map(|i| 2.0 + (i % 3) as f64 * 0.25).collect();
    let columns: Vec<Column> = vec![
        Series::new("date".into(), dates).into(),
        Series::new("target".into(), target).into(),
        Series::new("price".into(), price).into(),
    ];
    NormalizedFrame::try_new(DataFrame::new(columns).unwrap()).unwrap()
}

fn plan(models: &[ModelId]) -> RoutingPlan {
    RoutingPlan::new(models.to_vec(), DataCharacteristics::default(), Vec::new())
}

fn full_plan() -> RoutingPlan {
    plan(&[
        ModelId::Ensemble,
        ModelId::Xgboost,
        ModelId::Prophet,
        ModelId::Naive,
        ModelId::MovingAverage,
    ])
}

/// Always fails to fit.
#[derive(Debug)]
struct Broken(ModelId);

impl Forecaster for Broken {
    fn id(&self) -> ModelId {
        self.0
    }

    fn fit(&self, _series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        Err(ModelError::Computation("singular matrix".to_string()))
    }
}

/// Panics while fitting.
#[derive(Debug)]
struct Panicking(ModelId);

impl Forecaster for Panicking {
    fn id(&self) -> ModelId {
        self.0
    }

    fn fit(&self, _series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        panic!("numerical blow-up");
    }
}

/// Sleeps before delegating to the naive model.
#[derive(Debug)]
struct Slow {
    id: ModelId,
    delay: Duration,
}

impl Forecaster for Slow {
    fn id(&self) -> ModelId {
        self.id
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        std::thread::sleep(self.delay);
        Naive.fit(series)
    }
}

/// Requests cancellation as soon as it starts fitting.
#[derive(Debug)]
struct Canceller {
    id: ModelId,
    token: CancellationToken,
}

impl Forecaster for Canceller {
    fn id(&self) -> ModelId {
        self.id
    }

    fn fit(&self, series: &TrainingSeries) -> ModelResult<Box<dyn FittedModel>> {
        self.token.cancel();
        std::thread::sleep(Duration::from_millis(200));
        Naive.fit(series)
    }
}

fn registry(forecasters: Vec<Arc<dyn Forecaster>>) -> ForecasterRegistry {
    let mut registry = ForecasterRegistry::empty();
    for forecaster in forecasters {
        registry.register(forecaster);
    }
    registry
}

fn baselines() -> Vec<Arc<dyn Forecaster>> {
    vec![Arc::new(Naive), Arc::new(MovingAverage::default())]
}

#[test]
fn default_models_combine_with_sound_intervals() {
    let forecast = DynamicEnsemble::default()
        .forecast(&frame(60), &full_plan(), 14, 0.95)
        .unwrap();

    assert_eq!(forecast.strategy, CombinationStrategy::Ensemble);
    assert_eq!(forecast.horizon(), 14);
    assert_eq!(forecast.cadence, Cadence::Daily);
    assert_eq!(forecast.dates[0], NaiveDate::from_ymd_opt(2023, 3, 2).unwrap());
    assert!(forecast.failures.is_empty(), "{:?}", forecast.failures);
    assert_eq!(forecast.components.len(), 4);
    assert!((forecast.weights.total() - 1.0).abs() < 1e-9);

    for step in 0..forecast.horizon() {
        let narrowest = forecast
            .components
            .iter()
            .filter_map(|c| c.width_at(step))
            .fold(f64::INFINITY, f64::min);
        let width = forecast.width_at(step).unwrap();
        assert!(width >= narrowest - 1e-9, "step {step}: {width} < {narrowest}");
        assert!(forecast.lower[step] <= forecast.point[step]);
        assert!(forecast.point[step] <= forecast.upper[step]);
    }
    for component in &forecast.components {
        let metrics = component.metrics.as_ref().expect("holdout metrics");
        assert_eq!(metrics.holdout, 12);
    }
}

#[test]
fn baselines_survive_when_every_other_model_fails() {
    let mut forecasters = baselines();
    forecasters.push(Arc::new(Broken(ModelId::Xgboost)));
    forecasters.push(Arc::new(Panicking(ModelId::Prophet)));
    let ensemble = DynamicEnsemble::new(registry(forecasters), EnsembleConfig::default());

    let forecast = ensemble.forecast(&frame(60), &full_plan(), 7, 0.9).unwrap();
    assert_eq!(
        forecast.models_used(),
        vec![ModelId::Naive, ModelId::MovingAverage]
    );
    let failed: Vec<ModelId> = forecast.failures.iter().map(|f| f.model).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.contains(&ModelId::Xgboost));
    assert!(failed.contains(&ModelId::Prophet));
    assert!(
        forecast
            .failures
            .iter()
            .any(|f| f.reason.contains("panicked"))
    );
}

#[test]
fn baselines_fit_series_near_the_float_limit() {
    let dates: Vec<String> = (0..20u64)
        .map(|i| {
            start()
                .checked_add_days(Days::new(i))
                .unwrap()
                .format("%Y-%m-%d")
                .to_string()
        })
        .collect();
    let target: Vec<f64> = (0..20)
        .map(|i| if i % 2 == 0 { 1e200 } else { 3e200 })
        .collect();
    let data = DataFrame::new(vec![
        Series::new("date".into(), dates).into(),
        Series::new("target".into(), target).into(),
    ])
    .unwrap();
    let huge = NormalizedFrame::try_new(data).unwrap();

    let chain = plan(&[ModelId::Ensemble, ModelId::Naive, ModelId::MovingAverage]);
    let forecast = DynamicEnsemble::new(registry(baselines()), EnsembleConfig::default())
        .forecast(&huge, &chain, 5, 0.95)
        .unwrap();
    assert!(forecast.failures.is_empty(), "{:?}", forecast.failures);
    assert_eq!(forecast.components.len(), 2);
    for step in 0..5 {
        assert!(forecast.point[step].is_finite());
        assert!(forecast.lower[step].is_finite());
        assert!(forecast.upper[step].is_finite());
        assert!(forecast.lower[step] <= forecast.point[step]);
        assert!(forecast.point[step] <= forecast.upper[step]);
    }
}

#[test]
fn fallback_chain_uses_first_survivor_alone() {
    let mut forecasters = baselines();
    forecasters.push(Arc::new(Broken(ModelId::Prophet)));
    let ensemble = DynamicEnsemble::new(registry(forecasters), EnsembleConfig::default());

    let chain = plan(&[ModelId::Prophet, ModelId::Naive, ModelId::MovingAverage]);
    let forecast = ensemble.forecast(&frame(40), &chain, 5, 0.95).unwrap();
    assert_eq!(forecast.strategy, CombinationStrategy::Fallback);
    assert_eq!(forecast.models_used(), vec![ModelId::Naive]);
    let naive = forecast.component(ModelId::Naive).unwrap();
    assert_eq!(forecast.point, naive.predictions);
    for (combined, own) in forecast.lower.iter().zip(&naive.lower_bound) {
        assert!((combined - own).abs() < 1e-9);
    }
}

#[test]
fn slow_models_are_timed_out() {
    let mut forecasters = baselines();
    forecasters.push(Arc::new(Slow {
        id: ModelId::Prophet,
        delay: Duration::from_secs(2),
    }));
    let config = EnsembleConfig {
        timeout_ms: 100,
        ..EnsembleConfig::default()
    };
    let ensemble = DynamicEnsemble::new(registry(forecasters), config);

    let forecast = ensemble.forecast(&frame(60), &full_plan(), 3, 0.95).unwrap();
    let prophet = forecast
        .failures
        .iter()
        .find(|f| f.model == ModelId::Prophet)
        .expect("prophet should have timed out");
    assert!(prophet.reason.contains("timed out"));
    assert!(!forecast.weights.contains(ModelId::Prophet));
}

#[test]
fn cancelling_before_start_reports_every_model() {
    let token = CancellationToken::new();
    token.cancel();
    let events = RefCell::new(Vec::new());
    let record = |event: &ProgressEvent| events.borrow_mut().push(event.clone());
    let options = ForecastOptions::default()
        .with_cancel(token)
        .with_progress(&record);

    let err = DynamicEnsemble::default()
        .forecast_with(&frame(60), &full_plan(), 3, 0.95, options)
        .unwrap_err();
    assert!(matches!(err, EnsembleError::Cancelled));
    let cancelled = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Cancelled { .. }))
        .count();
    assert_eq!(cancelled, 4);
}

#[test]
fn cancelling_mid_run_keeps_completed_models() {
    let token = CancellationToken::new();
    let mut forecasters = baselines();
    forecasters.push(Arc::new(Slow {
        id: ModelId::Xgboost,
        delay: Duration::ZERO,
    }));
    forecasters.push(Arc::new(Canceller {
        id: ModelId::Prophet,
        token: token.clone(),
    }));
    let config = EnsembleConfig {
        max_workers: 1,
        ..EnsembleConfig::default()
    };
    let ensemble = DynamicEnsemble::new(registry(forecasters), config);
    let ordered = plan(&[
        ModelId::Ensemble,
        ModelId::Xgboost,
        ModelId::Prophet,
        ModelId::Naive,
        ModelId::MovingAverage,
    ]);

    let forecast = ensemble
        .forecast_with(
            &frame(40),
            &ordered,
            3,
            0.95,
            ForecastOptions::default().with_cancel(token),
        )
        .unwrap();
    assert_eq!(forecast.models_used(), vec![ModelId::Xgboost]);
    assert!(forecast.cancelled.contains(&ModelId::Prophet));
    assert!(forecast.cancelled.contains(&ModelId::Naive));
    assert!(forecast.cancelled.contains(&ModelId::MovingAverage));
}

#[test]
fn progress_follows_model_lifecycle() {
    let events = RefCell::new(Vec::new());
    let record = |event: &ProgressEvent| events.borrow_mut().push(event.clone());
    let ensemble = DynamicEnsemble::new(registry(baselines()), EnsembleConfig::default());
    ensemble
        .forecast_with(
            &frame(20),
            &plan(&[ModelId::Naive, ModelId::MovingAverage]),
            2,
            0.8,
            ForecastOptions::default().with_progress(&record),
        )
        .unwrap();

    let naive: Vec<&'static str> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Queued { model: ModelId::Naive } => Some("queued"),
            ProgressEvent::Training { model: ModelId::Naive } => Some("training"),
            ProgressEvent::Completed {
                model: ModelId::Naive,
                ..
            } => Some("completed"),
            _ => None,
        })
        .collect();
    assert_eq!(naive, vec!["queued", "training", "completed"]);
}

#[test]
fn every_model_failing_is_a_pipeline_failure() {
    let ensemble = DynamicEnsemble::new(
        registry(vec![
            Arc::new(Broken(ModelId::Naive)),
            Arc::new(Broken(ModelId::MovingAverage)),
        ]),
        EnsembleConfig::default(),
    );
    let err = ensemble
        .forecast(
            &frame(20),
            &plan(&[ModelId::Naive, ModelId::MovingAverage]),
            2,
            0.95,
        )
        .unwrap_err();
    match err {
        EnsembleError::PipelineFailure { failures } => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }

    let unregistered = DynamicEnsemble::new(ForecasterRegistry::empty(), EnsembleConfig::default());
    assert!(matches!(
        unregistered.forecast(&frame(20), &plan(&[]), 2, 0.95),
        Err(EnsembleError::PipelineFailure { .. })
    ));
}

#[test]
fn empty_frames_and_bad_requests_are_rejected() {
    let empty = NormalizedFrame::try_new(
        DataFrame::new(vec![
            Series::new("date".into(), Vec::<String>::new()).into(),
            Series::new("target".into(), Vec::<f64>::new()).into(),
        ])
        .unwrap(),
    )
    .unwrap();
    let ensemble = DynamicEnsemble::default();
    assert!(matches!(
        ensemble.forecast(&empty, &full_plan(), 3, 0.95),
        Err(EnsembleError::PipelineFailure { .. })
    ));
    assert!(matches!(
        ensemble.forecast(&frame(20), &full_plan(), 0, 0.95),
        Err(EnsembleError::InvalidRequest { .. })
    ));
    assert!(matches!(
        ensemble.forecast(&frame(20), &full_plan(), 3, 1.5),
        Err(EnsembleError::InvalidRequest { .. })
    ));
}

#[test]
fn historical_weights_shift_the_combination() {
    let ensemble = DynamicEnsemble::new(registry(baselines()), EnsembleConfig::default());
    let both = plan(&[ModelId::Ensemble, ModelId::Naive, ModelId::MovingAverage]);
    let history = EnsembleWeights::normalized([(ModelId::Naive, 0.9), (ModelId::MovingAverage, 0.1)]);

    let forecast = ensemble
        .forecast_with(
            &frame(40),
            &both,
            2,
            0.95,
            ForecastOptions::default().with_weights(&history),
        )
        .unwrap();
    let naive = forecast.weights.get(ModelId::Naive).unwrap();
    let moving = forecast.weights.get(ModelId::MovingAverage).unwrap();
    assert!(naive > moving);
    assert!((naive + moving - 1.0).abs() < 1e-12);
}
