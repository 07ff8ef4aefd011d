use fcast_model::ModelId;
use fcast_route::{ModelRouter, RouterConfig, route_model};
use fcast_transform::NormalizedFrame;
use polars::prelude::{Column, DataFrame, NamedFrom, Series};

fn frame(rows: usize, with_price: bool) -> NormalizedFrame {
    let dates: Vec<String> = (0..rows)
        .map(|i| format!("2023-{:02}-{:02}", 1 + i / 28, 1 + i % 28))
        .collect();
    let target: Vec<f64> = (0..rows).map(|i| 10.0 + (i % 7) as f64).collect();
    let mut columns: Vec<Column> = vec![
        Series::new("date".into(), dates).into(),
        Series::new("target".into(), target).into(),
        Series::new("item".into(), vec!["A"; rows]).into(),
    ];
    if with_price {
        let price: Vec<f64> = (0..rows).map(|i| 2.0 + (i % 3) as f64).collect();
        columns.push(Series::new("price".into(), price).into());
    }
    NormalizedFrame::try_new(DataFrame::new(columns).unwrap()).unwrap()
}

#[test]
fn small_data_routes_to_baselines_only() {
    let plan = route_model(&frame(12, true), "target", "date");
    assert_eq!(plan.models, vec![ModelId::Naive, ModelId::MovingAverage]);
    assert!(plan.is_baseline_only());
    assert_eq!(plan.characteristics.row_count, 12);
}

#[test]
fn large_data_with_regressors_routes_everything() {
    let plan = route_model(&frame(60, true), "target", "date");
    assert_eq!(
        plan.models,
        vec![
            ModelId::Ensemble,
            ModelId::Xgboost,
            ModelId::Prophet,
            ModelId::Naive,
            ModelId::MovingAverage,
        ]
    );
    assert_eq!(plan.characteristics.exogenous_columns, vec!["price"]);
    assert!(plan.characteristics.volatility.is_some());
    assert_eq!(plan.reasons.len(), plan.models.len() - 1);
}

#[test]
fn medium_data_without_regressors_is_a_fallback_chain() {
    let plan = route_model(&frame(40, false), "target", "date");
    assert_eq!(
        plan.models,
        vec![ModelId::Prophet, ModelId::Naive, ModelId::MovingAverage]
    );
    assert!(!plan.uses_ensemble());
}

#[test]
fn thresholds_have_documented_boundaries() {
    let at_min = route_model(&frame(30, false), "target", "date");
    assert!(at_min.contains(ModelId::Prophet));

    let at_ensemble = route_model(&frame(50, false), "target", "date");
    assert!(!at_ensemble.uses_ensemble());
    assert!(route_model(&frame(51, false), "target", "date").uses_ensemble());
}

#[test]
fn custom_thresholds_apply() {
    let router = ModelRouter::with_config(RouterConfig {
        min_rows: 5,
        ensemble_rows: 8,
    });
    let plan = router.route(&frame(10, false), "target", "date");
    assert!(plan.uses_ensemble());
}

#[test]
fn unknown_target_column_still_routes() {
    let plan = route_model(&frame(35, false), "sales", "date");
    assert_eq!(plan.characteristics.volatility, None);
    // "target" is now an ordinary extra column.
    assert!(plan.contains(ModelId::Xgboost));
    assert_eq!(plan.models.last(), Some(&ModelId::MovingAverage));
}

#[test]
fn plans_serialize_with_snake_case_ids() {
    let plan = route_model(&frame(12, false), "target", "date");
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["models"], serde_json::json!(["naive", "moving_average"]));
}
