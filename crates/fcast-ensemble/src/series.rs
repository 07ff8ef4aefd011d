//! The single aggregated series every forecaster trains on.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fcast_model::Cadence;
use fcast_transform::AggregatedSeries;

/// Target history with aligned regressors and the inferred cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    /// Regressor columns, each as long as `values`.
    pub exogenous: BTreeMap<String, Vec<f64>>,
    pub cadence: Cadence,
}

impl TrainingSeries {
    pub fn from_aggregated(series: AggregatedSeries) -> Self {
        let cadence = Cadence::infer(&series.dates);
        Self {
            dates: series.dates,
            values: series.target,
            exogenous: series.exogenous,
            cadence,
        }
    }

    /// A daily series without regressors, mostly for tests and tooling.
    pub fn from_values(start: NaiveDate, values: Vec<f64>) -> Self {
        let dates = (0..values.len())
            .filter_map(|i| Cadence::Daily.advance(start, i as u32))
            .collect();
        Self {
            dates,
            values,
            exogenous: BTreeMap::new(),
            cadence: Cadence::Daily,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The first `n` observations.
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            dates: self.dates.iter().take(n).copied().collect(),
            values: self.values[..n].to_vec(),
            exogenous: self
                .exogenous
                .iter()
                .map(|(name, column)| (name.clone(), column.iter().take(n).copied().collect()))
                .collect(),
            cadence: self.cadence,
        }
    }

    /// Dates following the last observation.
    pub fn future_dates(&self, horizon: usize) -> Option<Vec<NaiveDate>> {
        let last = self.last_date()?;
        (1..=horizon)
            .map(|step| self.cadence.advance(last, u32::try_from(step).ok()?))
            .collect()
    }
}
