//! The canonical long-form frame handed to routing and forecasting.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fcast_common::{column_f64, column_strings, date_to_days};
use fcast_model::CanonicalRole;
use polars::prelude::{Column, DataFrame, DataType, NamedFrom, Series};

use crate::datetime::parse_date;
use crate::error::{AdapterError, Result};

pub const DATE_COLUMN: &str = "date";
pub const TARGET_COLUMN: &str = "target";
pub const ITEM_COLUMN: &str = "item";
pub const LOCATION_COLUMN: &str = "location";

/// Long-form time series in the canonical schema.
///
/// Columns: `date` (polars `Date`), `target` (`f64`), optional `item` and
/// `location` (strings), then numeric exogenous columns. Rows are sorted by
/// date within each item/location group, keys are unique and neither `date`
/// nor `target` has missing values.
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    data: DataFrame,
}

/// One observation of the canonical frame, before it becomes columns.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record {
    pub date: NaiveDate,
    pub item: Option<String>,
    pub location: Option<String>,
    pub target: Option<f64>,
    pub exogenous: Vec<Option<f64>>,
}

/// The whole frame collapsed to one value per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedSeries {
    /// Distinct dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Target summed over every group at each date.
    pub target: Vec<f64>,
    /// Exogenous values averaged over groups at each date.
    pub exogenous: BTreeMap<String, Vec<f64>>,
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

impl NormalizedFrame {
    /// Wrap a frame that already follows the canonical layout.
    ///
    /// Checks that `date` and `target` exist and are complete.
    pub fn try_new(data: DataFrame) -> Result<Self> {
        for required in [DATE_COLUMN, TARGET_COLUMN] {
            if data.column(required).is_err() {
                return Err(AdapterError::validation(format!(
                    "normalized frame is missing the '{required}' column"
                )));
            }
        }
        let frame = Self { data };
        let dates = column_strings(&frame.data, DATE_COLUMN)?;
        if dates.iter().any(|d| d.as_deref().and_then(parse_date).is_none()) {
            return Err(AdapterError::validation("normalized frame has missing dates"));
        }
        if column_f64(&frame.data, TARGET_COLUMN)?.iter().any(Option::is_none) {
            return Err(AdapterError::validation("normalized frame has missing targets"));
        }
        Ok(frame)
    }

    pub(crate) fn from_records(
        records: &[Record],
        has_item: bool,
        has_location: bool,
        exogenous: &[String],
    ) -> Result<Self> {
        let days: Vec<i32> = records.iter().map(|r| date_to_days(r.date)).collect();
        let mut columns: Vec<Column> = Vec::with_capacity(4 + exogenous.len());
        columns.push(
            Series::new(DATE_COLUMN.into(), days)
                .cast(&DataType::Date)?
                .into(),
        );
        let target: Vec<f64> = records.iter().map(|r| r.target.unwrap_or(0.0)).collect();
        columns.push(Series::new(TARGET_COLUMN.into(), target).into());
        if has_item {
            let items: Vec<Option<&str>> = records.iter().map(|r| r.item.as_deref()).collect();
            columns.push(Series::new(ITEM_COLUMN.into(), items).into());
        }
        if has_location {
            let locations: Vec<Option<&str>> =
                records.iter().map(|r| r.location.as_deref()).collect();
            columns.push(Series::new(LOCATION_COLUMN.into(), locations).into());
        }
        for (idx, name) in exogenous.iter().enumerate() {
            let values: Vec<Option<f64>> = records
                .iter()
                .map(|r| r.exogenous.get(idx).copied().flatten())
                .collect();
            columns.push(Series::new(name.as_str().into(), values).into());
        }
        Ok(Self {
            data: DataFrame::new(columns)?,
        })
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn into_inner(self) -> DataFrame {
        self.data
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.column(name).is_ok()
    }

    /// Columns beyond the canonical key and target columns.
    pub fn exogenous_columns(&self) -> Vec<String> {
        let canonical = [
            CanonicalRole::Date,
            CanonicalRole::Target,
            CanonicalRole::Item,
            CanonicalRole::Location,
        ]
        .map(|role| role.frame_column());
        self.column_names()
            .into_iter()
            .filter(|name| !canonical.contains(&name.as_str()))
            .collect()
    }

    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        self.dates_in(DATE_COLUMN)
    }

    /// Dates of any column, parsed leniently.
    pub fn dates_in(&self, column: &str) -> Result<Vec<NaiveDate>> {
        column_strings(&self.data, column)?
            .into_iter()
            .map(|cell| {
                cell.as_deref().and_then(parse_date).ok_or_else(|| {
                    AdapterError::validation(format!("column '{column}' has a missing date"))
                })
            })
            .collect()
    }

    /// Numeric values of a column; missing or non-numeric cells are `None`.
    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        Ok(column_f64(&self.data, column)?)
    }

    pub fn targets(&self) -> Result<Vec<f64>> {
        Ok(self.values(TARGET_COLUMN)?.into_iter().flatten().collect())
    }

    /// Sum the target and average exogenous columns per date.
    pub fn aggregate(&self) -> Result<AggregatedSeries> {
        self.aggregate_by(DATE_COLUMN, TARGET_COLUMN)
    }

    /// [`Self::aggregate`] over explicitly named date and target columns.
    pub fn aggregate_by(&self, date_col: &str, target_col: &str) -> Result<AggregatedSeries> {
        let dates = self.dates_in(date_col)?;
        let target = self.values(target_col)?;
        let exogenous_names: Vec<String> = self
            .exogenous_columns()
            .into_iter()
            .filter(|name| name != date_col && name != target_col)
            .collect();
        let exogenous_values: Vec<Vec<Option<f64>>> = exogenous_names
            .iter()
            .map(|name| self.values(name))
            .collect::<Result<_>>()?;

        struct Bucket {
            target: f64,
            exo_sum: Vec<f64>,
            exo_count: Vec<usize>,
        }
        let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
        for (row, date) in dates.iter().enumerate() {
            let bucket = buckets.entry(*date).or_insert_with(|| Bucket {
                target: 0.0,
                exo_sum: vec![0.0; exogenous_names.len()],
                exo_count: vec![0; exogenous_names.len()],
            });
            bucket.target += target[row].unwrap_or(0.0);
            for (idx, column) in exogenous_values.iter().enumerate() {
                if let Some(value) = column[row] {
                    bucket.exo_sum[idx] += value;
                    bucket.exo_count[idx] += 1;
                }
            }
        }

        let mut series = AggregatedSeries {
            dates: Vec::with_capacity(buckets.len()),
            target: Vec::with_capacity(buckets.len()),
            exogenous: exogenous_names
                .iter()
                .map(|name| (name.clone(), Vec::with_capacity(buckets.len())))
                .collect(),
        };
        for (date, bucket) in buckets {
            series.dates.push(date);
            series.target.push(bucket.target);
            for (idx, name) in exogenous_names.iter().enumerate() {
                let mean = if bucket.exo_count[idx] == 0 {
                    0.0
                } else {
                    bucket.exo_sum[idx] / bucket.exo_count[idx] as f64
                };
                if let Some(values) = series.exogenous.get_mut(name) {
                    values.push(mean);
                }
            }
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, item: &str, target: f64, promo: f64) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            item: Some(item.to_string()),
            location: None,
            target: Some(target),
            exogenous: vec![Some(promo)],
        }
    }

    #[test]
    fn aggregate_sums_targets_and_averages_exogenous() {
        let records = vec![
            record(1, "A", 2.0, 1.0),
            record(2, "A", 3.0, 0.0),
            record(1, "B", 5.0, 0.0),
        ];
        let frame =
            NormalizedFrame::from_records(&records, true, false, &["promo".to_string()]).unwrap();
        assert_eq!(frame.exogenous_columns(), vec!["promo"]);

        let series = frame.aggregate().unwrap();
        assert_eq!(series.target, vec![7.0, 3.0]);
        assert_eq!(series.exogenous["promo"], vec![0.5, 0.0]);
        assert_eq!(series.dates[0], NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn try_new_requires_canonical_columns() {
        let df = DataFrame::new(vec![
            Series::new("day".into(), vec!["2023-01-01"]).into(),
            Series::new("target".into(), vec![1.0]).into(),
        ])
        .unwrap();
        assert!(matches!(
            NormalizedFrame::try_new(df),
            Err(AdapterError::Validation { .. })
        ));
    }
}
