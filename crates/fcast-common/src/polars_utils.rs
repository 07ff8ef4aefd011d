//! Reading untyped polars cells as text, quantities and calendar days.

use chrono::{Datelike, NaiveDate};
use polars::prelude::{AnyValue, DataFrame, PolarsResult};

/// Days between 0001-01-01 and 1970-01-01, the epoch of polars `Date`.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Characters stripped from a quantity before parsing.
const MEASURE_NOISE: &[char] = &['$', '€', '£', '¥', ',', ' ', '_', '\u{a0}'];

/// Renders a cell as text. `Null` is empty, floats drop trailing zeros and
/// dates use `YYYY-MM-DD`.
///
/// ```
/// use polars::prelude::AnyValue;
/// use fcast_common::cell_text;
///
/// assert_eq!(cell_text(AnyValue::Null), "");
/// assert_eq!(cell_text(AnyValue::Float64(12.50)), "12.5");
/// assert_eq!(cell_text(AnyValue::String("Store 4")), "Store 4");
/// ```
pub fn cell_text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(text) => text.to_owned(),
        AnyValue::StringOwned(text) => text.to_string(),
        AnyValue::Float32(v) => trim_float(f64::from(v)),
        AnyValue::Float64(v) => trim_float(v),
        AnyValue::Date(days) => days_to_date(days)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        other => {
            let rendered = other.to_string();
            match rendered.strip_prefix('"').and_then(|inner| inner.strip_suffix('"')) {
                Some(inner) => inner.to_owned(),
                None => rendered,
            }
        }
    }
}

fn trim_float(value: f64) -> String {
    let text = value.to_string();
    if !text.contains('.') {
        return text;
    }
    match text.trim_end_matches('0').trim_end_matches('.') {
        "" | "-" => "0".to_owned(),
        trimmed => trimmed.to_owned(),
    }
}

/// Reads a cell as a finite number. Text goes through [`parse_measure`], so
/// `"$1,200"` reads as `1200.0`.
pub fn cell_number(value: AnyValue<'_>) -> Option<f64> {
    let number = match value {
        AnyValue::Int8(v) => f64::from(v),
        AnyValue::Int16(v) => f64::from(v),
        AnyValue::Int32(v) => f64::from(v),
        AnyValue::Int64(v) => v as f64,
        AnyValue::UInt8(v) => f64::from(v),
        AnyValue::UInt16(v) => f64::from(v),
        AnyValue::UInt32(v) => f64::from(v),
        AnyValue::UInt64(v) => v as f64,
        AnyValue::Float32(v) => f64::from(v),
        AnyValue::Float64(v) => v,
        AnyValue::String(text) => return parse_measure(text),
        AnyValue::StringOwned(text) => return parse_measure(&text),
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Parses a user-entered quantity, tolerating currency symbols, thousands
/// separators and inner spaces (`"$ 1,234.50"` is `1234.5`).
pub fn parse_measure(value: &str) -> Option<f64> {
    let cleaned = value.trim().replace(MEASURE_NOISE, "");
    if !cleaned.bytes().any(|byte| byte.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Reads a column as non-blank text, one entry per row.
pub fn column_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|row| {
            column.get(row).map(|cell| {
                let text = cell_text(cell);
                (!text.trim().is_empty()).then_some(text)
            })
        })
        .collect()
}

/// Reads a column as finite numbers, one entry per row.
pub fn column_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|row| column.get(row).map(cell_number))
        .collect()
}

/// Day number of `date` in the polars `Date` encoding.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Inverse of [`date_to_days`].
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}
