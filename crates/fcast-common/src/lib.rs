//! Shared utilities for Forecast Studio crates.
//!
//! Every stage reads untyped tabular data; this crate turns polars cells
//! into text and quantities and converts the day numbers polars uses for
//! `Date` columns.

pub mod polars_utils;

pub use polars_utils::{
    cell_number, cell_text, column_f64, column_strings, date_to_days, days_to_date, parse_measure,
};
