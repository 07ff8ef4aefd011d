//! Reshaping arbitrary tables into the canonical long form.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::NaiveDate;
use fcast_common::{column_strings, parse_measure};
use fcast_model::{CanonicalRole, SchemaReport, TableFormat, TransformReport};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::cleaning::{impute_missing, merge_duplicates};
use crate::datetime::{is_date_header, parse_date};
use crate::enrichment::detect_enrichment;
use crate::error::{AdapterError, Result};
use crate::frame::{NormalizedFrame, Record};
use crate::utils::{to_snake_case, unique_name};

/// Thresholds for the adapter's structural heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Date-like headers needed before a table is treated as wide.
    pub wide_min_date_columns: usize,
    /// Minimum share of all columns that must be date-like headers.
    pub wide_min_share: f64,
    /// Share of non-empty cells that must parse for a column to be read as
    /// dates or numbers when no mapping says so.
    pub parse_threshold: f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            wide_min_date_columns: 3,
            wide_min_share: 0.5,
            parse_threshold: 0.8,
        }
    }
}

/// Untyped view of the input: headers plus text cells by column.
struct RawTable {
    headers: Vec<String>,
    cells: Vec<Vec<Option<String>>>,
    height: usize,
}

impl RawTable {
    fn read(df: &DataFrame) -> Result<Self> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let cells = headers
            .iter()
            .map(|name| column_strings(df, name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            headers,
            cells,
            height: df.height(),
        })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    fn cell(&self, column: usize, row: usize) -> Option<&str> {
        self.cells[column][row].as_deref()
    }

    /// Share of non-empty cells satisfying `accept`; `None` for an empty column.
    fn share(&self, column: usize, accept: impl Fn(&str) -> bool) -> Option<f64> {
        let (hits, total) = self.cells[column]
            .iter()
            .flatten()
            .fold((0usize, 0usize), |(hits, total), cell| {
                (hits + usize::from(accept(cell.as_str())), total + 1)
            });
        (total > 0).then(|| hits as f64 / total as f64)
    }
}

/// Column roles resolved for a long-format table.
struct LongLayout {
    date: usize,
    target: usize,
    item: Option<usize>,
    location: Option<usize>,
    /// Source column and output name of every retained regressor.
    exogenous: Vec<(usize, String)>,
}

/// Records plus the column set they populate.
struct Extracted {
    records: Vec<Record>,
    has_item: bool,
    has_location: bool,
    exogenous: Vec<String>,
}

/// Transforms raw tables into [`NormalizedFrame`]s.
#[derive(Debug, Clone, Default)]
pub struct DataAdapter {
    config: AdapterConfig,
}

/// Normalize `raw` with the default adapter configuration.
pub fn normalize_dataset(
    raw: &DataFrame,
    schema: &SchemaReport,
) -> Result<(NormalizedFrame, TransformReport)> {
    DataAdapter::new().normalize(raw, schema)
}

impl DataAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AdapterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Reshape, parse, deduplicate and impute `raw` according to `schema`.
    ///
    /// Fails only when no date or no numeric target can be found; every
    /// other irregularity is absorbed and recorded in the report.
    pub fn normalize(
        &self,
        raw: &DataFrame,
        schema: &SchemaReport,
    ) -> Result<(NormalizedFrame, TransformReport)> {
        let span = info_span!("normalize", rows = raw.height(), columns = raw.width());
        let _guard = span.enter();
        let start = Instant::now();

        let table = RawTable::read(raw)?;
        if table.headers.is_empty() || table.height == 0 {
            return Err(AdapterError::validation("the table has no data rows"));
        }
        let mut report = TransformReport {
            rows_in: table.height,
            ..TransformReport::default()
        };

        let date_columns = date_header_columns(&table);
        let enough_dates = date_columns.len() >= self.config.wide_min_date_columns;
        let share = date_columns.len() as f64 / table.headers.len() as f64;
        let extracted = if enough_dates && share >= self.config.wide_min_share {
            self.unpivot(&table, &date_columns, schema, &mut report)
        } else {
            let mut long_report = report.clone();
            match self.resolve_long(&table, schema, &mut long_report) {
                Ok(layout) => {
                    report = long_report;
                    extract_long(&table, &layout, &mut report)
                }
                // Date headers with no usable long-form layout: the identifiers
                // outnumber the dates, but the table is still wide.
                Err(err) if enough_dates => {
                    warn!(%err, "long-form layout failed; unpivoting date headers");
                    self.unpivot(&table, &date_columns, schema, &mut report)
                }
                Err(err) => return Err(err),
            }
        };

        if report.unparsed_dates > 0 {
            warn!(rows = report.unparsed_dates, "dropped rows with unparseable dates");
            report.record(format!(
                "Dropped {} rows whose date could not be parsed",
                report.unparsed_dates
            ));
        }
        if extracted.records.is_empty() {
            return Err(AdapterError::validation("no row has a parseable date"));
        }
        if extracted.records.iter().all(|r| r.target.is_none()) {
            return Err(AdapterError::validation("the target has no numeric values"));
        }

        let exogenous_count = extracted.exogenous.len();
        let (mut records, merged) = merge_duplicates(extracted.records, exogenous_count);
        report.duplicates_merged = merged;
        if merged > 0 {
            report.record(format!(
                "Merged {merged} duplicate rows sharing date, item and location (targets summed)"
            ));
        }

        report.imputed_values = impute_missing(&mut records, exogenous_count);
        if report.imputed_values > 0 {
            report.record(format!(
                "Imputed {} missing target values from neighbouring observations",
                report.imputed_values
            ));
        }

        let header_names: Vec<String> = table.headers.iter().map(|h| to_snake_case(h)).collect();
        report.enrichment = detect_enrichment(&header_names);

        let frame = NormalizedFrame::from_records(
            &records,
            extracted.has_item,
            extracted.has_location,
            &extracted.exogenous,
        )?;
        report.rows_out = frame.height();
        report.exogenous_columns = extracted.exogenous;

        info!(
            format = ?report.format,
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            duplicates_merged = report.duplicates_merged,
            imputed = report.imputed_values,
            duration_ms = start.elapsed().as_millis(),
            "normalize complete"
        );
        Ok((frame, report))
    }

    fn unpivot(
        &self,
        table: &RawTable,
        date_columns: &[(usize, NaiveDate)],
        schema: &SchemaReport,
        report: &mut TransformReport,
    ) -> Extracted {
        report.format = TableFormat::Wide;
        report.record(format!(
            "Detected wide format: {} date columns unpivoted into rows",
            date_columns.len()
        ));

        let date_set: BTreeSet<usize> = date_columns.iter().map(|(idx, _)| *idx).collect();
        let identifiers: Vec<usize> = (0..table.headers.len())
            .filter(|idx| !date_set.contains(idx))
            .collect();
        let mapped = |role: CanonicalRole| {
            schema
                .column_for(role)
                .and_then(|name| table.index_of(name))
                .filter(|idx| identifiers.contains(idx))
        };
        let mut remaining = identifiers.clone();
        let mut take = |preferred: Option<usize>| {
            let chosen = preferred.or_else(|| remaining.first().copied())?;
            remaining.retain(|idx| *idx != chosen);
            Some(chosen)
        };
        let item = take(mapped(CanonicalRole::Item));
        let location = take(mapped(CanonicalRole::Location).filter(|idx| Some(*idx) != item));
        for (role, column) in [("item", item), ("location", location)] {
            if let Some(column) = column {
                report.record(format!("Using '{}' as {role}", table.headers[column]));
            }
        }
        for idx in &remaining {
            report.dropped_columns.push(table.headers[*idx].clone());
        }
        if !remaining.is_empty() {
            report.record(format!(
                "Dropped {} extra identifier columns in wide format",
                remaining.len()
            ));
        }

        let mut records = Vec::with_capacity(table.height * date_columns.len());
        for row in 0..table.height {
            for (column, date) in date_columns {
                records.push(Record {
                    date: *date,
                    item: item.and_then(|c| table.cell(c, row)).map(str::to_string),
                    location: location.and_then(|c| table.cell(c, row)).map(str::to_string),
                    target: table.cell(*column, row).and_then(parse_measure),
                    exogenous: Vec::new(),
                });
            }
        }
        debug!(records = records.len(), "unpivoted wide table");
        Extracted {
            records,
            has_item: item.is_some(),
            has_location: location.is_some(),
            exogenous: Vec::new(),
        }
    }

    fn resolve_long(
        &self,
        table: &RawTable,
        schema: &SchemaReport,
        report: &mut TransformReport,
    ) -> Result<LongLayout> {
        let threshold = self.config.parse_threshold;
        let parses_date = |cell: &str| parse_date(cell).is_some();
        let parses_number = |cell: &str| parse_measure(cell).is_some();
        let mapped = |role: CanonicalRole| {
            schema
                .column_for(role)
                .and_then(|name| table.index_of(name))
        };
        let mut used: BTreeSet<usize> = BTreeSet::new();

        let date = match mapped(CanonicalRole::Date)
            .filter(|idx| table.share(*idx, parses_date).is_some_and(|s| s > 0.0))
        {
            Some(idx) => idx,
            None => {
                let idx = (0..table.headers.len())
                    .find(|idx| table.share(*idx, parses_date).is_some_and(|s| s >= threshold))
                    .ok_or_else(|| {
                        AdapterError::validation("no column could be interpreted as a date")
                    })?;
                warn!(column = %table.headers[idx], "date column inferred from values");
                report.record(format!(
                    "Inferred '{}' as the date column from its values",
                    table.headers[idx]
                ));
                idx
            }
        };
        used.insert(date);

        let item = mapped(CanonicalRole::Item).filter(|idx| !used.contains(idx));
        used.extend(item);
        let location = mapped(CanonicalRole::Location).filter(|idx| !used.contains(idx));
        used.extend(location);

        let target = match mapped(CanonicalRole::Target)
            .filter(|idx| !used.contains(idx))
            .filter(|idx| table.share(*idx, parses_number).is_some_and(|s| s > 0.0))
        {
            Some(idx) => idx,
            None => {
                let price = mapped(CanonicalRole::Price);
                let idx = (0..table.headers.len())
                    .filter(|idx| !used.contains(idx) && Some(*idx) != price)
                    .find(|idx| table.share(*idx, parses_number).is_some_and(|s| s >= threshold))
                    .ok_or_else(|| {
                        AdapterError::validation("no column could be interpreted as a numeric target")
                    })?;
                warn!(column = %table.headers[idx], "target column inferred from values");
                report.record(format!(
                    "Inferred '{}' as the target column from its values",
                    table.headers[idx]
                ));
                idx
            }
        };
        used.insert(target);

        for (role, column) in [
            (CanonicalRole::Date, Some(date)),
            (CanonicalRole::Target, Some(target)),
            (CanonicalRole::Item, item),
            (CanonicalRole::Location, location),
        ] {
            if let Some(column) = column
                && table.headers[column] != role.frame_column()
            {
                report.record(format!(
                    "Renamed '{}' to '{}'",
                    table.headers[column],
                    role.frame_column()
                ));
            }
        }

        let mut taken: Vec<String> = [
            CanonicalRole::Date,
            CanonicalRole::Target,
            CanonicalRole::Item,
            CanonicalRole::Location,
        ]
        .iter()
        .map(|role| role.frame_column().to_string())
        .collect();
        let price = mapped(CanonicalRole::Price).filter(|idx| !used.contains(idx));
        let mut exogenous = Vec::new();
        for idx in 0..table.headers.len() {
            if used.contains(&idx) {
                continue;
            }
            let header = &table.headers[idx];
            let numeric = table.share(idx, parses_number).is_some_and(|s| s >= threshold);
            if !numeric {
                debug!(column = %header, "dropping non-numeric column");
                report.dropped_columns.push(header.clone());
                continue;
            }
            let base = if Some(idx) == price {
                CanonicalRole::Price.frame_column().to_string()
            } else {
                to_snake_case(header)
            };
            let name = unique_name(&base, &taken);
            taken.push(name.clone());
            exogenous.push((idx, name));
        }
        if !exogenous.is_empty() {
            let names: Vec<&str> = exogenous.iter().map(|(_, name)| name.as_str()).collect();
            report.record(format!("Kept numeric regressors: {}", names.join(", ")));
        }
        if !report.dropped_columns.is_empty() {
            report.record(format!(
                "Dropped non-numeric columns: {}",
                report.dropped_columns.join(", ")
            ));
        }

        Ok(LongLayout {
            date,
            target,
            item,
            location,
            exogenous,
        })
    }
}

fn extract_long(table: &RawTable, layout: &LongLayout, report: &mut TransformReport) -> Extracted {
    report.format = TableFormat::Long;
    let mut records = Vec::with_capacity(table.height);
    for row in 0..table.height {
        let Some(date) = table.cell(layout.date, row).and_then(parse_date) else {
            report.unparsed_dates += 1;
            continue;
        };
        records.push(Record {
            date,
            item: layout
                .item
                .and_then(|c| table.cell(c, row))
                .map(str::to_string),
            location: layout
                .location
                .and_then(|c| table.cell(c, row))
                .map(str::to_string),
            target: table.cell(layout.target, row).and_then(parse_measure),
            exogenous: layout
                .exogenous
                .iter()
                .map(|(c, _)| table.cell(*c, row).and_then(parse_measure))
                .collect(),
        });
    }
    Extracted {
        records,
        has_item: layout.item.is_some(),
        has_location: layout.location.is_some(),
        exogenous: layout.exogenous.iter().map(|(_, name)| name.clone()).collect(),
    }
}

/// Header columns that parse as dates, with their dates.
fn date_header_columns(table: &RawTable) -> Vec<(usize, NaiveDate)> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !is_role_name(header) && is_date_header(header))
        .filter_map(|(idx, header)| parse_date(header).map(|date| (idx, date)))
        .collect()
}

/// Headers naming a canonical role never count as date columns.
fn is_role_name(header: &str) -> bool {
    let normalized: String = header
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    CanonicalRole::ALL.iter().any(|role| {
        [role.canonical_name(), role.frame_column()]
            .iter()
            .any(|name| name.replace('_', "") == normalized)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_recognized() {
        assert!(is_role_name("Date"));
        assert!(is_role_name("product_id"));
        assert!(!is_role_name("2023-01-01"));
    }
}
