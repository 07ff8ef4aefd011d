use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use csv::ReaderBuilder;
use fcast_common::parse_measure;
use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use serde::Serialize;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Raw text table: one header per column, rows padded to the header width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Per-column profile used when previewing an upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnHint {
    /// Every non-empty cell parses as a number.
    pub is_numeric: bool,
    pub unique_ratio: f64,
    pub null_ratio: f64,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Convert into a `DataFrame` of nullable string columns; blank cells are null.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .headers
            .iter()
            .enumerate()
            .map(|(col_idx, header)| {
                let values: Vec<Option<&str>> = self
                    .rows
                    .iter()
                    .map(|row| {
                        row.get(col_idx)
                            .map(String::as_str)
                            .filter(|value| !value.trim().is_empty())
                    })
                    .collect();
                Series::new(header.as_str().into(), values).into()
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

/// Trims a cell and drops a stray byte-order mark.
fn clean_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Like [`clean_cell`], with inner whitespace runs collapsed to one space.
fn clean_header(raw: &str) -> String {
    clean_cell(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Blank headers become `column_N`; repeated headers get a numeric suffix.
fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    raw.iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                header.clone()
            };
            let mut name = base.clone();
            let mut suffix = 2usize;
            while !seen.insert(name.clone()) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

/// Shares of a row's cells that are filled, numeric and wordy.
#[derive(Debug, Clone, Copy)]
struct RowShape {
    width: usize,
    filled: f64,
    numeric: f64,
    wordy: f64,
}

impl RowShape {
    fn of(row: &[String]) -> Self {
        let cells: Vec<&str> = row
            .iter()
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .collect();
        let share = |count: usize| {
            if row.is_empty() {
                0.0
            } else {
                count as f64 / row.len() as f64
            }
        };
        Self {
            width: row.len(),
            filled: share(cells.len()),
            numeric: share(cells.iter().filter(|cell| parse_measure(cell).is_some()).count()),
            wordy: share(
                cells
                    .iter()
                    .filter(|cell| cell.chars().any(char::is_alphabetic))
                    .count(),
            ),
        }
    }

    fn looks_like_data(self) -> bool {
        self.numeric >= 0.2
    }

    fn looks_like_header(self) -> bool {
        self.filled >= 0.8 && self.wordy >= 0.5 && self.numeric <= 0.1
    }
}

/// Index of the header row: the widest header-looking row among the first
/// five, above the first row that looks like data. Defaults to row 0 so that
/// title lines of spreadsheet exports are skipped but plain files are not.
fn detect_header_row(rows: &[Vec<String>]) -> usize {
    let shapes: Vec<RowShape> = rows.iter().take(5).map(|row| RowShape::of(row)).collect();
    let first_data = shapes
        .iter()
        .position(|shape| shape.looks_like_data())
        .unwrap_or(1)
        .max(1);
    let mut header = 0;
    for (index, shape) in shapes.iter().enumerate().take(first_data) {
        if shape.looks_like_header() && shape.width >= shapes[header].width {
            header = index;
        }
    }
    header
}

/// Read CSV text from any reader. `source` only labels errors.
pub fn read_csv_reader<R: Read>(reader: R, source: &Path) -> Result<CsvTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| IngestError::CsvParse {
            path: source.to_path_buf(),
            message: err.to_string(),
        })?;
        let row: Vec<String> = record.iter().map(clean_cell).collect();
        if row.iter().all(|value| value.is_empty()) {
            continue;
        }
        raw_rows.push(row);
    }
    if raw_rows.is_empty() {
        return Ok(CsvTable {
            headers: Vec::new(),
            rows: Vec::new(),
        });
    }
    let header_index = detect_header_row(&raw_rows);
    let raw_headers: Vec<String> = raw_rows[header_index]
        .iter()
        .map(|value| clean_header(value))
        .collect();
    let headers = unique_headers(&raw_headers);
    let rows: Vec<Vec<String>> = raw_rows
        .iter()
        .skip(header_index + 1)
        .map(|record| {
            (0..headers.len())
                .map(|idx| record.get(idx).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    debug!(
        source = %source.display(),
        header_row = header_index,
        columns = headers.len(),
        rows = rows.len(),
        "loaded csv table"
    );
    Ok(CsvTable { headers, rows })
}

pub fn read_csv_table(path: &Path) -> Result<CsvTable> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => IngestError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => IngestError::FileRead {
            path: path.to_path_buf(),
            source,
        },
    })?;
    read_csv_reader(file, path)
}

/// Read a CSV file straight into a string-typed `DataFrame`.
pub fn read_csv_frame(path: &Path) -> Result<DataFrame> {
    read_csv_table(path)?.to_dataframe()
}

/// Build a string-typed `DataFrame` from in-memory rows.
pub fn table_from_rows<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> Result<DataFrame> {
    let raw_headers: Vec<String> = headers
        .iter()
        .map(|header| clean_header(header.as_ref()))
        .collect();
    let mut table_rows = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != headers.len() {
            return Err(IngestError::RowWidth {
                row: idx,
                expected: headers.len(),
                found: row.len(),
            });
        }
        table_rows.push(row.iter().map(|cell| clean_cell(cell.as_ref())).collect());
    }
    CsvTable {
        headers: unique_headers(&raw_headers),
        rows: table_rows,
    }
    .to_dataframe()
}

pub fn build_column_hints(table: &CsvTable) -> BTreeMap<String, ColumnHint> {
    let mut hints = BTreeMap::new();
    let row_count = table.rows.len();
    for (col_idx, header) in table.headers.iter().enumerate() {
        let mut non_null = 0usize;
        let mut numeric = 0usize;
        let mut uniques = BTreeSet::new();
        for row in &table.rows {
            let trimmed = row.get(col_idx).map(|v| v.trim()).unwrap_or("");
            if trimmed.is_empty() {
                continue;
            }
            non_null += 1;
            uniques.insert(trimmed);
            if parse_measure(trimmed).is_some() {
                numeric += 1;
            }
        }
        let null_ratio = if row_count == 0 {
            1.0
        } else {
            row_count.saturating_sub(non_null) as f64 / row_count as f64
        };
        let unique_ratio = if non_null == 0 {
            0.0
        } else {
            uniques.len() as f64 / non_null as f64
        };
        hints.insert(
            header.clone(),
            ColumnHint {
                is_numeric: non_null > 0 && numeric == non_null,
                unique_ratio,
                null_ratio,
            },
        );
    }
    hints
}
