//! Errors raised while loading an upload.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The csv reader rejected a record (bad quoting, invalid UTF-8).
    #[error("malformed CSV in {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// An in-memory row does not match the header width.
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cannot build table: {0}")]
    Frame(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
