//! CSV ingestion for Forecast Studio.
//!
//! Uploaded files are read as untyped text: every column of the resulting
//! `DataFrame` is a nullable string column, and typing is left to the data
//! adapter once the schema is known.

pub mod csv_table;
pub mod error;

pub use csv_table::{
    ColumnHint, CsvTable, build_column_hints, read_csv_frame, read_csv_reader, read_csv_table,
    table_from_rows,
};
pub use error::{IngestError, Result};
