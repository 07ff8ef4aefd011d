//! Data adapter: turns uploaded tables into the canonical long-form frame.
//!
//! The adapter consumes a raw string-typed `DataFrame` together with the
//! [`SchemaReport`](fcast_model::SchemaReport) produced by the schema engine
//! and returns a [`NormalizedFrame`] plus a
//! [`TransformReport`](fcast_model::TransformReport) describing every
//! structural decision it made.

pub mod adapter;
mod cleaning;
pub mod datetime;
pub mod enrichment;
pub mod error;
pub mod frame;
pub mod utils;

pub use adapter::{AdapterConfig, DataAdapter, normalize_dataset};
pub use datetime::{is_date_header, parse_date};
pub use enrichment::{EnrichmentRule, detect_enrichment, enrichment_rules};
pub use error::{AdapterError, Result};
pub use frame::{
    AggregatedSeries, DATE_COLUMN, ITEM_COLUMN, LOCATION_COLUMN, NormalizedFrame, TARGET_COLUMN,
};
pub use utils::to_snake_case;
