use serde::{Deserialize, Serialize};

/// Layout the raw table arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    /// One row per observation.
    #[default]
    Long,
    /// One column per date, one row per series.
    Wide,
}

/// An external data join that would likely improve forecasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentSuggestion {
    pub title: String,
    pub description: String,
    pub benefit: String,
}

/// Everything the data adapter did to reach the canonical long form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformReport {
    /// Ordered, human-readable log of applied transformations.
    pub transformations: Vec<String>,
    pub format: TableFormat,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Date cells that could not be parsed (their rows are dropped).
    pub unparsed_dates: usize,
    /// Rows folded into another row sharing the same key.
    pub duplicates_merged: usize,
    /// Target cells filled by imputation.
    pub imputed_values: usize,
    /// Input columns not carried into the normalized frame.
    pub dropped_columns: Vec<String>,
    /// Numeric regressors kept alongside the target.
    pub exogenous_columns: Vec<String>,
    pub enrichment: Vec<EnrichmentSuggestion>,
}

impl TransformReport {
    pub fn record(&mut self, message: impl Into<String>) {
        self.transformations.push(message.into());
    }
}
