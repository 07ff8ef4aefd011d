//! Schema inference results.
//!
//! A [`SchemaReport`] is produced once per uploaded dataset by the schema
//! engine and consumed read-only by the data adapter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::role::CanonicalRole;

/// How a column was matched to its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Normalized name equals the role name.
    Exact,
    /// Normalized name equals a known synonym.
    Synonym,
    /// String similarity above the acceptance threshold.
    Fuzzy,
}

/// One input column assigned to one canonical role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Original (untrimmed) input column name.
    pub column: String,
    /// Role the column plays in the canonical schema.
    pub role: CanonicalRole,
    /// Confidence on a 0-100 scale.
    pub confidence: f64,
    /// Matching tier that produced the mapping.
    pub method: MatchMethod,
}

/// Outcome of column-name analysis for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    /// Accepted mappings, at most one per role and one per column.
    pub mapped_schema: Vec<ColumnMapping>,
    /// Aggregate confidence on a 0-100 scale.
    pub overall_confidence: f64,
    /// Required roles without a matching column.
    pub missing_required: Vec<CanonicalRole>,
    /// Input columns that were not assigned a role.
    pub unmapped_columns: Vec<String>,
    /// Business domain inferred from the roles that are present.
    pub detected_domain: String,
}

impl SchemaReport {
    /// Mapping for a role, if the role was matched.
    pub fn mapping_for(&self, role: CanonicalRole) -> Option<&ColumnMapping> {
        self.mapped_schema.iter().find(|m| m.role == role)
    }

    /// Input column mapped to a role.
    pub fn column_for(&self, role: CanonicalRole) -> Option<&str> {
        self.mapping_for(role).map(|m| m.column.as_str())
    }

    /// Role assigned to an input column.
    pub fn role_of(&self, column: &str) -> Option<CanonicalRole> {
        self.mapped_schema
            .iter()
            .find(|m| m.column == column)
            .map(|m| m.role)
    }

    pub fn has_role(&self, role: CanonicalRole) -> bool {
        self.mapping_for(role).is_some()
    }

    /// Canonical role name to input column, e.g. `"date" -> "timestamp"`.
    pub fn name_map(&self) -> BTreeMap<&'static str, &str> {
        self.mapped_schema
            .iter()
            .map(|m| (m.role.canonical_name(), m.column.as_str()))
            .collect()
    }

    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.overall_confidence < threshold
    }
}
