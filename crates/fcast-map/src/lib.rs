//! Schema normalization engine.
//!
//! Maps arbitrary input column names onto the canonical forecasting roles
//! (`date`, `target`, `item`, `location`, `price`) using exact, synonym and
//! fuzzy name matching, and reports how confident the mapping is.

#![deny(unsafe_code)]

pub mod engine;
pub mod rules;
pub mod utils;

pub use engine::{SchemaConfig, SchemaEngine, analyze_columns};
pub use rules::{DomainRule, RoleRule, SchemaRules, default_rules};
pub use utils::normalize_column_name;
