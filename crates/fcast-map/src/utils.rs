//! Utility functions for column-name matching.

/// Normalizes a column name for comparison: lowercased with every
/// non-alphanumeric character removed (`"Product_ID"` becomes `"productid"`).
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
