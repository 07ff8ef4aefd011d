use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic column category that every forecasting input must expose.
///
/// `Date` and `Target` are always needed to forecast; `Item`, `Location` and
/// `Price` describe the grouping and regressors of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalRole {
    Date,
    Target,
    Item,
    Location,
    Price,
}

impl CanonicalRole {
    /// All roles in matching priority order.
    pub const ALL: [CanonicalRole; 5] = [
        CanonicalRole::Date,
        CanonicalRole::Target,
        CanonicalRole::Item,
        CanonicalRole::Location,
        CanonicalRole::Price,
    ];

    /// Name used for exact matching and in schema reports.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            CanonicalRole::Date => "date",
            CanonicalRole::Target => "quantity",
            CanonicalRole::Item => "product_id",
            CanonicalRole::Location => "location",
            CanonicalRole::Price => "price",
        }
    }

    /// Column name of this role in a normalized frame.
    pub fn frame_column(&self) -> &'static str {
        match self {
            CanonicalRole::Date => "date",
            CanonicalRole::Target => "target",
            CanonicalRole::Item => "item",
            CanonicalRole::Location => "location",
            CanonicalRole::Price => "price",
        }
    }

    /// Roles that identify a series rather than carry values.
    pub fn is_key(&self) -> bool {
        matches!(
            self,
            CanonicalRole::Date | CanonicalRole::Item | CanonicalRole::Location
        )
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for CanonicalRole {
    type Err = String;

    /// Accepts either the canonical name or the frame column name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        CanonicalRole::ALL
            .into_iter()
            .find(|role| role.canonical_name() == lowered || role.frame_column() == lowered)
            .ok_or_else(|| format!("unknown canonical role: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_name_forms() {
        assert_eq!("quantity".parse(), Ok(CanonicalRole::Target));
        assert_eq!("target".parse(), Ok(CanonicalRole::Target));
        assert_eq!(" Product_ID ".parse(), Ok(CanonicalRole::Item));
        assert!("weather".parse::<CanonicalRole>().is_err());
    }
}
