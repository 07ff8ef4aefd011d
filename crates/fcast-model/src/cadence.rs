//! Observation cadence inferred from the date column.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Spacing between consecutive observations of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    /// Any other fixed spacing, in days.
    Irregular { days: u64 },
}

impl Cadence {
    /// Infer the cadence from the median gap between distinct sorted dates.
    ///
    /// Fewer than two distinct dates defaults to daily.
    pub fn infer(dates: &[NaiveDate]) -> Self {
        let mut distinct: Vec<NaiveDate> = dates.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        let mut gaps: Vec<i64> = distinct
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .collect();
        if gaps.is_empty() {
            return Cadence::Daily;
        }
        gaps.sort_unstable();
        let median = gaps[gaps.len() / 2];
        match median {
            ..=1 => Cadence::Daily,
            6..=8 => Cadence::Weekly,
            28..=31 => Cadence::Monthly,
            89..=92 => Cadence::Quarterly,
            364..=366 => Cadence::Yearly,
            days => Cadence::Irregular { days: days as u64 },
        }
    }

    /// The date `steps` periods after `from`.
    pub fn advance(&self, from: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Cadence::Daily => from.checked_add_days(Days::new(u64::from(steps))),
            Cadence::Weekly => from.checked_add_days(Days::new(7 * u64::from(steps))),
            Cadence::Monthly => from.checked_add_months(Months::new(steps)),
            Cadence::Quarterly => from.checked_add_months(Months::new(3 * steps)),
            Cadence::Yearly => from.checked_add_months(Months::new(12 * steps)),
            Cadence::Irregular { days } => from.checked_add_days(Days::new(days * u64::from(steps))),
        }
    }

    /// Dominant seasonal period, in observations.
    pub fn seasonal_period(&self) -> Option<usize> {
        match self {
            Cadence::Daily => Some(7),
            Cadence::Weekly => Some(52),
            Cadence::Monthly => Some(12),
            Cadence::Quarterly => Some(4),
            Cadence::Yearly | Cadence::Irregular { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Cadence::Daily => "daily".to_string(),
            Cadence::Weekly => "weekly".to_string(),
            Cadence::Monthly => "monthly".to_string(),
            Cadence::Quarterly => "quarterly".to_string(),
            Cadence::Yearly => "yearly".to_string(),
            Cadence::Irregular { days } => format!("every {days} days"),
        }
    }
}
