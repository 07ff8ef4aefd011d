//! Lenient date parsing for user-supplied tables.
//!
//! Every cell is parsed on its own, so a column may freely mix layouts.
//! Numeric dates separated by `/` or `-` are read month-first, falling back
//! to day-first when the month-first reading is not a valid date; dotted
//! dates are read day-first. Two-digit years follow the `%y` convention
//! (`00`-`68` are 2000s, `69`-`99` are 1900s).

use chrono::NaiveDate;

/// Accepted year range; anything outside is treated as a misparse.
const MIN_YEAR: i32 = 1800;
const MAX_YEAR: i32 = 2200;

/// Month-name layouts with a day component.
const NAMED_DAY_FORMATS: &[&str] = &[
    "%d %B %Y", "%d %b %Y", "%B %d %Y", "%b %d %Y", "%B %d, %Y", "%b %d, %Y", "%d-%b-%Y",
    "%d-%B-%Y", "%d-%b-%y", "%d %b %y", "%a, %d %b %Y", "%A, %B %d, %Y",
];

/// Month-name layouts without a day; parsed as the first of the month.
const NAMED_MONTH_FORMATS: &[&str] = &["%B %Y", "%b %Y", "%b-%Y", "%B-%Y", "%b-%y", "%b %y"];

/// Parses a date cell, returning `None` when no supported layout matches.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use fcast_transform::parse_date;
///
/// let jan_2 = NaiveDate::from_ymd_opt(2023, 1, 2);
/// assert_eq!(parse_date("2023-01-02"), jan_2);
/// assert_eq!(parse_date("01/02/2023"), jan_2);
/// assert_eq!(parse_date("2 Jan 2023"), jan_2);
/// assert_eq!(parse_date("20230102"), jan_2);
/// assert_eq!(parse_date("2023-01-02T08:30:00Z"), jan_2);
/// assert_eq!(parse_date("not a date"), None);
/// ```
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim().trim_matches('"');
    if trimmed.is_empty() {
        return None;
    }
    parse_date_only(trimmed)
        .or_else(|| strip_time(trimmed).and_then(parse_date_only))
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&chrono::Datelike::year(date)))
}

/// Whether a header reads as a date, marking a wide-format column.
pub fn is_date_header(name: &str) -> bool {
    parse_date(name).is_some()
}

fn parse_date_only(value: &str) -> Option<NaiveDate> {
    parse_numeric_date(value)
        .or_else(|| parse_compact(value))
        .or_else(|| parse_iso_month(value))
        .or_else(|| parse_named(value))
}

/// Drop a trailing time component: `2023-01-02T08:30:00Z`, `01/02/2023 08:30`.
fn strip_time(value: &str) -> Option<&str> {
    let (head, tail) = value.split_once(['T', ' '])?;
    tail.contains(':').then_some(head)
}

fn parse_numeric_date(value: &str) -> Option<NaiveDate> {
    let separator = value.chars().find(|ch| matches!(ch, '/' | '-' | '.'))?;
    let parts: Vec<&str> = value.split(separator).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|part| part.is_empty() || part.len() > 4 || !part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let numbers: Vec<u32> = parts
        .iter()
        .map(|part| part.parse::<u32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts[0].len() == 4 {
        return NaiveDate::from_ymd_opt(i32::try_from(numbers[0]).ok()?, numbers[1], numbers[2]);
    }
    let year = match parts[2].len() {
        4 => i32::try_from(numbers[2]).ok()?,
        2 => expand_two_digit_year(numbers[2]),
        _ => return None,
    };
    let month_first = NaiveDate::from_ymd_opt(year, numbers[0], numbers[1]);
    let day_first = NaiveDate::from_ymd_opt(year, numbers[1], numbers[0]);
    if separator == '.' {
        day_first.or(month_first)
    } else {
        month_first.or(day_first)
    }
}

fn expand_two_digit_year(year: u32) -> i32 {
    let year = i32::try_from(year).unwrap_or(0);
    if year <= 68 { 2000 + year } else { 1900 + year }
}

/// `YYYYMMDD`.
fn parse_compact(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = value[0..4].parse().ok()?;
    let month = value[4..6].parse().ok()?;
    let day = value[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM` and `YYYY/MM`, as the first of the month.
fn parse_iso_month(value: &str) -> Option<NaiveDate> {
    let (year, month) = value.split_once(['-', '/'])?;
    if year.len() != 4 || !(1..=2).contains(&month.len()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

fn parse_named(value: &str) -> Option<NaiveDate> {
    if !value.chars().any(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }
    let plausible = |date: &NaiveDate| chrono::Datelike::year(date) >= MIN_YEAR;
    NAMED_DAY_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .find(plausible)
        .or_else(|| {
            let with_day = format!("{value} 1");
            NAMED_MONTH_FORMATS
                .iter()
                .filter_map(|format| NaiveDate::parse_from_str(&with_day, &format!("{format} %d")).ok())
                .find(plausible)
        })
}
