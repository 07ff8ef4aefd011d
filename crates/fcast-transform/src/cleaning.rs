//! Duplicate merging and gap filling over canonical records.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDate;

use crate::frame::Record;

type RecordKey = (Option<String>, Option<String>, NaiveDate);

#[derive(Default)]
struct Accumulator {
    target: Option<f64>,
    exo_sum: Vec<f64>,
    exo_count: Vec<usize>,
}

/// Merge rows sharing `(item, location, date)`: targets are summed and
/// exogenous values averaged. The result is sorted by item, location, date.
///
/// Returns the merged records and how many input rows were folded away.
pub(crate) fn merge_duplicates(records: Vec<Record>, exogenous: usize) -> (Vec<Record>, usize) {
    let before = records.len();
    let mut merged: BTreeMap<RecordKey, Accumulator> = BTreeMap::new();
    for record in records {
        let acc = merged
            .entry((record.item, record.location, record.date))
            .or_insert_with(|| Accumulator {
                target: None,
                exo_sum: vec![0.0; exogenous],
                exo_count: vec![0; exogenous],
            });
        if let Some(value) = record.target {
            acc.target = Some(acc.target.unwrap_or(0.0) + value);
        }
        for (idx, value) in record.exogenous.into_iter().enumerate().take(exogenous) {
            if let Some(value) = value {
                acc.exo_sum[idx] += value;
                acc.exo_count[idx] += 1;
            }
        }
    }
    let out: Vec<Record> = merged
        .into_iter()
        .map(|((item, location, date), acc)| Record {
            date,
            item,
            location,
            target: acc.target,
            exogenous: acc
                .exo_sum
                .iter()
                .zip(&acc.exo_count)
                .map(|(sum, count)| (*count > 0).then(|| sum / *count as f64))
                .collect(),
        })
        .collect();
    let folded = before - out.len();
    (out, folded)
}

/// Contiguous ranges of records sharing item and location.
fn group_ranges(records: &[Record]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for idx in 1..=records.len() {
        let boundary = idx == records.len()
            || records[idx].item != records[start].item
            || records[idx].location != records[start].location;
        if boundary {
            if start < idx {
                ranges.push(start..idx);
            }
            start = idx;
        }
    }
    ranges
}

/// Forward-fill then back-fill; returns how many cells were filled.
fn fill_forward_backward(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(current) => last = Some(*current),
            None => {
                if let Some(previous) = last {
                    *value = Some(previous);
                    filled += 1;
                }
            }
        }
    }
    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(current) => next = Some(*current),
            None => {
                if let Some(following) = next {
                    *value = Some(following);
                    filled += 1;
                }
            }
        }
    }
    filled
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Fill missing targets and exogenous values in place.
///
/// Records must be sorted by item, location and date. Gaps are filled from
/// neighbours inside the same group; a group without any observed target
/// takes the mean of the same item at other locations, else the global mean.
/// Returns the number of target cells filled.
pub(crate) fn impute_missing(records: &mut [Record], exogenous: usize) -> usize {
    let ranges = group_ranges(records);
    let observed_global = mean(records.iter().filter_map(|r| r.target));
    let mut item_observed: BTreeMap<Option<String>, Vec<f64>> = BTreeMap::new();
    for record in records.iter() {
        if let Some(value) = record.target {
            item_observed
                .entry(record.item.clone())
                .or_default()
                .push(value);
        }
    }
    let exo_means: Vec<Option<f64>> = (0..exogenous)
        .map(|idx| mean(records.iter().filter_map(|r| r.exogenous.get(idx).copied().flatten())))
        .collect();

    let mut imputed = 0;
    for range in ranges {
        let group = &mut records[range];
        let mut targets: Vec<Option<f64>> = group.iter().map(|r| r.target).collect();
        if targets.iter().all(Option::is_none) {
            // Observed values of this item live in other location groups only.
            let fallback = group[0]
                .item
                .as_ref()
                .and_then(|_| item_observed.get(&group[0].item))
                .and_then(|values| mean(values.iter().copied()))
                .or(observed_global);
            if let Some(fill) = fallback {
                for value in &mut targets {
                    *value = Some(fill);
                }
                imputed += targets.len();
            }
        } else {
            imputed += fill_forward_backward(&mut targets);
        }
        for (record, value) in group.iter_mut().zip(targets) {
            record.target = value;
        }

        for (idx, column_mean) in exo_means.iter().enumerate() {
            let mut values: Vec<Option<f64>> = group
                .iter()
                .map(|r| r.exogenous.get(idx).copied().flatten())
                .collect();
            fill_forward_backward(&mut values);
            for (record, value) in group.iter_mut().zip(values) {
                if let Some(slot) = record.exogenous.get_mut(idx) {
                    *slot = value.or(*column_mean);
                }
            }
        }
    }
    imputed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(item: &str, loc: &str, day: u32, target: Option<f64>) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            item: Some(item.to_string()),
            location: Some(loc.to_string()),
            target,
            exogenous: Vec::new(),
        }
    }

    #[test]
    fn duplicates_sum_targets() {
        let records = vec![
            rec("A", "x", 1, Some(2.0)),
            rec("A", "x", 1, Some(3.0)),
            rec("A", "x", 2, None),
        ];
        let (merged, folded) = merge_duplicates(records, 0);
        assert_eq!(folded, 1);
        assert_eq!(merged[0].target, Some(5.0));
        assert_eq!(merged[1].target, None);
    }

    #[test]
    fn fill_never_crosses_observations() {
        let mut values = vec![None, Some(1.0), None, None, Some(4.0), None];
        assert_eq!(fill_forward_backward(&mut values), 4);
        assert_eq!(
            values,
            vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn empty_group_uses_item_mean_then_global_mean() {
        let mut records = vec![
            rec("A", "x", 1, Some(2.0)),
            rec("A", "x", 2, Some(4.0)),
            rec("A", "y", 1, None),
            rec("B", "x", 1, Some(10.0)),
            rec("C", "x", 1, None),
        ];
        let imputed = impute_missing(&mut records, 0);
        assert_eq!(imputed, 2);
        assert_eq!(records[2].target, Some(3.0));
        assert_eq!(records[4].target, Some(16.0 / 3.0));
    }
}
