use chrono::NaiveDate;
use fcast_common::column_strings;
use fcast_ingest::table_from_rows;
use fcast_map::analyze_columns;
use fcast_model::{TableFormat, TransformReport};
use fcast_transform::{AdapterError, NormalizedFrame, normalize_dataset};

fn normalize(headers: &[&str], rows: &[Vec<&str>]) -> (NormalizedFrame, TransformReport) {
    let raw = table_from_rows(headers, rows).expect("build raw table");
    let schema = analyze_columns(headers);
    normalize_dataset(&raw, &schema).expect("normalize")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn wide_table_unpivots_to_long() {
    let (frame, report) = normalize(
        &["product", "2023-01-01", "2023-01-02", "2023-01-03"],
        &[vec!["A", "1", "2", "3"], vec!["B", "4", "", "6"]],
    );
    assert_eq!(report.format, TableFormat::Wide);
    assert_eq!(frame.height(), 6);
    assert!(frame.has_column("date"));
    assert!(frame.has_column("target"));
    assert_eq!(frame.column_names(), vec!["date", "target", "item"]);
    assert_eq!(frame.targets().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 4.0, 6.0]);
    assert_eq!(report.imputed_values, 1);
}

#[test]
fn wide_table_maps_two_identifiers_to_item_and_location() {
    let (frame, report) = normalize(
        &["store", "product", "2023-01-01", "2023-01-02", "2023-01-03"],
        &[vec!["north", "A", "1", "2", "3"], vec!["south", "B", "4", "5", "6"]],
    );
    assert_eq!(report.format, TableFormat::Wide);
    assert_eq!(frame.height(), 6);
    assert_eq!(frame.column_names(), vec!["date", "target", "item", "location"]);
    assert!(report.dropped_columns.is_empty());
    let items = column_strings(frame.data(), "item").unwrap();
    let locations = column_strings(frame.data(), "location").unwrap();
    let pairs: Vec<(String, String)> = items
        .into_iter()
        .zip(locations)
        .map(|(item, location)| (item.unwrap(), location.unwrap()))
        .collect();
    assert!(pairs.contains(&("A".to_string(), "north".to_string())));
    assert!(pairs.contains(&("B".to_string(), "south".to_string())));
    assert!(!pairs.iter().any(|(item, _)| item == "north"));
}

#[test]
fn wide_table_with_more_identifiers_than_dates() {
    let (frame, report) = normalize(
        &["sku", "store", "category", "brand", "2023-01-01", "2023-01-02", "2023-01-03"],
        &[
            vec!["A", "north", "snacks", "acme", "1", "2", "3"],
            vec!["B", "south", "drinks", "zest", "4", "5", "6"],
        ],
    );
    assert_eq!(report.format, TableFormat::Wide);
    assert_eq!(frame.height(), 6);
    assert_eq!(frame.column_names(), vec!["date", "target", "item", "location"]);
    assert_eq!(report.dropped_columns, vec!["category", "brand"]);
    assert_eq!(
        frame.dates().unwrap().iter().collect::<std::collections::BTreeSet<_>>().len(),
        3
    );
    let mut targets = frame.targets().unwrap();
    targets.sort_by(f64::total_cmp);
    assert_eq!(targets, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn long_table_with_a_date_column_is_not_unpivoted() {
    let (frame, report) = normalize(
        &["date", "sku", "store", "qty", "2023-01-01", "2023-01-02", "2023-01-03"],
        &[
            vec!["2023-02-01", "A", "north", "5", "1", "2", "3"],
            vec!["2023-02-02", "A", "north", "6", "1", "2", "3"],
        ],
    );
    assert_eq!(report.format, TableFormat::Long);
    assert_eq!(frame.height(), 2);
}

#[test]
fn normalizing_twice_is_a_no_op() {
    let headers = ["Order Date", "SKU", "Store", "Units Sold", "Promo", "Notes"];
    let rows = vec![
        vec!["2023-01-01", "A", "north", "3", "1", "x"],
        vec!["2023-01-01", "A", "north", "2", "0", "y"],
        vec!["01/02/2023", "A", "north", "", "0", ""],
        vec!["2023-01-03", "A", "north", "$1,000", "1", "z"],
        vec!["2023-01-01", "B", "south", "7", "", "w"],
    ];
    let (first, report) = normalize(&headers, &rows);
    assert_eq!(report.duplicates_merged, 1);
    assert_eq!(report.exogenous_columns, vec!["promo"]);
    assert_eq!(report.dropped_columns, vec!["Notes"]);

    let columns = first.column_names();
    let schema = analyze_columns(&columns);
    assert_eq!(schema.overall_confidence, 100.0);
    let (second, again) = normalize_dataset(first.data(), &schema).expect("renormalize");

    assert_eq!(second.height(), first.height());
    assert_eq!(second.column_names(), columns);
    assert_eq!(second.targets().unwrap(), first.targets().unwrap());
    assert_eq!(second.dates().unwrap(), first.dates().unwrap());
    assert_eq!(again.duplicates_merged, 0);
    assert_eq!(again.imputed_values, 0);
}

#[test]
fn mixed_date_formats_parse_per_cell() {
    let (frame, report) = normalize(
        &["date", "qty", "sku"],
        &[
            vec!["2023-01-01", "1", "A"],
            vec!["01/02/2023", "2", "A"],
            vec!["Jan 3, 2023", "3", "A"],
            vec!["someday", "4", "A"],
        ],
    );
    assert_eq!(report.unparsed_dates, 1);
    assert_eq!(report.rows_in, 4);
    assert_eq!(report.rows_out, 3);
    assert_eq!(
        frame.dates().unwrap(),
        vec![date(2023, 1, 1), date(2023, 1, 2), date(2023, 1, 3)]
    );
}

#[test]
fn duplicate_keys_are_summed() {
    let (frame, report) = normalize(
        &["date", "qty", "sku"],
        &[
            vec!["2023-01-01", "2", "A"],
            vec!["2023-01-01", "3", "A"],
            vec!["2023-01-02", "1", "A"],
        ],
    );
    assert_eq!(report.duplicates_merged, 1);
    assert_eq!(frame.targets().unwrap(), vec![5.0, 1.0]);
}

#[test]
fn gaps_fill_from_neighbours_within_a_group() {
    let (frame, report) = normalize(
        &["date", "qty", "sku"],
        &[
            vec!["2023-01-01", "", "A"],
            vec!["2023-01-02", "5", "A"],
            vec!["2023-01-03", "", "A"],
            vec!["2023-01-04", "8", "A"],
            vec!["2023-01-01", "", "B"],
        ],
    );
    assert_eq!(report.imputed_values, 3);
    // B has no observations of its own and falls back to the global mean.
    assert_eq!(frame.targets().unwrap(), vec![5.0, 5.0, 5.0, 8.0, 6.5]);
}

#[test]
fn date_column_is_inferred_from_values() {
    let (frame, report) = normalize(
        &["when", "sold", "sku"],
        &[vec!["2023-01-01", "1", "A"], vec!["2023-01-02", "2", "A"]],
    );
    assert_eq!(frame.height(), 2);
    assert!(
        report
            .transformations
            .iter()
            .any(|t| t.contains("Inferred 'when'"))
    );
}

#[test]
fn price_is_kept_as_regressor_and_text_dropped() {
    let (frame, report) = normalize(
        &["date", "qty", "sku", "Unit Price", "Comment"],
        &[
            vec!["2023-01-01", "1", "A", "$2.50", "ok"],
            vec!["2023-01-02", "2", "A", "$2.75", "late"],
        ],
    );
    assert_eq!(frame.exogenous_columns(), vec!["price"]);
    assert_eq!(report.dropped_columns, vec!["Comment"]);
    let titles: Vec<&str> = report.enrichment.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Holiday Calendar", "Macroeconomic Indicators"]);
}

#[test]
fn tables_without_dates_fail_validation() {
    let raw = table_from_rows(&["name", "comment"], &[vec!["a", "b"]]).unwrap();
    let schema = analyze_columns(&["name", "comment"]);
    let err = normalize_dataset(&raw, &schema).unwrap_err();
    assert!(matches!(err, AdapterError::Validation { .. }));
}

#[test]
fn targets_without_numbers_fail_validation() {
    let raw = table_from_rows(&["date", "qty"], &[vec!["2023-01-01", "n/a"]]).unwrap();
    let schema = analyze_columns(&["date", "qty"]);
    let err = normalize_dataset(&raw, &schema).unwrap_err();
    assert!(matches!(err, AdapterError::Validation { .. }));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn row() -> impl Strategy<Value = (u32, bool, Option<u16>)> {
        (1u32..=12, any::<bool>(), proptest::option::of(0u16..500))
    }

    proptest! {
        #[test]
        fn long_tables_normalize_to_unique_sorted_keys(rows in proptest::collection::vec(row(), 1..40)) {
            prop_assume!(rows.iter().any(|(_, _, value)| value.is_some()));
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|(day, first, value)| {
                    vec![
                        format!("2023-03-{day:02}"),
                        if *first { "A".to_string() } else { "B".to_string() },
                        value.map(|v| v.to_string()).unwrap_or_default(),
                    ]
                })
                .collect();
            let raw = table_from_rows(&["date".to_string(), "sku".into(), "qty".into()], &cells).unwrap();
            let schema = analyze_columns(&["date", "sku", "qty"]);
            let (frame, report) = normalize_dataset(&raw, &schema).unwrap();

            prop_assert!(report.rows_out <= report.rows_in);
            prop_assert_eq!(report.rows_in - report.rows_out, report.duplicates_merged);
            let dates = frame.dates().unwrap();
            let items = fcast_common::column_strings(frame.data(), "item").unwrap();
            let keys: Vec<(Option<String>, NaiveDate)> = items.into_iter().zip(dates).collect();
            for pair in keys.windows(2) {
                prop_assert!(pair[0] < pair[1], "keys must be strictly increasing: {:?}", pair);
            }
            prop_assert_eq!(frame.targets().unwrap().len(), frame.height());
        }
    }
}
