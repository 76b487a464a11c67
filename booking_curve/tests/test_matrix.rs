mod common;

use booking_curve::calendar::TargetMonth;
use booking_curve::matrix::parse_date;
use booking_curve::{normalize_lt_columns, ForecastError, LtMatrix, ACTUAL_LT};
use chrono::Weekday;
use common::date;
use polars::prelude::*;
use pretty_assertions::assert_eq;

fn sample_matrix() -> LtMatrix {
    LtMatrix::new(
        vec![3, -1, 1],
        vec![
            (date(2025, 6, 2), vec![Some(7.0), Some(12.0), None]),
            (date(2025, 6, 1), vec![Some(5.0), Some(10.0), Some(8.0)]),
        ],
    )
    .unwrap()
}

#[test]
fn test_new_rejects_duplicate_lead_times() {
    let result = LtMatrix::new(vec![0, 0], vec![]);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_new_rejects_misaligned_rows() {
    let result = LtMatrix::new(vec![0, 1], vec![(date(2025, 6, 1), vec![Some(1.0)])]);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_nan_cells_are_missing() {
    let matrix = LtMatrix::new(vec![0], vec![(date(2025, 6, 1), vec![Some(f64::NAN)])]).unwrap();
    assert_eq!(matrix.value(date(2025, 6, 1), 0), None);
}

#[test]
fn test_from_labels_rejects_non_integer() {
    let result = LtMatrix::from_labels(&["-1", "abc"], vec![]);
    match result {
        Err(ForecastError::InvalidLeadTime(label)) => assert_eq!(label, "abc"),
        other => panic!("expected InvalidLeadTime, got {:?}", other),
    }
}

#[test]
fn test_from_labels_casts_labels() {
    let matrix = LtMatrix::from_labels(
        &[" 2", "-1"],
        vec![(date(2025, 6, 1), vec![Some(3.0), Some(9.0)])],
    )
    .unwrap();
    assert_eq!(matrix.lead_times(), &[2, -1]);
    assert_eq!(matrix.actual(date(2025, 6, 1)), Some(9.0));
}

#[test]
fn test_normalize_orders_columns_and_fills_gaps() {
    let matrix = sample_matrix();
    let normalized = normalize_lt_columns(&matrix, -1, 2).unwrap();

    assert_eq!(normalized.lead_times(), &[-1, 0, 1, 2]);
    // row order is preserved
    assert_eq!(
        normalized.stay_dates(),
        vec![date(2025, 6, 2), date(2025, 6, 1)]
    );
    assert_eq!(normalized.value(date(2025, 6, 1), ACTUAL_LT), Some(10.0));
    assert_eq!(normalized.value(date(2025, 6, 1), 0), None);
    assert_eq!(normalized.value(date(2025, 6, 1), 1), Some(8.0));
    // LT 3 is outside the range
    assert!(!normalized.has_lead_time(3));
}

#[test]
fn test_normalize_rejects_inverted_range() {
    let result = normalize_lt_columns(&sample_matrix(), 5, 1);
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_column_and_missing_lead_time() {
    let matrix = sample_matrix();
    let column = matrix.column(1).unwrap();
    assert_eq!(
        column,
        vec![(date(2025, 6, 2), None), (date(2025, 6, 1), Some(8.0))]
    );
    assert!(matrix.column(40).is_none());
    assert_eq!(matrix.value(date(2025, 6, 1), 40), None);
}

#[test]
fn test_weekday_and_month_filters() {
    // 2025-06-01 is a Sunday
    let matrix = LtMatrix::new(
        vec![0],
        vec![
            (date(2025, 5, 31), vec![Some(1.0)]),
            (date(2025, 6, 1), vec![Some(2.0)]),
            (date(2025, 6, 8), vec![Some(3.0)]),
            (date(2025, 7, 1), vec![Some(4.0)]),
        ],
    )
    .unwrap();

    let sundays = matrix.filter_by_weekday(Weekday::Sun);
    assert_eq!(sundays.stay_dates(), vec![date(2025, 6, 1), date(2025, 6, 8)]);

    let june = matrix.restrict_to_month(TargetMonth::new(2025, 6).unwrap());
    assert_eq!(june.len(), 2);

    let split = matrix.split_by_weekday();
    let weekdays: Vec<Weekday> = split.iter().map(|(weekday, _)| *weekday).collect();
    // Monday first, empty weekdays skipped
    assert_eq!(weekdays, vec![Weekday::Tue, Weekday::Sat, Weekday::Sun]);
}

#[test]
fn test_concat_unions_columns() {
    let a = LtMatrix::new(vec![0, 1], vec![(date(2025, 6, 1), vec![Some(1.0), Some(2.0)])]).unwrap();
    let b = LtMatrix::new(vec![-1, 0], vec![(date(2025, 6, 2), vec![Some(5.0), Some(4.0)])]).unwrap();

    let combined = LtMatrix::concat([&a, &b]);
    assert_eq!(combined.lead_times(), &[-1, 0, 1]);
    assert_eq!(combined.value(date(2025, 6, 1), ACTUAL_LT), None);
    assert_eq!(combined.value(date(2025, 6, 2), 1), None);
    assert_eq!(combined.value(date(2025, 6, 2), 0), Some(4.0));
}

#[test]
fn test_dataframe_round_trip() {
    let matrix = sample_matrix();
    let df = matrix.to_dataframe().unwrap();

    assert_eq!(df.width(), 4);
    assert_eq!(df.height(), 2);
    assert_eq!(df.get_column_names(), vec!["stay_date", "3", "-1", "1"]);

    let back = LtMatrix::from_dataframe(&df, "stay_date").unwrap();
    assert_eq!(back, matrix);
}

#[test]
fn test_from_dataframe_with_string_dates() {
    let df = df!(
        "date" => &["2025-06-01", "20250602"],
        "-1" => &[10.0, 12.0],
        "0" => &[Some(8.0), None]
    )
    .unwrap();

    let matrix = LtMatrix::from_dataframe(&df, "date").unwrap();
    assert_eq!(matrix.lead_times(), &[-1, 0]);
    assert_eq!(matrix.actual(date(2025, 6, 2)), Some(12.0));
    assert_eq!(matrix.value(date(2025, 6, 2), 0), None);
}

#[test]
fn test_from_dataframe_errors() {
    let df = df!("-1" => &[1.0]).unwrap();
    assert!(matches!(
        LtMatrix::from_dataframe(&df, "stay_date"),
        Err(ForecastError::MissingColumn(_))
    ));

    let df = df!("stay_date" => &["2025-06-01"], "final" => &[1.0]).unwrap();
    assert!(matches!(
        LtMatrix::from_dataframe(&df, "stay_date"),
        Err(ForecastError::InvalidLeadTime(_))
    ));
}

#[test]
fn test_parse_date_formats() {
    assert_eq!(parse_date("2025-06-01").unwrap(), date(2025, 6, 1));
    assert_eq!(parse_date("20250601").unwrap(), date(2025, 6, 1));
    assert!(parse_date("06/01/2025").is_err());
}
