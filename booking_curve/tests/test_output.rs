mod common;

use approx::assert_relative_eq;
use booking_curve::{
    evaluate_forecast, forecast_final_from_curve, ForecastError, ForecastFrame, ForecastScope,
    ForecastTable, LtMatrix,
};
use chrono::NaiveDate;
use common::{date, linear_curve};
use pretty_assertions::assert_eq;

fn as_of() -> NaiveDate {
    date(2025, 6, 3)
}

/// Two past days, two forecastable days and one day with no observation.
fn target() -> LtMatrix {
    LtMatrix::new(
        vec![-1, 0, 1, 2],
        vec![
            (date(2025, 6, 1), vec![Some(50.0), None, None, None]),
            (date(2025, 6, 2), vec![Some(55.0), None, None, None]),
            (date(2025, 6, 3), vec![None, Some(40.4), None, None]),
            (date(2025, 6, 4), vec![None, None, Some(30.5), None]),
            (date(2025, 6, 5), vec![None, None, None, None]),
        ],
    )
    .unwrap()
}

fn frame_for(target: &LtMatrix) -> ForecastFrame {
    // 60 final rooms, 10 picked up per day
    let curve = linear_curve(-1, 2, 60.0, 10.0);
    let scope = ForecastScope::with_lead_times(as_of(), 100.0, 0, 2).unwrap();
    forecast_final_from_curve(target, &curve, &scope).unwrap()
}

#[test]
fn test_prepare_projects_actuals_then_rounded_forecasts() {
    let target = target();
    let table = ForecastTable::prepare(&target, &frame_for(&target), as_of());

    assert_eq!(table.len(), 5);
    assert_eq!(table.as_of(), as_of());

    let past = table.get(date(2025, 6, 2)).unwrap();
    assert_eq!(past.actual_rooms, Some(55.0));
    assert_eq!(past.projected_rooms, Some(55.0));

    let today = table.get(date(2025, 6, 3)).unwrap();
    assert_relative_eq!(today.forecast_rooms.unwrap(), 50.4, epsilon = 1e-9);
    assert_eq!(today.forecast_rooms_int, Some(50));
    assert_eq!(today.projected_rooms, Some(50.0));

    // 50.5 rounds to the even neighbour
    let tomorrow = table.get(date(2025, 6, 4)).unwrap();
    assert_eq!(tomorrow.forecast_rooms_int, Some(50));

    let unobserved = table.get(date(2025, 6, 5)).unwrap();
    assert_eq!(unobserved.forecast_rooms, None);
    assert_eq!(unobserved.projected_rooms, None);

    assert_relative_eq!(table.projected_total(), 205.0);
    assert_relative_eq!(table.actual_total(), 105.0);
    assert!(table.projected_values()[4].is_nan());
}

#[test]
fn test_prepare_orders_and_dedups_dates() {
    let target = LtMatrix::new(
        vec![-1],
        vec![
            (date(2025, 6, 2), vec![Some(2.0)]),
            (date(2025, 6, 1), vec![Some(1.0)]),
        ],
    )
    .unwrap();
    let table = ForecastTable::prepare(&target, &ForecastFrame::default(), as_of());
    assert_eq!(table.stay_dates(), vec![date(2025, 6, 1), date(2025, 6, 2)]);
}

#[test]
fn test_set_projected_values() {
    let target = target();
    let mut table = ForecastTable::prepare(&target, &frame_for(&target), as_of());
    table.set_projected_values(&[50.0, 55.0, 49.0, 52.0, f64::NAN]);

    assert_eq!(table.get(date(2025, 6, 3)).unwrap().projected_rooms, Some(49.0));
    assert_eq!(table.get(date(2025, 6, 5)).unwrap().projected_rooms, None);
    // the rounded forecast itself is untouched
    assert_eq!(table.get(date(2025, 6, 4)).unwrap().forecast_rooms_int, Some(50));
    assert_relative_eq!(table.projected_total(), 206.0);
}

#[test]
fn test_table_to_dataframe() {
    let target = target();
    let table = ForecastTable::prepare(&target, &frame_for(&target), as_of());
    let df = table.to_dataframe().unwrap();

    assert_eq!(df.height(), 5);
    assert_eq!(
        df.get_column_names(),
        vec![
            "stay_date",
            "actual_rooms",
            "forecast_rooms",
            "forecast_rooms_int",
            "projected_rooms",
            "adjusted_projected_rooms"
        ]
    );
    assert_eq!(df.column("adjusted_projected_rooms").unwrap().null_count(), 5);
}

#[test]
fn test_evaluate_forecast_backtest() {
    // the future days already carry their realized rooms
    let target = LtMatrix::new(
        vec![-1, 0, 1],
        vec![
            (date(2025, 6, 1), vec![Some(50.0), None, None]),
            (date(2025, 6, 3), vec![Some(48.0), Some(40.4), None]),
            (date(2025, 6, 4), vec![Some(60.0), None, Some(30.5)]),
        ],
    )
    .unwrap();
    let table = ForecastTable::prepare(&target, &frame_for(&target), as_of());
    let metrics = evaluate_forecast(&table).unwrap();

    let errors = [0.0, 2.4, -9.5];
    let mean = errors.iter().sum::<f64>() / 3.0;
    let variance = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / 2.0;

    assert_eq!(metrics.n_days, 3);
    assert_relative_eq!(metrics.mae, 11.9 / 3.0, epsilon = 1e-9);
    assert_relative_eq!(metrics.rmse, ((5.76 + 90.25) / 3.0f64).sqrt(), epsilon = 1e-9);
    assert_relative_eq!(metrics.bias, mean, epsilon = 1e-9);
    assert_relative_eq!(metrics.error_std, variance.sqrt(), epsilon = 1e-9);
    assert_relative_eq!(metrics.mape, (5.0 + 9.5 / 60.0 * 100.0) / 3.0, epsilon = 1e-9);
    assert_relative_eq!(metrics.actual_total, 158.0);
    assert_relative_eq!(metrics.projected_total, 150.0);
    assert_relative_eq!(metrics.total_error, -8.0);
    assert_relative_eq!(metrics.total_error_pct, -800.0 / 158.0, epsilon = 1e-9);
}

#[test]
fn test_evaluate_forecast_without_actuals() {
    let target = LtMatrix::new(
        vec![-1, 0],
        vec![(date(2025, 6, 3), vec![None, Some(40.0)])],
    )
    .unwrap();
    let table = ForecastTable::prepare(&target, &frame_for(&target), as_of());
    assert!(matches!(
        evaluate_forecast(&table),
        Err(ForecastError::InsufficientData(_))
    ));
}

#[test]
fn test_evaluate_forecast_zero_actuals() {
    let target = LtMatrix::new(vec![-1], vec![(date(2025, 6, 1), vec![Some(0.0)])]).unwrap();
    let table = ForecastTable::prepare(&target, &frame_for(&target), as_of());
    let metrics = evaluate_forecast(&table).unwrap();

    assert_eq!(metrics.n_days, 1);
    assert_eq!(metrics.error_std, 0.0);
    assert!(metrics.mape.is_nan());
    assert!(metrics.total_error_pct.is_nan());
}
