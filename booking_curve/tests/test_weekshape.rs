mod common;

use approx::assert_relative_eq;
use booking_curve::calendar::WEEKDAYS;
use booking_curve::config::{ForecastSettings, WeekshapeSettings};
use booking_curve::weekshape::{GateReason, LearningSkipReason};
use booking_curve::{
    compute_weekshape_flow_factors, forecast_final_from_pace14_weekshape_flow,
    train_weekshape_base_small_quantiles, week_id, BaselineCache, BaselineCurve, ForecastError,
    ForecastScope, LtMatrix, WeekBoundary, WeekId, WeekdayMap, WeekshapeFactor, WeekshapeFactors,
};
use chrono::{Datelike, Duration, NaiveDate};
use common::{date, lead_times, linear_curve, linear_history, linear_values};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn as_of() -> NaiveDate {
    date(2025, 6, 1)
}

fn curves(slope: f64) -> WeekdayMap<BaselineCurve> {
    let mut map = WeekdayMap::new();
    for weekday in WEEKDAYS {
        map.insert(weekday, linear_curve(-1, 60, 100.0, slope));
    }
    map
}

/// One stay date 20 days out booking 3 rooms a day, one 30 days out with
/// only three observed cells.
fn target() -> LtMatrix {
    let lts = lead_times(-1, 60);
    let busy = linear_values(&lts, 100.0, 3.0);
    let sparse = lts
        .iter()
        .map(|lt| match lt {
            30 => Some(45.0),
            31 => Some(43.0),
            32 => Some(40.0),
            _ => None,
        })
        .collect();
    LtMatrix::new(
        lts,
        vec![
            (as_of() + Duration::days(20), busy),
            (as_of() + Duration::days(30), sparse),
        ],
    )
    .unwrap()
}

fn flow_factors(curves: &WeekdayMap<BaselineCurve>, capacity: f64) -> WeekshapeFactors {
    let settings = WeekshapeSettings::default();
    compute_weekshape_flow_factors(
        &target(),
        as_of(),
        curves,
        capacity,
        settings.lt_min,
        settings.lt_max,
        settings.w,
        settings.boundary,
        &settings,
    )
    .unwrap()
}

#[rstest]
#[case(date(2025, 1, 1), WeekBoundary::Iso, 2025, 1)]
#[case(date(2024, 12, 30), WeekBoundary::Iso, 2025, 1)]
#[case(date(2025, 1, 5), WeekBoundary::Sun, 2025, 1)]
#[case(date(2025, 1, 4), WeekBoundary::Sun, 2024, 52)]
#[case(date(2025, 1, 12), WeekBoundary::Sun, 2025, 2)]
fn test_week_id(
    #[case] day: NaiveDate,
    #[case] boundary: WeekBoundary,
    #[case] year: i32,
    #[case] week: u32,
) {
    assert_eq!(week_id(day, boundary), WeekId { year, week });
}

#[test]
fn test_week_id_display() {
    assert_eq!(week_id(date(2025, 1, 1), WeekBoundary::Iso).to_string(), "2025-W01");
}

#[test]
fn test_flow_factor_ratio_of_pickups() {
    let factors = flow_factors(&curves(2.0), 100.0);
    assert_eq!(factors.len(), 2);

    let busy = as_of() + Duration::days(20);
    let entry = factors
        .get(week_id(busy, WeekBoundary::Iso), busy.weekday())
        .unwrap();
    assert_eq!(entry.n_events, 7);
    assert_eq!(entry.n_stay_dates, 1);
    assert_relative_eq!(entry.sum_actual, 21.0, epsilon = 1e-9);
    assert_relative_eq!(entry.sum_base, 14.0, epsilon = 1e-9);
    assert_eq!(entry.factor, WeekshapeFactor::Computed { factor: 1.5 });
    assert_eq!(entry.residual_rate, None);
    assert_relative_eq!(factors.factor_for(busy), 1.5);
    assert_eq!(entry.stay_dates().collect::<Vec<_>>(), vec![busy]);
}

#[test]
fn test_flow_factor_gates_thin_groups() {
    let factors = flow_factors(&curves(2.0), 100.0);
    let sparse = as_of() + Duration::days(30);
    let entry = factors
        .get(week_id(sparse, WeekBoundary::Iso), sparse.weekday())
        .unwrap();

    // only (30, 31) and (31, 32) have both cells
    assert_eq!(entry.n_events, 2);
    assert_eq!(
        entry.factor,
        WeekshapeFactor::Gated {
            reason: GateReason::TooFewEvents {
                n_events: 2,
                min_events: 3
            }
        }
    );
    assert_relative_eq!(entry.residual_rate.unwrap(), 0.05, epsilon = 1e-12);
    assert_relative_eq!(factors.factor_for(sparse), 1.0);
    assert_eq!(factors.gated_residual_rates().len(), 1);
}

#[test]
fn test_flow_factor_without_capacity_has_no_residual() {
    let factors = flow_factors(&curves(2.0), f64::NAN);
    assert!(factors.gated_residual_rates().is_empty());
    assert!(factors.entries().all(|entry| entry.residual_rate.is_none()));
}

#[test]
fn test_flat_baseline_is_gated() {
    let factors = flow_factors(&curves(0.0), 100.0);
    let busy = as_of() + Duration::days(20);
    let entry = factors
        .get(week_id(busy, WeekBoundary::Iso), busy.weekday())
        .unwrap();
    assert!(matches!(
        entry.factor,
        WeekshapeFactor::Gated {
            reason: GateReason::BaseTooSmall { .. }
        }
    ));
    assert_relative_eq!(factors.factor_for(busy), 1.0);
}

#[rstest]
#[case(0.0)]
#[case(1e-9)]
fn test_near_zero_baseline_is_gated_without_minimum(#[case] slope: f64) {
    let settings = WeekshapeSettings {
        min_sum_base: 0.0,
        ..WeekshapeSettings::default()
    };
    let factors = compute_weekshape_flow_factors(
        &target(),
        as_of(),
        &curves(slope),
        100.0,
        settings.lt_min,
        settings.lt_max,
        settings.w,
        settings.boundary,
        &settings,
    )
    .unwrap();

    let busy = as_of() + Duration::days(20);
    let entry = factors
        .get(week_id(busy, WeekBoundary::Iso), busy.weekday())
        .unwrap();
    assert!(matches!(
        entry.factor,
        WeekshapeFactor::Gated {
            reason: GateReason::BaseTooSmall { .. }
        }
    ));
    assert_relative_eq!(factors.factor_for(busy), 1.0);
}

#[test]
fn test_unknown_group_is_neutral() {
    let factors = flow_factors(&curves(2.0), 100.0);
    assert_relative_eq!(factors.factor_for(as_of() + Duration::days(60)), 1.0);
}

#[test]
fn test_flow_factors_reject_bad_window() {
    let settings = WeekshapeSettings::default();
    for (lt_min, lt_max, w) in [(15, 45, 0), (45, 15, 7)] {
        let result = compute_weekshape_flow_factors(
            &target(),
            as_of(),
            &curves(2.0),
            100.0,
            lt_min,
            lt_max,
            w,
            WeekBoundary::Iso,
            &settings,
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }
}

#[test]
fn test_flow_factors_to_dataframe() {
    let df = flow_factors(&curves(2.0), 100.0).to_dataframe().unwrap();
    assert_eq!(df.height(), 2);
    assert_eq!(
        df.get_column_names(),
        vec![
            "week_id",
            "weekday",
            "n_events",
            "n_stay_dates",
            "sum_actual",
            "sum_base",
            "factor",
            "gated",
            "residual_rate"
        ]
    );
}

#[test]
fn test_weekshape_forecast_applies_clipped_factor() {
    let curves = curves(2.0);
    let factors = flow_factors(&curves, 100.0);
    let scope = ForecastScope::new(as_of(), 200.0).unwrap();
    let frame = forecast_final_from_pace14_weekshape_flow(
        &target(),
        &curves,
        &WeekdayMap::new(),
        &scope,
        &factors,
        &ForecastSettings::default(),
    )
    .unwrap();

    // 37 on hand, 42 to come, factor 1.5 clipped to 1.15
    let busy = frame.get(as_of() + Duration::days(20)).unwrap();
    assert_relative_eq!(busy.forecast, 85.3, epsilon = 1e-9);
    let adjustment = busy.weekshape.unwrap();
    assert_relative_eq!(adjustment.weekshape_factor, 1.5);
    assert!(!adjustment.gated);

    // gated group: 45 on hand plus the full 62 baseline pickup
    let sparse = frame.get(as_of() + Duration::days(30)).unwrap();
    assert_relative_eq!(sparse.forecast, 107.0, epsilon = 1e-9);
    assert!(sparse.weekshape.unwrap().gated);
}

#[test]
fn test_learning_skips_without_capacity() {
    let history = linear_history(date(2025, 1, 1), date(2025, 9, 30), -1, 60, 200.0, 2.0);
    let mut cache = BaselineCache::new();
    for capacity in [None, Some(0.0), Some(f64::NAN)] {
        let learning = train_weekshape_base_small_quantiles(
            &history,
            date(2025, 6, 30),
            capacity,
            1,
            7,
            &ForecastSettings::default(),
            &mut cache,
        )
        .unwrap();
        assert_eq!(
            learning.quantiles,
            Err(LearningSkipReason::CapacityMissingOrInvalid)
        );
        assert_eq!(learning.n_samples, 0);
        assert!(learning.cap_ratio_candidates().is_empty());
    }
}

#[test]
fn test_learning_rejects_zero_window() {
    let history = LtMatrix::empty(lead_times(-1, 60)).unwrap();
    let mut cache = BaselineCache::new();
    for (window, stride) in [(0, 7), (1, 0)] {
        let result = train_weekshape_base_small_quantiles(
            &history,
            date(2025, 6, 30),
            Some(100.0),
            window,
            stride,
            &ForecastSettings::default(),
            &mut cache,
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }
}

#[test]
fn test_learning_without_gated_groups() {
    let history = linear_history(date(2025, 1, 1), date(2025, 9, 30), -1, 60, 200.0, 2.0);
    let mut cache = BaselineCache::new();
    let learning = train_weekshape_base_small_quantiles(
        &history,
        date(2025, 6, 30),
        Some(100.0),
        1,
        7,
        &ForecastSettings::default(),
        &mut cache,
    )
    .unwrap();
    assert_eq!(learning.quantiles, Err(LearningSkipReason::NoGatedSamples));
    assert_eq!(LearningSkipReason::NoGatedSamples.as_str(), "no_gated_samples");
}

#[test]
fn test_learning_quantiles_of_gated_groups() {
    let history = linear_history(date(2025, 1, 1), date(2025, 9, 30), -1, 60, 200.0, 2.0);
    let mut settings = ForecastSettings::default();
    // every group has 7 events, so all of them are gated
    settings.weekshape.min_events = 100;
    let mut cache = BaselineCache::new();

    let learning = train_weekshape_base_small_quantiles(
        &history,
        date(2025, 6, 30),
        Some(100.0),
        1,
        7,
        &settings,
        &mut cache,
    )
    .unwrap();

    // samples on 06-30, 06-23, 06-16, 06-09, 06-02; 31 stay dates each
    assert_eq!(learning.n_samples, 155);
    // stay dates 06-17 ..= 08-14
    assert_eq!(learning.n_unique_stay_dates, 59);
    assert_eq!(learning.trained_until, date(2025, 6, 30));

    let quantiles = learning.quantiles.unwrap();
    assert_relative_eq!(quantiles.p90, 0.14, epsilon = 1e-12);
    assert_relative_eq!(quantiles.p95, 0.14, epsilon = 1e-12);
    assert_relative_eq!(quantiles.p975, 0.14, epsilon = 1e-12);
    assert_eq!(learning.cap_ratio_candidates().len(), 3);
}
