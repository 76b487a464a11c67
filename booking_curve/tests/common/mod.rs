#![allow(dead_code)]

use booking_curve::{BaselineCurve, LtMatrix};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn lead_times(lt_min: i32, lt_max: i32) -> Vec<i32> {
    (lt_min..=lt_max).collect()
}

/// Values of a straight booking curve: `final_rooms - slope * (lt + 1)`.
pub fn linear_values(lead_times: &[i32], final_rooms: f64, slope: f64) -> Vec<Option<f64>> {
    lead_times
        .iter()
        .map(|lt| Some(final_rooms - slope * f64::from(lt + 1)))
        .collect()
}

/// A baseline curve following the same straight line.
pub fn linear_curve(lt_min: i32, lt_max: i32, final_rooms: f64, slope: f64) -> BaselineCurve {
    let values = (lt_min..=lt_max)
        .map(|lt| final_rooms - slope * f64::from(lt + 1))
        .collect();
    BaselineCurve::new(lt_min, values)
}

/// One row per day in `[start, end]`, each on the same straight curve.
pub fn linear_history(
    start: NaiveDate,
    end: NaiveDate,
    lt_min: i32,
    lt_max: i32,
    final_rooms: f64,
    slope: f64,
) -> LtMatrix {
    let lts = lead_times(lt_min, lt_max);
    let mut rows = Vec::new();
    let mut day = start;
    while day <= end {
        rows.push((day, linear_values(&lts, final_rooms, slope)));
        day += Duration::days(1);
    }
    LtMatrix::new(lts, rows).unwrap()
}

/// Keep only cells already observed on `as_of`: lead time `lt` of a stay
/// date is known from `stay_date - lt`, the actual from the day after.
pub fn as_observed(matrix: &LtMatrix, as_of: NaiveDate) -> LtMatrix {
    let lts = matrix.lead_times().to_vec();
    let rows = matrix
        .iter_rows()
        .map(|row| {
            let values = lts
                .iter()
                .map(|lt| {
                    let known_on = if *lt < 0 {
                        row.stay_date() + Duration::days(1)
                    } else {
                        row.stay_date() - Duration::days(i64::from(*lt))
                    };
                    if known_on <= as_of {
                        row.get(*lt)
                    } else {
                        None
                    }
                })
                .collect();
            (row.stay_date(), values)
        })
        .collect();
    LtMatrix::new(lts, rows).unwrap()
}

/// Noisy but seeded booking history: each stay date draws a final count and
/// books it along a concave curve, weekends selling better.
pub fn seeded_history(seed: u64, start: NaiveDate, end: NaiveDate, capacity: f64) -> LtMatrix {
    use chrono::Datelike;

    let mut rng = StdRng::seed_from_u64(seed);
    let lts = lead_times(-1, 90);
    let mut rows = Vec::new();
    let mut day = start;
    while day <= end {
        let weekend = matches!(day.weekday(), chrono::Weekday::Fri | chrono::Weekday::Sat);
        let base = if weekend { 0.85 } else { 0.65 };
        let final_rooms = (capacity * (base + rng.gen_range(-0.1..0.1))).round();
        let values = lts
            .iter()
            .map(|lt| {
                let remaining = f64::from(lt + 1) / 91.0;
                let share = (1.0 - remaining).powf(1.5);
                Some((final_rooms * share).floor())
            })
            .collect();
        rows.push((day, values));
        day += Duration::days(1);
    }
    LtMatrix::new(lts, rows).unwrap()
}
