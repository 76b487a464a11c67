//! Baseline booking curves
//!
//! A baseline curve maps each lead time to the on-hand rooms a stay date is
//! expected to carry at that lead time, learned from historical stay dates
//! of the same weekday. Three builders are provided:
//!
//! - [`moving_average_3months`]: plain mean over a few pre-filtered months
//! - [`moving_average_recent_90days`]: mean over observations made in the
//!   90 days up to the as-of date
//! - [`moving_average_recent_90days_weighted`]: the same window with
//!   recency weights
//!
//! A lead time without enough evidence is `NaN`, never an error.

use crate::calendar::days_between;
use crate::config::RecencyWeights;
use crate::error::{ForecastError, Result};
use crate::matrix::{normalize_lt_columns, LtMatrix, ACTUAL_LT};
use chrono::{Duration, NaiveDate, Weekday};
use curve_math::{count_valid, nan_mean, weighted_mean};
use std::collections::BTreeMap;

/// Length of the trailing observation window, in days.
pub const RECENT_WINDOW_DAYS: i64 = 90;

/// Expected on-hand rooms for every lead time in `lt_min..=lt_max`.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineCurve {
    lt_min: i32,
    values: Vec<f64>,
}

impl BaselineCurve {
    /// Create a curve starting at `lt_min`.
    pub fn new(lt_min: i32, values: Vec<f64>) -> Self {
        Self { lt_min, values }
    }

    /// A curve without any signal.
    pub fn all_nan(lt_min: i32, lt_max: i32) -> Self {
        let len = (lt_max - lt_min + 1).max(0) as usize;
        Self::new(lt_min, vec![f64::NAN; len])
    }

    pub fn lt_min(&self) -> i32 {
        self.lt_min
    }

    pub fn lt_max(&self) -> i32 {
        self.lt_min + self.values.len() as i32 - 1
    }

    /// Raw value at `lt`; `NaN` outside the range or without signal.
    pub fn value(&self, lt: i32) -> f64 {
        if lt < self.lt_min {
            return f64::NAN;
        }
        self.values
            .get((lt - self.lt_min) as usize)
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Value at `lt` when it carries signal.
    pub fn get(&self, lt: i32) -> Option<f64> {
        let value = self.value(lt);
        (!value.is_nan()).then_some(value)
    }

    /// Expected final (LT = -1) rooms.
    pub fn final_value(&self) -> Option<f64> {
        self.get(ACTUAL_LT)
    }

    /// `(lt, value)` pairs in ascending lead time order.
    pub fn points(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.lt_min + i as i32, *v))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_all_nan(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }
}

/// Average curve over several months of same-weekday history.
///
/// Each matrix is normalized to `lt_min..=lt_max`, rows are stacked and the
/// per-lead-time mean ignores missing cells.
pub fn moving_average_3months(
    matrices: &[LtMatrix],
    lt_min: i32,
    lt_max: i32,
) -> Result<BaselineCurve> {
    if matrices.iter().all(LtMatrix::is_empty) {
        return Err(ForecastError::InvalidParameter(
            "moving_average_3months needs at least one non-empty matrix".to_string(),
        ));
    }

    let normalized = matrices
        .iter()
        .map(|matrix| normalize_lt_columns(matrix, lt_min, lt_max))
        .collect::<Result<Vec<_>>>()?;
    let combined = LtMatrix::concat(normalized.iter());

    let values = (lt_min..=lt_max)
        .map(|lt| {
            nan_mean(
                combined
                    .iter_rows()
                    .map(|row| row.get(lt).unwrap_or(f64::NAN)),
            )
        })
        .collect();
    Ok(BaselineCurve::new(lt_min, values))
}

/// Stay dates inside the trailing window for `lt`: those observed at lead
/// time `lt` no earlier than 90 days before `as_of` and no later than `as_of`.
fn window_values(
    matrix: &LtMatrix,
    as_of: NaiveDate,
    lt: i32,
) -> Vec<(NaiveDate, f64)> {
    let start = as_of - Duration::days(RECENT_WINDOW_DAYS - i64::from(lt));
    let end = as_of + Duration::days(i64::from(lt));
    matrix
        .iter_rows()
        .filter(|row| row.stay_date() >= start && row.stay_date() <= end)
        .map(|row| (row.stay_date(), row.get(lt).unwrap_or(f64::NAN)))
        .collect()
}

/// Mean curve over observations made in the 90 days up to `as_of`.
///
/// A lead time with fewer than `min_count` observed cells is `NaN` so that
/// thin samples never produce a high-variance average. Lead times the
/// input lacks are `NaN` as well.
pub fn moving_average_recent_90days(
    matrix: &LtMatrix,
    as_of: NaiveDate,
    lt_min: i32,
    lt_max: i32,
    min_count: usize,
) -> Result<BaselineCurve> {
    if lt_min > lt_max {
        return Err(ForecastError::InvalidParameter(
            "lt_min must be less than or equal to lt_max".to_string(),
        ));
    }

    let values = (lt_min..=lt_max)
        .map(|lt| {
            if !matrix.has_lead_time(lt) {
                return f64::NAN;
            }
            let window: Vec<f64> = window_values(matrix, as_of, lt)
                .into_iter()
                .map(|(_, v)| v)
                .collect();
            if count_valid(window.iter().copied()) < min_count {
                f64::NAN
            } else {
                nan_mean(window)
            }
        })
        .collect();
    Ok(BaselineCurve::new(lt_min, values))
}

/// Recency-weighted variant of [`moving_average_recent_90days`].
///
/// Each stay date is weighted by its distance in days from `as_of`
/// (see [`RecencyWeights`]).
pub fn moving_average_recent_90days_weighted(
    matrix: &LtMatrix,
    as_of: NaiveDate,
    lt_min: i32,
    lt_max: i32,
    weights: RecencyWeights,
    min_count: usize,
) -> Result<BaselineCurve> {
    if lt_min > lt_max {
        return Err(ForecastError::InvalidParameter(
            "lt_min must be less than or equal to lt_max".to_string(),
        ));
    }

    let values = (lt_min..=lt_max)
        .map(|lt| {
            if !matrix.has_lead_time(lt) {
                return f64::NAN;
            }
            let window = window_values(matrix, as_of, lt);
            if count_valid(window.iter().map(|(_, v)| *v)) < min_count {
                return f64::NAN;
            }
            weighted_mean(
                window
                    .into_iter()
                    .map(|(date, v)| (v, weights.weight(days_between(as_of, date)))),
            )
        })
        .collect();
    Ok(BaselineCurve::new(lt_min, values))
}

/// Rescale `curve` so that its final (LT = -1) value equals `final_forecast`.
///
/// Returns `None` when the curve has no usable final value.
pub fn build_curve_from_final(
    curve: &BaselineCurve,
    final_forecast: f64,
    epsilon: f64,
) -> Option<BaselineCurve> {
    let base_final = curve.final_value()?;
    if base_final.abs() <= epsilon {
        return None;
    }
    let values = curve
        .values()
        .iter()
        .map(|v| v / base_final * final_forecast)
        .collect();
    Some(BaselineCurve::new(curve.lt_min(), values))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CacheKey {
    history: u64,
    weekday: u32,
    as_of: NaiveDate,
    lt_min: i32,
    lt_max: i32,
    min_count: usize,
}

/// Memo of recent-90-day curves for one run.
///
/// Entries are keyed by the history's fingerprint as well as the weekday,
/// as-of date, lead time range and `min_count`, so one cache can be shared
/// across runs over different histories.
#[derive(Debug, Default)]
pub struct BaselineCache {
    curves: BTreeMap<CacheKey, BaselineCurve>,
    hits: usize,
    misses: usize,
}

impl BaselineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent-90-day curve for `weekday`, computed on first use.
    pub fn recent90(
        &mut self,
        weekday: Weekday,
        history: &LtMatrix,
        as_of: NaiveDate,
        lt_min: i32,
        lt_max: i32,
        min_count: usize,
    ) -> Result<BaselineCurve> {
        let key = CacheKey {
            history: history.fingerprint(),
            weekday: weekday.num_days_from_monday(),
            as_of,
            lt_min,
            lt_max,
            min_count,
        };
        if let Some(curve) = self.curves.get(&key) {
            self.hits += 1;
            return Ok(curve.clone());
        }

        self.misses += 1;
        let curve = moving_average_recent_90days(history, as_of, lt_min, lt_max, min_count)?;
        self.curves.insert(key, curve.clone());
        Ok(curve)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.curves.clear();
    }
}
