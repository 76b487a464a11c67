//! Averages that skip missing observations
//!
//! Contains:
//! - NaN-skipping arithmetic mean
//! - NaN-skipping weighted mean
//! - valid-sample counting

/// Count the values that are not `NaN`.
pub fn count_valid<I>(values: I) -> usize
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().filter(|v| !v.is_nan()).count()
}

/// Arithmetic mean ignoring `NaN` values.
///
/// Returns `NaN` when no valid value is present.
pub fn nan_mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values.into_iter().filter(|v| !v.is_nan()) {
        sum += value;
        count += 1;
    }

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Weighted mean over `(value, weight)` pairs.
///
/// Pairs with a `NaN` value or a zero weight are skipped. Returns `NaN` when
/// the total weight is zero.
pub fn weighted_mean<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (value, weight) in pairs {
        if weight == 0.0 || value.is_nan() || weight.is_nan() {
            continue;
        }
        weighted_sum += value * weight;
        weight_sum += weight;
    }

    if weight_sum == 0.0 {
        f64::NAN
    } else {
        weighted_sum / weight_sum
    }
}
