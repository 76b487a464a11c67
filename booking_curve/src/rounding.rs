//! Monthly rounding reconciliation
//!
//! Turns fractional daily forecasts into whole rooms whose month total hits
//! a rounded goal. Past days and days outside the target month are fixed;
//! only days from the as-of date to month end are adjusted. Units are
//! distributed by fractional remainder: the largest remainders gain rooms
//! first, the smallest lose rooms first.

use crate::calendar::TargetMonth;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// How the allocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingTermination {
    /// The month total equals the goal
    Exact,
    /// Units remain but no adjustable day can absorb one more
    NoEligibleDay,
    /// Units remain and no day was adjustable
    NoAdjustableDays,
}

/// Result of [`apply_remainder_rounding`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoundingOutcome {
    /// Values in input order: fixed days untouched, adjustable days whole
    pub values: Vec<f64>,
    /// Sum of `values`, missing entries counted as 0
    pub total: f64,
    /// Integer goal the allocation aimed at
    pub goal: i64,
    /// Units still missing (positive) or in excess (negative)
    pub remaining_need: i64,
    pub termination: RoundingTermination,
}

impl RoundingOutcome {
    pub fn is_exact(&self) -> bool {
        self.termination == RoundingTermination::Exact
    }
}

/// Whether the target month has at least `min_future_days` stay dates on or
/// after `as_of`.
pub fn should_apply_monthly_rounding(
    target_month: TargetMonth,
    as_of: NaiveDate,
    stay_dates: &[NaiveDate],
    min_future_days: usize,
) -> bool {
    let future_count = stay_dates
        .iter()
        .filter(|date| target_month.contains(**date) && **date >= as_of)
        .count();
    if future_count < min_future_days {
        debug!(
            future_count,
            min_future_days,
            %target_month,
            %as_of,
            "skipping monthly rounding"
        );
        return false;
    }
    true
}

/// Round `total` to the nearest multiple of `unit` (ties to even).
///
/// A non-positive or `NaN` unit, or a non-finite total, gives 0.
pub fn round_total_goal(total: f64, unit: f64) -> f64 {
    if unit.is_nan() || unit <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    (total / unit).round_ties_even() * unit
}

/// Positions sorted by remainder; ties keep input order.
fn ranked(remainders: &[f64], descending: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..remainders.len()).collect();
    if descending {
        order.sort_by(|a, b| remainders[*b].total_cmp(&remainders[*a]));
    } else {
        order.sort_by(|a, b| remainders[*a].total_cmp(&remainders[*b]));
    }
    order
}

/// Uncapped surplus: every day gets `need / n`, the top `need % n` one more.
fn allocate_uncapped_positive(base: &mut [i64], remainders: &[f64], need: i64) -> i64 {
    let order = ranked(remainders, true);
    let n = order.len() as i64;
    let (q, r) = (need / n, need % n);
    for (rank, idx) in order.iter().enumerate() {
        base[*idx] += q + i64::from((rank as i64) < r);
    }
    0
}

/// Uncapped deficit: proportional removal over days still above zero,
/// smallest remainders first, repeated until settled or nothing is left.
fn allocate_uncapped_negative(base: &mut [i64], remainders: &[f64], mut need: i64) -> i64 {
    let order = ranked(remainders, false);
    while need < 0 {
        let candidates: Vec<usize> = order.iter().copied().filter(|idx| base[*idx] > 0).collect();
        if candidates.is_empty() {
            break;
        }
        let n = candidates.len() as i64;
        let (q, r) = (-need / n, -need % n);

        let mut removed = 0;
        for (rank, idx) in candidates.iter().enumerate() {
            let decrement = q + i64::from((rank as i64) < r);
            let new_value = (base[*idx] - decrement).max(0);
            removed += base[*idx] - new_value;
            base[*idx] = new_value;
        }
        if removed == 0 {
            break;
        }
        need += removed;
    }
    need
}

/// Capped allocation: one unit per day per pass, skipping days at the cap
/// (adding) or at zero (removing). Bounded by the initial `|need|` passes.
fn allocate_capped(base: &mut [i64], remainders: &[f64], mut need: i64, cap: i64) -> i64 {
    let adding = need > 0;
    let order = ranked(remainders, adding);
    let step = if adding { 1 } else { -1 };

    for _ in 0..need.abs() {
        if need == 0 {
            break;
        }
        let mut progressed = false;
        for idx in &order {
            if need == 0 {
                break;
            }
            let eligible = if adding { base[*idx] < cap } else { base[*idx] > 0 };
            if !eligible {
                continue;
            }
            base[*idx] += step;
            need -= step;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }
    need
}

/// Reconcile `values` so the month total matches `round(goal_total)`.
///
/// `values[i]` belongs to `stay_dates[i]`. Adjustable days are those in
/// `target_month` on or after `as_of`; their values are floored (missing
/// counts as 0) and clipped to `[0, cap]`, then units are added or removed
/// by fractional remainder. All other days are returned unchanged and enter
/// the total as-is (missing as 0). A missing or non-finite goal counts as
/// 0. `cap` is floored; a negative or non-finite cap is ignored.
///
/// Falling short of the goal is not an error: the outcome reports the
/// remaining need and why allocation stopped.
pub fn apply_remainder_rounding(
    values: &[f64],
    stay_dates: &[NaiveDate],
    as_of: NaiveDate,
    target_month: TargetMonth,
    goal_total: f64,
    cap: Option<f64>,
) -> Result<RoundingOutcome> {
    if values.len() != stay_dates.len() {
        return Err(ForecastError::InvalidParameter(format!(
            "values ({}) and stay_dates ({}) must have the same length",
            values.len(),
            stay_dates.len()
        )));
    }

    let cap = cap
        .filter(|c| c.is_finite() && *c >= 0.0)
        .map(|c| c.floor() as i64);

    let adjustable: Vec<usize> = stay_dates
        .iter()
        .enumerate()
        .filter(|(_, date)| **date >= as_of && target_month.contains(**date))
        .map(|(idx, _)| idx)
        .collect();

    let fixed_total: f64 = stay_dates
        .iter()
        .zip(values)
        .filter(|(date, _)| !(**date >= as_of && target_month.contains(**date)))
        .map(|(_, v)| if v.is_nan() { 0.0 } else { *v })
        .sum();

    let mut base = Vec::with_capacity(adjustable.len());
    let mut remainders = Vec::with_capacity(adjustable.len());
    for idx in &adjustable {
        let raw = if values[*idx].is_nan() { 0.0 } else { values[*idx] };
        let mut floored = (raw.floor() as i64).max(0);
        remainders.push(raw - floored as f64);
        if let Some(cap) = cap {
            floored = floored.min(cap);
        }
        base.push(floored);
    }

    let goal_value = if goal_total.is_finite() { goal_total } else { 0.0 };
    let goal = goal_value.round_ties_even() as i64;
    let current_total = fixed_total + base.iter().sum::<i64>() as f64;
    let mut need = (goal as f64 - current_total).round_ties_even() as i64;

    if need != 0 && !base.is_empty() {
        need = match cap {
            None if need > 0 => allocate_uncapped_positive(&mut base, &remainders, need),
            None => allocate_uncapped_negative(&mut base, &remainders, need),
            Some(cap) => allocate_capped(&mut base, &remainders, need, cap),
        };
    }

    let termination = if need == 0 {
        RoundingTermination::Exact
    } else if adjustable.is_empty() {
        RoundingTermination::NoAdjustableDays
    } else {
        RoundingTermination::NoEligibleDay
    };

    let mut adjusted = values.to_vec();
    for (idx, value) in adjustable.iter().zip(&base) {
        adjusted[*idx] = *value as f64;
    }
    let total = adjusted.iter().filter(|v| !v.is_nan()).sum();

    if termination != RoundingTermination::Exact {
        warn!(
            %target_month,
            %as_of,
            goal,
            total,
            remaining_need = need,
            ?termination,
            "monthly rounding could not reach its goal"
        );
    }

    Ok(RoundingOutcome {
        values: adjusted,
        total,
        goal,
        remaining_need: need,
        termination,
    })
}
