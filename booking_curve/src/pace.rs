//! Pace adjusters: from a baseline curve and a partial observation to a
//! final-rooms forecast per stay date
//!
//! Every variant shares the same skeleton. For a stay date at lead time
//! `lt_now` with `current_oh` rooms on hand, the baseline says
//! `base_final - base_now` rooms are still to come; the variants differ only
//! in the factor that scales that remaining pickup:
//!
//! - [`forecast_final_from_curve`]: no scaling
//! - [`forecast_final_from_pace14`]: local pace over the last 14 days
//! - [`forecast_final_from_pace14_market`]: local pace close in, a decayed
//!   market-wide pace further out
//! - [`forecast_final_from_pace14_weekshape_flow`]: local pace close in,
//!   the per-week flow factor further out

use crate::baseline::BaselineCurve;
use crate::calendar::{days_between, week_id, WeekdayMap};
use crate::config::{ForecastSettings, Pace14Settings};
use crate::error::{ForecastError, Result};
use crate::frame::{
    ForecastFrame, ForecastRow, MarketAdjustment, PaceFactor, RowSource, WeekshapeAdjustment,
};
use crate::matrix::{LtMatrix, RowView, ACTUAL_LT};
use crate::weekshape::WeekshapeFactors;
use chrono::{Datelike, NaiveDate, Weekday};
use curve_math::{quantile_linear, safe_divide};
use std::collections::BTreeMap;

/// As-of date, capacity and the lead times eligible for a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastScope {
    pub as_of: NaiveDate,
    pub capacity: f64,
    pub lt_min: i32,
    pub lt_max: i32,
}

impl ForecastScope {
    /// Scope covering lead times `0..=90`.
    pub fn new(as_of: NaiveDate, capacity: f64) -> Result<Self> {
        Self::with_lead_times(as_of, capacity, 0, 90)
    }

    pub fn with_lead_times(
        as_of: NaiveDate,
        capacity: f64,
        lt_min: i32,
        lt_max: i32,
    ) -> Result<Self> {
        if lt_min > lt_max {
            return Err(ForecastError::InvalidParameter(
                "lt_min must be less than or equal to lt_max".to_string(),
            ));
        }
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Capacity must be > 0, got {}",
                capacity
            )));
        }
        Ok(Self {
            as_of,
            capacity,
            lt_min,
            lt_max,
        })
    }

    fn bound(&self, value: f64) -> f64 {
        value.max(0.0).min(self.capacity)
    }
}

/// Historical spread of 14-day pickups used to flag spikes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeThreshold {
    pub q_lo: f64,
    pub q_hi: f64,
    pub n: usize,
}

/// Spike thresholds keyed by the lower lead time of the pickup window.
pub type SpikeThresholds = BTreeMap<i32, SpikeThreshold>;

/// Quantiles of `history[lower_lt] - history[upper_lt]` for every lower lead
/// time in `lower_lt_min..=upper_lt` with at least `spike_min_n` samples.
pub fn build_pace14_spike_thresholds(
    history: &LtMatrix,
    settings: &Pace14Settings,
) -> Result<SpikeThresholds> {
    let mut thresholds = BTreeMap::new();
    if history.is_empty() || !history.has_lead_time(settings.upper_lt) {
        return Ok(thresholds);
    }

    for lower_lt in settings.lower_lt_min..=settings.upper_lt {
        if !history.has_lead_time(lower_lt) {
            continue;
        }
        let deltas: Vec<f64> = history
            .iter_rows()
            .filter_map(|row| Some(row.get(lower_lt)? - row.get(settings.upper_lt)?))
            .collect();
        if deltas.len() < settings.spike_min_n {
            continue;
        }
        thresholds.insert(
            lower_lt,
            SpikeThreshold {
                q_lo: quantile_linear(&deltas, settings.spike_q_lo)?,
                q_hi: quantile_linear(&deltas, settings.spike_q_hi)?,
                n: deltas.len(),
            },
        );
    }
    Ok(thresholds)
}

/// Local pace factor for one stay date.
///
/// Compares the pickup observed between `upper_lt` (14) and
/// `lower_lt = max(lt_now, lower_lt_min)` with the baseline pickup over the
/// same span. The raw ratio is shrunk toward 1 in proportion to how much of
/// the window has been observed, then clipped; a pickup outside the
/// historical spike band gets the tighter spike clip.
pub fn calc_pace14_pf(
    row: &RowView<'_>,
    curve: &BaselineCurve,
    lt_now: i32,
    thresholds: &SpikeThresholds,
    settings: &Pace14Settings,
) -> PaceFactor {
    let upper_lt = settings.upper_lt;
    if lt_now > upper_lt {
        return PaceFactor::neutral(lt_now, upper_lt);
    }

    let lower_lt = lt_now.max(settings.lower_lt_min);
    if lower_lt > upper_lt {
        return PaceFactor::neutral(lower_lt, upper_lt);
    }

    let observed = |lt: i32| row.get(lt).unwrap_or(f64::NAN);
    let delta_actual = observed(lower_lt) - observed(upper_lt);
    let delta_base = curve.value(lower_lt) - curve.value(upper_lt);

    let mut pf_raw = safe_divide(delta_actual, delta_base, settings.epsilon);
    if pf_raw.is_nan() {
        pf_raw = 1.0;
    }

    let span = (upper_lt - settings.lower_lt_min).max(1) as f64;
    let alpha = f64::from(upper_lt - lower_lt) / span;
    let pf_shrunk = 1.0 + alpha * (pf_raw - 1.0);

    let is_spike = match thresholds.get(&lower_lt) {
        Some(threshold) if !delta_actual.is_nan() => {
            delta_actual < threshold.q_lo || delta_actual > threshold.q_hi
        }
        _ => false,
    };

    let band = if is_spike {
        settings.clip_spike
    } else {
        settings.clip
    };

    PaceFactor {
        lower_lt,
        upper_lt,
        delta_actual,
        delta_base,
        pf_raw,
        pf_shrunk,
        pf_clipped: band.clip(pf_shrunk),
        is_spike,
    }
}

/// Scaling applied to one stay date's remaining pickup.
struct Adjustment {
    factor_raw: f64,
    factor: f64,
    pace: Option<PaceFactor>,
    market: Option<MarketAdjustment>,
    weekshape: Option<WeekshapeAdjustment>,
}

impl Adjustment {
    fn neutral() -> Self {
        Self {
            factor_raw: 1.0,
            factor: 1.0,
            pace: None,
            market: None,
            weekshape: None,
        }
    }

    fn from_pace(pace: PaceFactor) -> Self {
        Self {
            factor_raw: pace.pf_shrunk,
            factor: pace.pf_clipped,
            pace: Some(pace),
            market: None,
            weekshape: None,
        }
    }
}

/// Shared per-stay-date loop.
///
/// Past stay dates yield their realized value (or nothing); future dates
/// outside the scope's lead times, without a curve, or with any of
/// `current_oh`, `base_now`, `base_final` missing yield no row.
fn forecast_rows<'c, C, F>(
    target: &LtMatrix,
    scope: &ForecastScope,
    curve_for: C,
    mut adjust: F,
) -> Result<ForecastFrame>
where
    C: Fn(Weekday) -> Option<&'c BaselineCurve>,
    F: FnMut(&RowView<'_>, i32, &BaselineCurve) -> Result<Adjustment>,
{
    let mut rows = Vec::new();
    for row in target.iter_rows() {
        let stay_date = row.stay_date();
        let lt_now = days_between(scope.as_of, stay_date);

        if lt_now < 0 {
            if let Some(actual) = row.get(ACTUAL_LT) {
                rows.push(ForecastRow::actual(stay_date, lt_now, actual));
            }
            continue;
        }
        if lt_now < i64::from(scope.lt_min) || lt_now > i64::from(scope.lt_max) {
            continue;
        }
        let lt_now = lt_now as i32;

        let Some(curve) = curve_for(stay_date.weekday()) else {
            continue;
        };
        let (Some(current_oh), Some(base_now), Some(base_final)) =
            (row.get(lt_now), curve.get(lt_now), curve.final_value())
        else {
            continue;
        };

        let adjustment = adjust(&row, lt_now, curve)?;
        let forecast = scope.bound(current_oh + adjustment.factor * (base_final - base_now));

        rows.push(ForecastRow {
            stay_date,
            source: RowSource::Forecast,
            lt_now: i64::from(lt_now),
            current_oh,
            base_now,
            base_final,
            factor_raw: adjustment.factor_raw,
            factor: adjustment.factor,
            forecast,
            pace: adjustment.pace,
            market: adjustment.market,
            weekshape: adjustment.weekshape,
        });
    }
    Ok(ForecastFrame::new(rows))
}

/// Curve-only forecast: `current_oh + (base_final - base_now)`.
///
/// Used with the 3-month and recent-90-day curves.
pub fn forecast_final_from_curve(
    target: &LtMatrix,
    curve: &BaselineCurve,
    scope: &ForecastScope,
) -> Result<ForecastFrame> {
    forecast_rows(target, scope, |_| Some(curve), |_, _, _| {
        Ok(Adjustment::neutral())
    })
}

/// Forecast scaled by the local 14-day pace factor.
///
/// `history` is the same-weekday history used for spike thresholds.
pub fn forecast_final_from_pace14(
    target: &LtMatrix,
    curve: &BaselineCurve,
    history: &LtMatrix,
    scope: &ForecastScope,
    settings: &Pace14Settings,
) -> Result<ForecastFrame> {
    let thresholds = build_pace14_spike_thresholds(history, settings)?;
    forecast_rows(target, scope, |_| Some(curve), |row, lt_now, curve| {
        Ok(Adjustment::from_pace(calc_pace14_pf(
            row,
            curve,
            lt_now,
            &thresholds,
            settings,
        )))
    })
}

/// Forecast with local pace close in and market pace in the market band.
///
/// Within `market.lt_min..=market.lt_max` the factor is
/// `1 + beta * (market_pace_7d - 1)` with `beta = exp(-k * (lt - lt_min))`,
/// clipped to the market band. A `NaN` market pace means no adjustment.
pub fn forecast_final_from_pace14_market(
    target: &LtMatrix,
    curve: &BaselineCurve,
    history: &LtMatrix,
    scope: &ForecastScope,
    market_pace_7d: f64,
    settings: &ForecastSettings,
) -> Result<ForecastFrame> {
    let pace = &settings.pace14;
    let market = &settings.market;
    let thresholds = build_pace14_spike_thresholds(history, pace)?;
    let market_pace_value = if market_pace_7d.is_nan() {
        1.0
    } else {
        market_pace_7d
    };

    forecast_rows(target, scope, |_| Some(curve), |row, lt_now, curve| {
        let pf = calc_pace14_pf(row, curve, lt_now, &thresholds, pace);

        let in_band = (market.lt_min..=market.lt_max).contains(&lt_now);
        let (market_beta, market_raw, market_factor) = if in_band {
            let beta = (-market.decay_k * f64::from(lt_now - market.lt_min)).exp();
            let raw = 1.0 + beta * (market_pace_value - 1.0);
            (beta, raw, market.clip.clip(raw))
        } else {
            (f64::NAN, 1.0, 1.0)
        };

        let (factor_raw, factor) = if lt_now <= pace.upper_lt {
            (pf.pf_shrunk, pf.pf_clipped)
        } else {
            (market_raw, market_factor)
        };
        Ok(Adjustment {
            factor_raw,
            factor,
            pace: Some(pf),
            market: Some(MarketAdjustment {
                market_pace_7d,
                market_beta,
                market_factor,
            }),
            weekshape: None,
        })
    })
}

/// Forecast with local pace close in and the weekshape flow factor in the
/// weekshape band, across all weekdays.
///
/// Stay dates whose weekday has no curve get no row. A gated or absent
/// `(week, weekday)` key is neutral.
pub fn forecast_final_from_pace14_weekshape_flow(
    target: &LtMatrix,
    curves_by_weekday: &WeekdayMap<BaselineCurve>,
    history_by_weekday: &WeekdayMap<LtMatrix>,
    scope: &ForecastScope,
    factors: &WeekshapeFactors,
    settings: &ForecastSettings,
) -> Result<ForecastFrame> {
    let pace = &settings.pace14;
    let weekshape = &settings.weekshape;

    let mut thresholds_by_weekday: WeekdayMap<SpikeThresholds> = WeekdayMap::new();
    for (weekday, history) in history_by_weekday.iter() {
        thresholds_by_weekday.insert(weekday, build_pace14_spike_thresholds(history, pace)?);
    }
    let no_thresholds = SpikeThresholds::new();

    forecast_rows(
        target,
        scope,
        |weekday| curves_by_weekday.get(weekday),
        |row, lt_now, curve| {
            let weekday = row.weekday();
            let thresholds = thresholds_by_weekday
                .get(weekday)
                .unwrap_or(&no_thresholds);
            let pf = calc_pace14_pf(row, curve, lt_now, thresholds, pace);
            if lt_now <= pace.upper_lt {
                return Ok(Adjustment::from_pace(pf));
            }
            if !(weekshape.lt_min..=weekshape.lt_max).contains(&lt_now) {
                let mut adjustment = Adjustment::neutral();
                adjustment.pace = Some(pf);
                return Ok(adjustment);
            }

            let id = week_id(row.stay_date(), factors.boundary());
            let entry = factors.get(id, weekday);
            let raw = entry.map_or(1.0, |e| e.factor.value());
            Ok(Adjustment {
                factor_raw: raw,
                factor: weekshape.clip.clip(raw),
                pace: Some(pf),
                market: None,
                weekshape: Some(WeekshapeAdjustment {
                    week_id: id,
                    weekshape_factor: raw,
                    weekshape_n_events: entry.map_or(0, |e| e.n_events),
                    weekshape_sum_base: entry.map_or(f64::NAN, |e| e.sum_base),
                    gated: entry.map_or(true, |e| e.factor.is_gated()),
                }),
            })
        },
    )
}
