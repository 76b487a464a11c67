//! Market pace: a single booking-velocity ratio shared by every stay date
//!
//! The estimate pools the last seven days of one-day pickups close to
//! arrival (`lt` in `0..=14`) across all stay dates and compares them with
//! what the baseline curves expected. Each trailing day is scored with
//! curves rebuilt as of that day, so the estimate only uses information that
//! was available then. The pooled ratio-of-sums is reported only when enough
//! events back it.

use crate::baseline::BaselineCache;
use crate::calendar::{days_between, WeekdayMap};
use crate::config::ForecastSettings;
use crate::error::{ForecastError, Result};
use crate::matrix::LtMatrix;
use crate::pickup::{daily_pickup, PickupTotals};
use chrono::{Datelike, Duration, NaiveDate};
use curve_math::{safe_divide, ClipBand};
use tracing::debug;

/// Pickup totals for one candidate as-of date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketPaceDay {
    pub as_of_date: NaiveDate,
    pub sum_actual: f64,
    pub sum_base: f64,
    pub n_events: usize,
    /// Ratio for this day alone, `NaN` when its base is near zero
    pub mp_raw: f64,
}

/// Pooled totals and the per-day breakdown, ascending by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketPaceDiagnostics {
    pub sum_actual: f64,
    pub sum_base: f64,
    pub n_events: usize,
    pub detail: Vec<MarketPaceDay>,
}

/// Why the market pace could not be measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InsufficientReason {
    NoEvents,
    TooFewEvents { n_events: usize, min_events: usize },
    BaseTooSmall { sum_base: f64, min_abs_sum_base: f64 },
}

/// Outcome of [`compute_market_pace_7d`].
#[derive(Debug, Clone, PartialEq)]
pub enum MarketPace {
    Insufficient {
        reason: InsufficientReason,
        diagnostics: MarketPaceDiagnostics,
    },
    Computed {
        factor: f64,
        diagnostics: MarketPaceDiagnostics,
    },
}

impl MarketPace {
    /// The pooled ratio, `NaN` when not measurable.
    pub fn value(&self) -> f64 {
        match self {
            MarketPace::Insufficient { .. } => f64::NAN,
            MarketPace::Computed { factor, .. } => *factor,
        }
    }

    /// The pooled ratio clipped to `band`, `NaN` when not measurable.
    pub fn clipped(&self, band: ClipBand) -> f64 {
        band.clip(self.value())
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, MarketPace::Computed { .. })
    }

    pub fn diagnostics(&self) -> &MarketPaceDiagnostics {
        match self {
            MarketPace::Insufficient { diagnostics, .. } => diagnostics,
            MarketPace::Computed { diagnostics, .. } => diagnostics,
        }
    }

    pub fn detail(&self) -> &[MarketPaceDay] {
        &self.diagnostics().detail
    }
}

/// Estimate the market pace over the trailing `settings.market.days`
/// candidate dates ending at `as_of`.
///
/// `lt_df` holds the stay dates whose pickups are scored (all weekdays);
/// `history_by_weekday` feeds the per-weekday recent-90-day curves built
/// with `lt_min..=lt_max` for each candidate date.
pub fn compute_market_pace_7d(
    lt_df: &LtMatrix,
    as_of: NaiveDate,
    history_by_weekday: &WeekdayMap<LtMatrix>,
    lt_min: i32,
    lt_max: i32,
    settings: &ForecastSettings,
    cache: &mut BaselineCache,
) -> Result<MarketPace> {
    if lt_min > lt_max {
        return Err(ForecastError::InvalidParameter(
            "lt_min must be less than or equal to lt_max".to_string(),
        ));
    }
    let upper_lt = settings.pace14.upper_lt;
    let epsilon = settings.pace14.epsilon;
    let market = &settings.market;

    let mut pooled = PickupTotals::default();
    let mut detail = Vec::with_capacity(market.days as usize);

    for offset in 0..market.days {
        let candidate = as_of - Duration::days(i64::from(offset));

        let mut curves = WeekdayMap::new();
        for (weekday, history) in history_by_weekday.iter() {
            if history.is_empty() {
                continue;
            }
            let curve = cache.recent90(
                weekday,
                history,
                candidate,
                lt_min,
                lt_max,
                settings.recent90_min_count_weekday,
            )?;
            curves.insert(weekday, curve);
        }

        let mut day = PickupTotals::default();
        for row in lt_df.iter_rows() {
            let lt_now = days_between(candidate, row.stay_date());
            if lt_now < 0 || lt_now > i64::from(upper_lt) {
                continue;
            }
            let Some(curve) = curves.get(row.stay_date().weekday()) else {
                continue;
            };
            if let Some((actual, base)) = daily_pickup(&row, curve, lt_now as i32) {
                day.add(actual, base);
            }
        }

        pooled.absorb(&day);
        detail.push(MarketPaceDay {
            as_of_date: candidate,
            sum_actual: day.sum_actual,
            sum_base: day.sum_base,
            n_events: day.n_events,
            mp_raw: safe_divide(day.sum_actual, day.sum_base, epsilon),
        });
    }
    detail.sort_by_key(|day| day.as_of_date);

    let diagnostics = MarketPaceDiagnostics {
        sum_actual: pooled.sum_actual,
        sum_base: pooled.sum_base,
        n_events: pooled.n_events,
        detail,
    };

    let reason = if pooled.n_events == 0 {
        Some(InsufficientReason::NoEvents)
    } else if pooled.n_events < market.min_events_7d {
        Some(InsufficientReason::TooFewEvents {
            n_events: pooled.n_events,
            min_events: market.min_events_7d,
        })
    } else if pooled.sum_base.abs() < market.min_abs_sum_base || pooled.sum_base.abs() <= epsilon {
        Some(InsufficientReason::BaseTooSmall {
            sum_base: pooled.sum_base,
            min_abs_sum_base: market.min_abs_sum_base,
        })
    } else {
        None
    };

    match reason {
        Some(reason) => {
            debug!(%as_of, ?reason, n_events = pooled.n_events, "market pace not measurable");
            Ok(MarketPace::Insufficient {
                reason,
                diagnostics,
            })
        }
        None => {
            let factor = pooled.sum_actual / pooled.sum_base;
            debug!(%as_of, factor, n_events = pooled.n_events, "market pace computed");
            Ok(MarketPace::Computed {
                factor,
                diagnostics,
            })
        }
    }
}
