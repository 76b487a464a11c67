//! Weekshape flow factors
//!
//! Stay dates 15 to 45 days out are grouped by `(week, weekday)`. For each
//! group the one-day pickups observed over the trailing window are compared
//! with the pickups the weekday's baseline curve expected; the ratio becomes
//! the group's flow factor. Groups with too little evidence are gated to 1.
//!
//! Gated groups also feed [`train_weekshape_base_small_quantiles`], which
//! learns how much residual pickup (as a share of capacity) such thin groups
//! tend to carry.

use crate::baseline::{BaselineCache, BaselineCurve};
use crate::calendar::{
    days_between, week_id, TargetMonth, WeekBoundary, WeekId, WeekdayMap, WEEKDAYS,
};
use crate::config::{ForecastSettings, WeekshapeSettings};
use crate::error::{ForecastError, Result};
use crate::matrix::LtMatrix;
use crate::pickup::{daily_pickup, PickupTotals};
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use curve_math::Quantiles;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Months of history kept on each side of a learning sample date.
const LEARNING_MONTHS_AROUND: u32 = 4;

/// Curves built during learning accept a single observation per lead time.
const LEARNING_MIN_COUNT: usize = 1;

/// Why a group's factor was forced to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateReason {
    TooFewEvents { n_events: usize, min_events: usize },
    BaseTooSmall { sum_base: f64, min_sum_base: f64 },
}

/// Flow factor of one `(week, weekday)` group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeekshapeFactor {
    Gated { reason: GateReason },
    Computed { factor: f64 },
}

impl WeekshapeFactor {
    /// Multiplier to apply, 1 when gated.
    pub fn value(&self) -> f64 {
        match self {
            WeekshapeFactor::Gated { .. } => 1.0,
            WeekshapeFactor::Computed { factor } => *factor,
        }
    }

    pub fn is_gated(&self) -> bool {
        matches!(self, WeekshapeFactor::Gated { .. })
    }
}

/// Evidence and factor of one `(week, weekday)` group.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekshapeEntry {
    pub week_id: WeekId,
    pub weekday: Weekday,
    pub n_events: usize,
    pub n_stay_dates: usize,
    pub sum_actual: f64,
    pub sum_base: f64,
    pub factor: WeekshapeFactor,
    /// `max(sum_actual, 0) / capacity` for gated groups
    pub residual_rate: Option<f64>,
    stay_dates: BTreeSet<NaiveDate>,
}

impl WeekshapeEntry {
    /// Stay dates that contributed events, ascending.
    pub fn stay_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.stay_dates.iter().copied()
    }
}

type GroupKey = (WeekId, u32);

/// Flow factors for every `(week, weekday)` group seen at one as-of date.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekshapeFactors {
    boundary: WeekBoundary,
    entries: BTreeMap<GroupKey, WeekshapeEntry>,
}

impl WeekshapeFactors {
    /// No groups: every lookup is neutral.
    pub fn empty(boundary: WeekBoundary) -> Self {
        Self {
            boundary,
            entries: BTreeMap::new(),
        }
    }

    /// Week boundary the groups were keyed with.
    pub fn boundary(&self) -> WeekBoundary {
        self.boundary
    }

    pub fn get(&self, week_id: WeekId, weekday: Weekday) -> Option<&WeekshapeEntry> {
        self.entries
            .get(&(week_id, weekday.num_days_from_monday()))
    }

    /// Factor for `stay_date`, 1 when its group is absent or gated.
    pub fn factor_for(&self, stay_date: NaiveDate) -> f64 {
        self.get(week_id(stay_date, self.boundary), stay_date.weekday())
            .map_or(1.0, |entry| entry.factor.value())
    }

    /// Groups ordered by week then weekday.
    pub fn entries(&self) -> impl Iterator<Item = &WeekshapeEntry> {
        self.entries.values()
    }

    /// Applied factor per group.
    pub fn factor_map(&self) -> BTreeMap<GroupKey, f64> {
        self.entries
            .iter()
            .map(|(key, entry)| (*key, entry.factor.value()))
            .collect()
    }

    /// Residual rates of the gated groups, in group order.
    pub fn gated_residual_rates(&self) -> Vec<f64> {
        self.entries
            .values()
            .filter(|entry| entry.factor.is_gated())
            .filter_map(|entry| entry.residual_rate)
            .filter(|rate| !rate.is_nan())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export one row per group.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let entries: Vec<&WeekshapeEntry> = self.entries.values().collect();
        let week_ids: Vec<String> = entries.iter().map(|e| e.week_id.to_string()).collect();
        let weekdays: Vec<u32> = entries
            .iter()
            .map(|e| e.weekday.num_days_from_monday())
            .collect();

        let df = DataFrame::new(vec![
            Series::new("week_id", week_ids),
            Series::new("weekday", weekdays),
            Series::new(
                "n_events",
                entries.iter().map(|e| e.n_events as u64).collect::<Vec<u64>>(),
            ),
            Series::new(
                "n_stay_dates",
                entries.iter().map(|e| e.n_stay_dates as u64).collect::<Vec<u64>>(),
            ),
            Series::new(
                "sum_actual",
                entries.iter().map(|e| e.sum_actual).collect::<Vec<f64>>(),
            ),
            Series::new(
                "sum_base",
                entries.iter().map(|e| e.sum_base).collect::<Vec<f64>>(),
            ),
            Series::new(
                "factor",
                entries.iter().map(|e| e.factor.value()).collect::<Vec<f64>>(),
            ),
            Series::new(
                "gated",
                entries.iter().map(|e| e.factor.is_gated()).collect::<Vec<bool>>(),
            ),
            Series::new(
                "residual_rate",
                entries.iter().map(|e| e.residual_rate).collect::<Vec<Option<f64>>>(),
            ),
        ])?;
        Ok(df)
    }
}

#[derive(Default)]
struct GroupAccumulator {
    totals: PickupTotals,
    stay_dates: BTreeSet<NaiveDate>,
}

fn gate(totals: &PickupTotals, settings: &WeekshapeSettings) -> WeekshapeFactor {
    if totals.n_events < settings.min_events {
        return WeekshapeFactor::Gated {
            reason: GateReason::TooFewEvents {
                n_events: totals.n_events,
                min_events: settings.min_events,
            },
        };
    }
    if totals.sum_base.abs() < settings.min_sum_base
        || totals.sum_base.abs() <= settings.epsilon
    {
        return WeekshapeFactor::Gated {
            reason: GateReason::BaseTooSmall {
                sum_base: totals.sum_base,
                min_sum_base: settings.min_sum_base,
            },
        };
    }
    WeekshapeFactor::Computed {
        factor: totals.sum_actual / totals.sum_base,
    }
}

/// Flow factors for the stay dates of `lt_df` that sit `lt_min..=lt_max`
/// days after `as_of`.
///
/// Each stay date contributes the one-day pickups `(lt, lt + 1)` for
/// `lt` in `lt_now..lt_now + w`, so curves must reach `lt_max + w`. A
/// non-positive or non-finite `capacity` leaves residual rates unset.
#[allow(clippy::too_many_arguments)]
pub fn compute_weekshape_flow_factors(
    lt_df: &LtMatrix,
    as_of: NaiveDate,
    curves_by_weekday: &WeekdayMap<BaselineCurve>,
    capacity: f64,
    lt_min: i32,
    lt_max: i32,
    w: i32,
    boundary: WeekBoundary,
    settings: &WeekshapeSettings,
) -> Result<WeekshapeFactors> {
    if lt_min > lt_max {
        return Err(ForecastError::InvalidParameter(
            "lt_min must be less than or equal to lt_max".to_string(),
        ));
    }
    if w <= 0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Weekshape window must be positive, got {}",
            w
        )));
    }

    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();
    for row in lt_df.iter_rows() {
        let lt_now = days_between(as_of, row.stay_date());
        if lt_now < i64::from(lt_min) || lt_now > i64::from(lt_max) {
            continue;
        }
        let Some(curve) = curves_by_weekday.get(row.weekday()) else {
            continue;
        };
        let lt_now = lt_now as i32;

        let mut totals = PickupTotals::default();
        for lt in lt_now..lt_now + w {
            if let Some((actual, base)) = daily_pickup(&row, curve, lt) {
                totals.add(actual, base);
            }
        }
        if totals.n_events == 0 {
            continue;
        }

        let key = (
            week_id(row.stay_date(), boundary),
            row.weekday().num_days_from_monday(),
        );
        let group = groups.entry(key).or_default();
        group.totals.absorb(&totals);
        group.stay_dates.insert(row.stay_date());
    }

    let capacity_valid = capacity.is_finite() && capacity > 0.0;
    let entries = groups
        .into_iter()
        .map(|((week, weekday_idx), group)| {
            let factor = gate(&group.totals, settings);
            let residual_rate = (factor.is_gated() && capacity_valid)
                .then(|| group.totals.sum_actual.max(0.0) / capacity);
            let entry = WeekshapeEntry {
                week_id: week,
                weekday: WEEKDAYS[weekday_idx as usize],
                n_events: group.totals.n_events,
                n_stay_dates: group.stay_dates.len(),
                sum_actual: group.totals.sum_actual,
                sum_base: group.totals.sum_base,
                factor,
                residual_rate,
                stay_dates: group.stay_dates,
            };
            ((week, weekday_idx), entry)
        })
        .collect::<BTreeMap<_, _>>();

    debug!(
        %as_of,
        groups = entries.len(),
        gated = entries.values().filter(|e| e.factor.is_gated()).count(),
        "weekshape flow factors computed"
    );
    Ok(WeekshapeFactors { boundary, entries })
}

/// Why quantile learning produced no quantiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningSkipReason {
    CapacityMissingOrInvalid,
    NoGatedSamples,
}

impl LearningSkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningSkipReason::CapacityMissingOrInvalid => "capacity_missing_or_invalid",
            LearningSkipReason::NoGatedSamples => "no_gated_samples",
        }
    }
}

/// Outcome of [`train_weekshape_base_small_quantiles`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeekshapeLearning {
    pub trained_until: NaiveDate,
    pub window_months: u32,
    pub stride_days: u32,
    pub n_samples: usize,
    pub n_unique_stay_dates: usize,
    /// `Ok` with p90 / p95 / p97.5 of the residual rates, or why none
    pub quantiles: std::result::Result<Quantiles, LearningSkipReason>,
}

impl WeekshapeLearning {
    fn skipped(
        reason: LearningSkipReason,
        trained_until: NaiveDate,
        window_months: u32,
        stride_days: u32,
    ) -> Self {
        Self {
            trained_until,
            window_months,
            stride_days,
            n_samples: 0,
            n_unique_stay_dates: 0,
            quantiles: Err(reason),
        }
    }

    /// Cap ratio candidates, least conservative first; empty when skipped.
    pub fn cap_ratio_candidates(&self) -> Vec<f64> {
        self.quantiles
            .as_ref()
            .map(|q| q.candidates().to_vec())
            .unwrap_or_default()
    }
}

/// Sample dates from `asof_end` back `window_months` months, every
/// `stride_days`, newest first.
fn sample_dates(asof_end: NaiveDate, window_months: u32, stride_days: u32) -> Vec<NaiveDate> {
    let start = asof_end
        .checked_sub_months(Months::new(window_months))
        .unwrap_or(NaiveDate::MIN);
    let mut dates = Vec::new();
    let mut current = asof_end;
    while current >= start {
        dates.push(current);
        match current.checked_sub_signed(Duration::days(i64::from(stride_days))) {
            Some(previous) => current = previous,
            None => break,
        }
    }
    dates
}

/// Learn the upper quantiles of the residual pickup rate of gated weekshape
/// groups over the `window_months` before `asof_end`.
///
/// At every sample date the history is restricted to four months either
/// side, per-weekday recent-90-day curves are built to
/// `weekshape.lt_max + w`, and the factors are computed; each gated group
/// yields one residual rate sample.
pub fn train_weekshape_base_small_quantiles(
    history: &LtMatrix,
    asof_end: NaiveDate,
    capacity: Option<f64>,
    window_months: u32,
    stride_days: u32,
    settings: &ForecastSettings,
    cache: &mut BaselineCache,
) -> Result<WeekshapeLearning> {
    if window_months == 0 {
        return Err(ForecastError::InvalidParameter(
            "window_months must be >= 1".to_string(),
        ));
    }
    if stride_days == 0 {
        return Err(ForecastError::InvalidParameter(
            "stride_days must be >= 1".to_string(),
        ));
    }

    let Some(capacity) = capacity.filter(|c| c.is_finite() && *c > 0.0) else {
        warn!(%asof_end, "weekshape learning skipped: capacity missing or invalid");
        return Ok(WeekshapeLearning::skipped(
            LearningSkipReason::CapacityMissingOrInvalid,
            asof_end,
            window_months,
            stride_days,
        ));
    };

    let weekshape = &settings.weekshape;
    let curve_lt_max = weekshape.lt_max + weekshape.w;

    let mut residual_rates = Vec::new();
    let mut stay_dates = BTreeSet::new();

    for as_of in sample_dates(asof_end, window_months, stride_days) {
        let center = TargetMonth::of(as_of);
        let first = center.offset(-(LEARNING_MONTHS_AROUND as i32)).first_day();
        let last = center.offset(LEARNING_MONTHS_AROUND as i32).last_day();
        let nearby = history.filter_rows(|date| date >= first && date <= last);
        if nearby.is_empty() {
            debug!(%as_of, "no history around learning sample");
            continue;
        }

        let mut curves = WeekdayMap::new();
        for (weekday, history_wd) in nearby.split_by_weekday() {
            let curve = cache.recent90(
                weekday,
                &history_wd,
                as_of,
                weekshape.lt_min,
                curve_lt_max,
                LEARNING_MIN_COUNT,
            )?;
            curves.insert(weekday, curve);
        }

        let factors = match compute_weekshape_flow_factors(
            &nearby,
            as_of,
            &curves,
            capacity,
            weekshape.lt_min,
            weekshape.lt_max,
            weekshape.w,
            weekshape.boundary,
            weekshape,
        ) {
            Ok(factors) => factors,
            Err(err) => {
                warn!(%as_of, error = %err, "weekshape learning sample skipped");
                continue;
            }
        };

        for entry in factors.entries().filter(|e| e.factor.is_gated()) {
            if let Some(rate) = entry.residual_rate.filter(|r| !r.is_nan()) {
                residual_rates.push(rate);
                stay_dates.extend(entry.stay_dates());
            }
        }
    }

    if residual_rates.is_empty() {
        warn!(%asof_end, "weekshape learning found no gated samples");
        return Ok(WeekshapeLearning::skipped(
            LearningSkipReason::NoGatedSamples,
            asof_end,
            window_months,
            stride_days,
        ));
    }

    let quantiles = Quantiles::upper_tail(&residual_rates)?;
    info!(
        trained_until = %asof_end,
        window_months,
        stride_days,
        n_samples = residual_rates.len(),
        p90 = quantiles.p90,
        p95 = quantiles.p95,
        p975 = quantiles.p975,
        "base-small weekshape learning"
    );

    Ok(WeekshapeLearning {
        trained_until: asof_end,
        window_months,
        stride_days,
        n_samples: residual_rates.len(),
        n_unique_stay_dates: stay_dates.len(),
        quantiles: Ok(quantiles),
    })
}

