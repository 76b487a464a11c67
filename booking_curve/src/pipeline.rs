//! Monthly forecast pipeline
//!
//! Runs one model over every weekday of a target month, assembles the daily
//! table and optionally applies the segment adjustment and the monthly
//! rounding reconciliation.

use crate::baseline::{
    moving_average_3months, moving_average_recent_90days_weighted, BaselineCache, BaselineCurve,
};
use crate::calendar::{TargetMonth, WeekdayMap, WEEKDAYS};
use crate::config::ForecastSettings;
use crate::error::{ForecastError, Result};
use crate::frame::ForecastFrame;
use crate::market::{compute_market_pace_7d, MarketPace};
use crate::matrix::LtMatrix;
use crate::output::ForecastTable;
use crate::pace::{
    forecast_final_from_curve, forecast_final_from_pace14, forecast_final_from_pace14_market,
    forecast_final_from_pace14_weekshape_flow, ForecastScope,
};
use crate::rounding::{
    apply_remainder_rounding, round_total_goal, should_apply_monthly_rounding, RoundingOutcome,
};
use crate::segment::CalendarFeatures;
use crate::weekshape::{compute_weekshape_flow_factors, WeekshapeFactors};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Months of history the avg model averages over.
const AVG_HISTORY_MONTHS: i32 = 3;

/// Forecast model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Mean curve of the three months before the target month
    Avg,
    /// Recent-90-day curve
    Recent90,
    /// Recency-weighted recent-90-day curve
    #[serde(rename = "recent90w")]
    Recent90Weighted,
    Pace14,
    Pace14Market,
    Pace14WeekshapeFlow,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Avg,
        ModelKind::Recent90,
        ModelKind::Recent90Weighted,
        ModelKind::Pace14,
        ModelKind::Pace14Market,
        ModelKind::Pace14WeekshapeFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Avg => "avg",
            ModelKind::Recent90 => "recent90",
            ModelKind::Recent90Weighted => "recent90w",
            ModelKind::Pace14 => "pace14",
            ModelKind::Pace14Market => "pace14_market",
            ModelKind::Pace14WeekshapeFlow => "pace14_weekshape_flow",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|model| model.as_str() == s.trim())
            .ok_or_else(|| ForecastError::InvalidParameter(format!("Unknown model {:?}", s)))
    }
}

/// Inputs of one monthly forecast.
///
/// `target` holds the target month's stay dates (other rows are ignored).
/// `history` holds the stay dates curves are learned from: the three months
/// before the target for [`ModelKind::Avg`], the months around `as_of` for
/// the others. Target rows absent from `history` are added when scoring
/// weekshape groups.
#[derive(Debug, Clone)]
pub struct ForecastRequest<'a> {
    pub model: ModelKind,
    pub target_month: TargetMonth,
    pub as_of: NaiveDate,
    pub capacity: f64,
    pub target: &'a LtMatrix,
    pub history: &'a LtMatrix,
    pub settings: &'a ForecastSettings,
    /// Enables the segment adjustment when set
    pub calendar: Option<&'a CalendarFeatures>,
    /// Month total to reconcile projected rooms to, when set
    pub goal_total: Option<f64>,
}

/// Everything one monthly run produces.
#[derive(Debug, Clone)]
pub struct MonthlyForecast {
    pub model: ModelKind,
    pub table: ForecastTable,
    pub frame: ForecastFrame,
    pub market_pace: Option<MarketPace>,
    pub weekshape: Option<WeekshapeFactors>,
    pub rounding: Option<RoundingOutcome>,
}

/// Curve and history of every weekday that has history.
struct WeekdayInputs {
    curves: WeekdayMap<BaselineCurve>,
    histories: WeekdayMap<LtMatrix>,
}

fn recent_inputs(
    request: &ForecastRequest<'_>,
    lt_max: i32,
    cache: &mut BaselineCache,
) -> Result<WeekdayInputs> {
    let settings = request.settings;
    let mut inputs = WeekdayInputs {
        curves: WeekdayMap::new(),
        histories: WeekdayMap::new(),
    };
    for (weekday, history_wd) in request.history.split_by_weekday() {
        let curve = if request.model == ModelKind::Recent90Weighted {
            moving_average_recent_90days_weighted(
                &history_wd,
                request.as_of,
                settings.lt_min,
                lt_max,
                settings.recent90_weights,
                settings.recent90_min_count_weekday,
            )?
        } else {
            cache.recent90(
                weekday,
                &history_wd,
                request.as_of,
                settings.lt_min,
                lt_max,
                settings.recent90_min_count_weekday,
            )?
        };
        inputs.curves.insert(weekday, curve);
        inputs.histories.insert(weekday, history_wd);
    }
    Ok(inputs)
}

fn avg_inputs(request: &ForecastRequest<'_>) -> Result<WeekdayMap<BaselineCurve>> {
    let settings = request.settings;
    let months: Vec<TargetMonth> = (1..=AVG_HISTORY_MONTHS)
        .rev()
        .map(|back| request.target_month.offset(-back))
        .collect();

    let mut curves = WeekdayMap::new();
    for weekday in WEEKDAYS {
        let matrices: Vec<LtMatrix> = months
            .iter()
            .map(|month| {
                request
                    .history
                    .restrict_to_month(*month)
                    .filter_by_weekday(weekday)
            })
            .filter(|matrix| !matrix.is_empty())
            .collect();
        if matrices.is_empty() {
            continue;
        }
        curves.insert(
            weekday,
            moving_average_3months(&matrices, settings.lt_min, settings.lt_max)?,
        );
    }
    Ok(curves)
}

/// History plus the target rows it lacks.
fn history_with_target(history: &LtMatrix, target: &LtMatrix) -> LtMatrix {
    let known: BTreeSet<NaiveDate> = history.stay_dates().into_iter().collect();
    let extra = target.filter_rows(|date| !known.contains(&date));
    LtMatrix::concat([history, &extra])
}

/// Forecast `request.target_month` with `request.model`.
pub fn build_monthly_forecast(
    request: &ForecastRequest<'_>,
    cache: &mut BaselineCache,
) -> Result<MonthlyForecast> {
    let settings = request.settings;
    settings.validate()?;
    let scope = ForecastScope::with_lead_times(request.as_of, request.capacity, 0, settings.lt_max)?;
    let target = request.target.restrict_to_month(request.target_month);

    let mut market_pace = None;
    let mut weekshape = None;

    let frame = match request.model {
        ModelKind::Avg => {
            let curves = avg_inputs(request)?;
            let mut frames = Vec::new();
            for (weekday, curve) in curves.iter() {
                let target_wd = target.filter_by_weekday(weekday);
                frames.push(forecast_final_from_curve(&target_wd, curve, &scope)?);
            }
            ForecastFrame::merge(frames)
        }
        ModelKind::Recent90 | ModelKind::Recent90Weighted => {
            let inputs = recent_inputs(request, settings.lt_max, cache)?;
            let mut frames = Vec::new();
            for (weekday, curve) in inputs.curves.iter() {
                let target_wd = target.filter_by_weekday(weekday);
                frames.push(forecast_final_from_curve(&target_wd, curve, &scope)?);
            }
            ForecastFrame::merge(frames)
        }
        ModelKind::Pace14 => {
            let inputs = recent_inputs(request, settings.lt_max, cache)?;
            let mut frames = Vec::new();
            for (weekday, curve) in inputs.curves.iter() {
                let Some(history_wd) = inputs.histories.get(weekday) else {
                    continue;
                };
                let target_wd = target.filter_by_weekday(weekday);
                frames.push(forecast_final_from_pace14(
                    &target_wd,
                    curve,
                    history_wd,
                    &scope,
                    &settings.pace14,
                )?);
            }
            ForecastFrame::merge(frames)
        }
        ModelKind::Pace14Market => {
            let inputs = recent_inputs(request, settings.lt_max, cache)?;
            let pace = compute_market_pace_7d(
                &target,
                request.as_of,
                &inputs.histories,
                settings.lt_min,
                settings.lt_max,
                settings,
                cache,
            )?;
            let mut frames = Vec::new();
            for (weekday, curve) in inputs.curves.iter() {
                let Some(history_wd) = inputs.histories.get(weekday) else {
                    continue;
                };
                let target_wd = target.filter_by_weekday(weekday);
                frames.push(forecast_final_from_pace14_market(
                    &target_wd,
                    curve,
                    history_wd,
                    &scope,
                    pace.value(),
                    settings,
                )?);
            }
            market_pace = Some(pace);
            ForecastFrame::merge(frames)
        }
        ModelKind::Pace14WeekshapeFlow => {
            let ws = &settings.weekshape;
            let lt_max = settings.lt_max.max(ws.lt_max + ws.w);
            let inputs = recent_inputs(request, lt_max, cache)?;
            let scored = history_with_target(request.history, &target);
            let factors = compute_weekshape_flow_factors(
                &scored,
                request.as_of,
                &inputs.curves,
                request.capacity,
                ws.lt_min,
                ws.lt_max,
                ws.w,
                ws.boundary,
                ws,
            )?;
            let frame = forecast_final_from_pace14_weekshape_flow(
                &target,
                &inputs.curves,
                &inputs.histories,
                &scope,
                &factors,
                settings,
            )?;
            weekshape = Some(factors);
            frame
        }
    };

    let mut table = ForecastTable::prepare(&target, &frame, request.as_of);

    if let Some(calendar) = request.calendar {
        table.apply_segment_adjustment(calendar, &settings.segment);
    }

    let mut rounding = None;
    if let Some(goal_total) = request.goal_total {
        let stay_dates = table.stay_dates();
        if should_apply_monthly_rounding(
            request.target_month,
            request.as_of,
            &stay_dates,
            settings.rounding.min_future_days,
        ) {
            let goal = round_total_goal(goal_total, settings.rounding.unit);
            let outcome = apply_remainder_rounding(
                &table.projected_values(),
                &stay_dates,
                request.as_of,
                request.target_month,
                goal,
                Some(request.capacity),
            )?;
            table.set_projected_values(&outcome.values);
            rounding = Some(outcome);
        } else {
            debug!(target_month = %request.target_month, "monthly rounding not applied");
        }
    }

    info!(
        model = %request.model,
        target_month = %request.target_month,
        as_of = %request.as_of,
        days = table.len(),
        forecast_rows = frame.len(),
        projected_total = table.projected_total(),
        "monthly forecast built"
    );

    Ok(MonthlyForecast {
        model: request.model,
        table,
        frame,
        market_pace,
        weekshape,
        rounding,
    })
}
