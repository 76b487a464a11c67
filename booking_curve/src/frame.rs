//! Per-stay-date forecast rows with their diagnostics

use crate::calendar::WeekId;
use crate::error::Result;
use crate::matrix::date_series;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Where a row's final value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// Past stay date: the realized LT = -1 value
    Actual,
    /// Future stay date: curve-based forecast
    Forecast,
}

impl RowSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowSource::Actual => "actual",
            RowSource::Forecast => "forecast",
        }
    }
}

/// Diagnostics of the local 14-day pace factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceFactor {
    pub lower_lt: i32,
    pub upper_lt: i32,
    pub delta_actual: f64,
    pub delta_base: f64,
    pub pf_raw: f64,
    pub pf_shrunk: f64,
    pub pf_clipped: f64,
    pub is_spike: bool,
}

impl PaceFactor {
    /// A factor that leaves the forecast untouched.
    pub fn neutral(lower_lt: i32, upper_lt: i32) -> Self {
        Self {
            lower_lt,
            upper_lt,
            delta_actual: f64::NAN,
            delta_base: f64::NAN,
            pf_raw: 1.0,
            pf_shrunk: 1.0,
            pf_clipped: 1.0,
            is_spike: false,
        }
    }
}

/// Diagnostics of the market pace adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketAdjustment {
    pub market_pace_7d: f64,
    pub market_beta: f64,
    pub market_factor: f64,
}

/// Diagnostics of the weekshape adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekshapeAdjustment {
    pub week_id: WeekId,
    pub weekshape_factor: f64,
    pub weekshape_n_events: usize,
    pub weekshape_sum_base: f64,
    pub gated: bool,
}

/// One forecast row.
///
/// `factor_raw` is the multiplier before clipping and `factor` the one
/// applied; `forecast` is `current_oh + factor * (base_final - base_now)`
/// bounded to `[0, capacity]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub stay_date: NaiveDate,
    pub source: RowSource,
    pub lt_now: i64,
    pub current_oh: f64,
    pub base_now: f64,
    pub base_final: f64,
    pub factor_raw: f64,
    pub factor: f64,
    pub forecast: f64,
    pub pace: Option<PaceFactor>,
    pub market: Option<MarketAdjustment>,
    pub weekshape: Option<WeekshapeAdjustment>,
}

impl ForecastRow {
    /// Row for a past stay date carrying its realized value.
    pub fn actual(stay_date: NaiveDate, lt_now: i64, actual: f64) -> Self {
        Self {
            stay_date,
            source: RowSource::Actual,
            lt_now,
            current_oh: actual,
            base_now: f64::NAN,
            base_final: f64::NAN,
            factor_raw: 1.0,
            factor: 1.0,
            forecast: actual,
            pace: None,
            market: None,
            weekshape: None,
        }
    }
}

/// Forecast rows ordered by stay date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastFrame {
    rows: Vec<ForecastRow>,
}

impl ForecastFrame {
    /// Build a frame, sorting rows by stay date (stable).
    pub fn new(mut rows: Vec<ForecastRow>) -> Self {
        rows.sort_by_key(|row| row.stay_date);
        Self { rows }
    }

    /// Merge frames computed for disjoint sets of stay dates.
    pub fn merge<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = ForecastFrame>,
    {
        Self::new(frames.into_iter().flat_map(|frame| frame.rows).collect())
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, stay_date: NaiveDate) -> Option<&ForecastRow> {
        self.rows.iter().find(|row| row.stay_date == stay_date)
    }

    /// Final value per stay date.
    pub fn forecasts(&self) -> BTreeMap<NaiveDate, f64> {
        self.rows
            .iter()
            .map(|row| (row.stay_date, row.forecast))
            .collect()
    }

    /// Sum of all row values.
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.forecast).sum()
    }

    /// Export the diagnostic columns.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.stay_date).collect();
        let column = |name: &str, f: fn(&ForecastRow) -> f64| {
            Series::new(name, self.rows.iter().map(f).collect::<Vec<f64>>())
        };

        let df = DataFrame::new(vec![
            date_series("stay_date", &dates)?,
            Series::new(
                "source",
                self.rows
                    .iter()
                    .map(|r| r.source.as_str())
                    .collect::<Vec<&str>>(),
            ),
            Series::new(
                "lt_now",
                self.rows.iter().map(|r| r.lt_now).collect::<Vec<i64>>(),
            ),
            column("current_oh", |r| r.current_oh),
            column("base_now", |r| r.base_now),
            column("base_final", |r| r.base_final),
            column("factor_raw", |r| r.factor_raw),
            column("factor", |r| r.factor),
            column("forecast", |r| r.forecast),
        ])?;
        Ok(df)
    }
}
