//! Monthly forecast table
//!
//! One row per stay date of the target month with the realized rooms, the
//! model forecast and the projection used downstream: the actual for past
//! dates, the rounded forecast otherwise.

use crate::error::Result;
use crate::frame::ForecastFrame;
use crate::matrix::{date_series, LtMatrix};
use chrono::NaiveDate;
use polars::prelude::*;

/// One day of the monthly table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTableRow {
    pub stay_date: NaiveDate,
    pub actual_rooms: Option<f64>,
    pub forecast_rooms: Option<f64>,
    pub forecast_rooms_int: Option<i64>,
    pub projected_rooms: Option<f64>,
    pub adjusted_projected_rooms: Option<i64>,
}

/// Daily forecasts of one target month, ascending by stay date.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    as_of: NaiveDate,
    rows: Vec<ForecastTableRow>,
}

impl ForecastTable {
    /// Assemble the table for every stay date of `target`.
    ///
    /// Dates without a forecast row keep empty forecast columns; dates before
    /// `as_of` project their actual, later ones the forecast rounded half to
    /// even.
    pub fn prepare(target: &LtMatrix, frame: &ForecastFrame, as_of: NaiveDate) -> Self {
        let forecasts = frame.forecasts();
        let mut stay_dates = target.stay_dates();
        stay_dates.sort();
        stay_dates.dedup();

        let rows = stay_dates
            .into_iter()
            .map(|stay_date| {
                let actual_rooms = target.actual(stay_date);
                let forecast_rooms = forecasts.get(&stay_date).copied();
                let forecast_rooms_int = forecast_rooms.map(|v| v.round_ties_even() as i64);
                let projected_rooms = if stay_date < as_of {
                    actual_rooms
                } else {
                    forecast_rooms_int.map(|v| v as f64)
                };
                ForecastTableRow {
                    stay_date,
                    actual_rooms,
                    forecast_rooms,
                    forecast_rooms_int,
                    projected_rooms,
                    adjusted_projected_rooms: None,
                }
            })
            .collect();

        Self { as_of, rows }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn rows(&self) -> &[ForecastTableRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [ForecastTableRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, stay_date: NaiveDate) -> Option<&ForecastTableRow> {
        self.rows.iter().find(|row| row.stay_date == stay_date)
    }

    pub fn stay_dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|row| row.stay_date).collect()
    }

    /// Projected rooms with `NaN` for missing days.
    pub fn projected_values(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.projected_rooms.unwrap_or(f64::NAN))
            .collect()
    }

    /// Replace projected rooms positionally; `NaN` clears a day.
    pub fn set_projected_values(&mut self, values: &[f64]) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.projected_rooms = (!value.is_nan()).then_some(*value);
        }
    }

    /// Sum of projected rooms, missing days skipped.
    pub fn projected_total(&self) -> f64 {
        self.rows.iter().filter_map(|row| row.projected_rooms).sum()
    }

    /// Sum of actual rooms, missing days skipped.
    pub fn actual_total(&self) -> f64 {
        self.rows.iter().filter_map(|row| row.actual_rooms).sum()
    }

    /// Export with a `stay_date` Date column followed by the room columns.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates = self.stay_dates();
        let optional = |name: &str, f: fn(&ForecastTableRow) -> Option<f64>| {
            Series::new(name, self.rows.iter().map(f).collect::<Vec<Option<f64>>>())
        };
        let integer = |name: &str, f: fn(&ForecastTableRow) -> Option<i64>| {
            Series::new(name, self.rows.iter().map(f).collect::<Vec<Option<i64>>>())
        };

        let df = DataFrame::new(vec![
            date_series("stay_date", &dates)?,
            optional("actual_rooms", |r| r.actual_rooms),
            optional("forecast_rooms", |r| r.forecast_rooms),
            integer("forecast_rooms_int", |r| r.forecast_rooms_int),
            optional("projected_rooms", |r| r.projected_rooms),
            integer("adjusted_projected_rooms", |r| r.adjusted_projected_rooms),
        ])?;
        Ok(df)
    }
}
