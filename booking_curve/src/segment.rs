//! Calendar segment adjustment
//!
//! Days in the middle of a long holiday block sell slightly below what the
//! booking curve projects. The adjustment scales projected rooms for those
//! days and leaves every other day as projected.

use crate::config::SegmentSettings;
use crate::error::{ForecastError, Result};
use crate::matrix::{date_series, read_date_column};
use crate::output::ForecastTable;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Position of a day within its holiday block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayPosition {
    #[default]
    None,
    Start,
    Middle,
    End,
}

impl FromStr for HolidayPosition {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" => Ok(HolidayPosition::None),
            "start" => Ok(HolidayPosition::Start),
            "middle" => Ok(HolidayPosition::Middle),
            "end" => Ok(HolidayPosition::End),
            other => Err(ForecastError::DataError(format!(
                "Unknown holiday position {:?}",
                other
            ))),
        }
    }
}

/// Calendar attributes of one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayFeatures {
    pub holiday_block_len: u32,
    pub holiday_position: HolidayPosition,
}

/// Calendar attributes keyed by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarFeatures {
    days: BTreeMap<NaiveDate, DayFeatures>,
}

impl CalendarFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, features: DayFeatures) {
        self.days.insert(date, features);
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayFeatures> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Read a `date`, `holiday_block_len`, `holiday_position` table.
    ///
    /// Missing block lengths count as 0 and missing positions as none.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = read_date_column(df, "date")?;
        let lengths = df
            .column("holiday_block_len")
            .map_err(|_| ForecastError::MissingColumn("holiday_block_len".to_string()))?
            .cast(&DataType::Float64)?;
        let positions = df
            .column("holiday_position")
            .map_err(|_| ForecastError::MissingColumn("holiday_position".to_string()))?
            .cast(&DataType::Utf8)?;

        let mut calendar = Self::new();
        for ((date, length), position) in dates
            .into_iter()
            .zip(lengths.f64()?.into_iter())
            .zip(positions.utf8()?.into_iter())
        {
            let holiday_position = match position {
                Some(text) => text.parse()?,
                None => HolidayPosition::None,
            };
            calendar.insert(
                date,
                DayFeatures {
                    holiday_block_len: length.filter(|v| *v > 0.0).map_or(0, |v| v as u32),
                    holiday_position,
                },
            );
        }
        Ok(calendar)
    }

    /// Export as a `date`, `holiday_block_len`, `holiday_position` table.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<NaiveDate> = self.days.keys().copied().collect();
        let lengths: Vec<u32> = self.days.values().map(|d| d.holiday_block_len).collect();
        let positions: Vec<&str> = self
            .days
            .values()
            .map(|d| match d.holiday_position {
                HolidayPosition::None => "",
                HolidayPosition::Start => "start",
                HolidayPosition::Middle => "middle",
                HolidayPosition::End => "end",
            })
            .collect();
        Ok(DataFrame::new(vec![
            date_series("date", &dates)?,
            Series::new("holiday_block_len", lengths),
            Series::new("holiday_position", positions),
        ])?)
    }
}

/// Multiplier for a day with `features`.
pub fn segment_factor(features: Option<&DayFeatures>, settings: &SegmentSettings) -> f64 {
    match features {
        Some(day)
            if day.holiday_block_len >= settings.long_holiday_min_len
                && day.holiday_position == HolidayPosition::Middle =>
        {
            settings.middle_factor
        }
        _ => 1.0,
    }
}

fn adjust(projected: Option<f64>, factor: f64) -> Option<i64> {
    projected
        .filter(|v| !v.is_nan())
        .map(|v| (v * factor).round_ties_even() as i64)
}

impl ForecastTable {
    /// Fill `adjusted_projected_rooms` from projected rooms and `calendar`.
    pub fn apply_segment_adjustment(
        &mut self,
        calendar: &CalendarFeatures,
        settings: &SegmentSettings,
    ) {
        for row in self.rows_mut() {
            let factor = segment_factor(calendar.get(row.stay_date), settings);
            row.adjusted_projected_rooms = adjust(row.projected_rooms, factor);
        }
    }
}

/// Append `adjusted_projected_rooms` to a table with `stay_date` and
/// `projected_rooms` columns.
pub fn apply_segment_adjustment(
    table: &DataFrame,
    calendar: &CalendarFeatures,
    settings: &SegmentSettings,
) -> Result<DataFrame> {
    let projected = table
        .column("projected_rooms")
        .map_err(|_| ForecastError::MissingColumn("projected_rooms".to_string()))?
        .cast(&DataType::Float64)?;
    let dates = read_date_column(table, "stay_date")?;

    let adjusted: Vec<Option<i64>> = dates
        .iter()
        .zip(projected.f64()?.into_iter())
        .map(|(date, value)| adjust(value, segment_factor(calendar.get(*date), settings)))
        .collect();

    let mut out = table.clone();
    out.with_column(Series::new("adjusted_projected_rooms", adjusted))?;
    Ok(out)
}
