//! Lead-time matrices
//!
//! An [`LtMatrix`] holds on-hand room counts with one row per stay date and
//! one column per lead time (LT, in days before the stay; `-1` is the
//! realized actual). Cells are optional because missing observations are
//! common. Rows keep the order they were supplied in.

use crate::calendar::{TargetMonth, WEEKDAYS};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use polars::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

/// Lead time of the realized (final) value.
pub const ACTUAL_LT: i32 = -1;

/// One stay date and its on-hand values, aligned to the matrix columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LtRow {
    stay_date: NaiveDate,
    values: Vec<Option<f64>>,
}

impl LtRow {
    pub fn stay_date(&self) -> NaiveDate {
        self.stay_date
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// Borrowed view of a row that can be indexed by lead time.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    matrix: &'a LtMatrix,
    row: &'a LtRow,
}

impl<'a> RowView<'a> {
    pub fn stay_date(&self) -> NaiveDate {
        self.row.stay_date
    }

    /// On-hand value at `lt`, `None` when the column is absent or the cell
    /// is missing.
    pub fn get(&self, lt: i32) -> Option<f64> {
        self.matrix
            .column_index(lt)
            .and_then(|idx| self.row.values[idx])
    }

    pub fn weekday(&self) -> Weekday {
        self.row.stay_date.weekday()
    }
}

/// Table of on-hand rooms keyed by stay date (rows) and lead time (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct LtMatrix {
    lead_times: Vec<i32>,
    index: BTreeMap<i32, usize>,
    rows: Vec<LtRow>,
}

impl LtMatrix {
    /// Create a matrix from integer lead times and rows of aligned values.
    pub fn new(lead_times: Vec<i32>, rows: Vec<(NaiveDate, Vec<Option<f64>>)>) -> Result<Self> {
        let mut index = BTreeMap::new();
        for (position, lt) in lead_times.iter().enumerate() {
            if index.insert(*lt, position).is_some() {
                return Err(ForecastError::DataError(format!(
                    "Duplicate lead time column {}",
                    lt
                )));
            }
        }

        let mut lt_rows = Vec::with_capacity(rows.len());
        for (stay_date, values) in rows {
            if values.len() != lead_times.len() {
                return Err(ForecastError::DataError(format!(
                    "Row {} has {} values but the matrix has {} lead time columns",
                    stay_date,
                    values.len(),
                    lead_times.len()
                )));
            }
            let values = values
                .into_iter()
                .map(|value| value.filter(|v| !v.is_nan()))
                .collect();
            lt_rows.push(LtRow { stay_date, values });
        }

        Ok(Self {
            lead_times,
            index,
            rows: lt_rows,
        })
    }

    /// Create a matrix whose column labels still need casting to integers.
    ///
    /// Any label that is not an integer is a hard failure.
    pub fn from_labels<S: AsRef<str>>(
        labels: &[S],
        rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let lead_times = labels
            .iter()
            .map(|label| parse_lead_time(label.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(lead_times, rows)
    }

    /// A matrix with the given columns and no rows.
    pub fn empty(lead_times: Vec<i32>) -> Result<Self> {
        Self::new(lead_times, Vec::new())
    }

    pub fn lead_times(&self) -> &[i32] {
        &self.lead_times
    }

    pub fn rows(&self) -> &[LtRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_lead_time(&self, lt: i32) -> bool {
        self.index.contains_key(&lt)
    }

    fn column_index(&self, lt: i32) -> Option<usize> {
        self.index.get(&lt).copied()
    }

    /// Iterate rows in their stored order.
    pub fn iter_rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |row| RowView { matrix: self, row })
    }

    pub fn stay_dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|row| row.stay_date).collect()
    }

    /// First row for `stay_date`.
    pub fn row(&self, stay_date: NaiveDate) -> Option<RowView<'_>> {
        self.iter_rows().find(|row| row.stay_date() == stay_date)
    }

    /// Value at `(stay_date, lt)`.
    pub fn value(&self, stay_date: NaiveDate, lt: i32) -> Option<f64> {
        self.row(stay_date).and_then(|row| row.get(lt))
    }

    /// Realized rooms (LT = -1) for `stay_date`.
    pub fn actual(&self, stay_date: NaiveDate) -> Option<f64> {
        self.value(stay_date, ACTUAL_LT)
    }

    /// All cells of the `lt` column paired with their stay dates.
    pub fn column(&self, lt: i32) -> Option<Vec<(NaiveDate, Option<f64>)>> {
        let idx = self.column_index(lt)?;
        Some(
            self.rows
                .iter()
                .map(|row| (row.stay_date, row.values[idx]))
                .collect(),
        )
    }

    /// Hash of the lead times, stay dates and cell values.
    ///
    /// Equal matrices always share a fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.lead_times.hash(&mut hasher);
        for row in &self.rows {
            row.stay_date.hash(&mut hasher);
            for value in &row.values {
                value.map(f64::to_bits).hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Reindex the columns to `lt_min..=lt_max`.
    pub fn normalize(&self, lt_min: i32, lt_max: i32) -> Result<Self> {
        normalize_lt_columns(self, lt_min, lt_max)
    }

    /// Keep rows matching `predicate`, preserving order.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(NaiveDate) -> bool,
    {
        Self {
            lead_times: self.lead_times.clone(),
            index: self.index.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row.stay_date))
                .cloned()
                .collect(),
        }
    }

    /// Rows whose stay date falls on `weekday`.
    pub fn filter_by_weekday(&self, weekday: Weekday) -> Self {
        self.filter_rows(|date| date.weekday() == weekday)
    }

    /// Rows whose stay date falls in `month`.
    pub fn restrict_to_month(&self, month: TargetMonth) -> Self {
        self.filter_rows(|date| month.contains(date))
    }

    /// Split rows by weekday, Monday first, skipping empty weekdays.
    pub fn split_by_weekday(&self) -> Vec<(Weekday, Self)> {
        WEEKDAYS
            .iter()
            .map(|weekday| (*weekday, self.filter_by_weekday(*weekday)))
            .filter(|(_, matrix)| !matrix.is_empty())
            .collect()
    }

    /// Stack the rows of several matrices.
    ///
    /// The result carries the ascending union of all lead time columns;
    /// cells for columns a source matrix lacks are missing.
    pub fn concat<'a, I>(matrices: I) -> Self
    where
        I: IntoIterator<Item = &'a LtMatrix>,
    {
        let matrices: Vec<&LtMatrix> = matrices.into_iter().collect();
        let columns: BTreeSet<i32> = matrices
            .iter()
            .flat_map(|m| m.lead_times.iter().copied())
            .collect();
        let lead_times: Vec<i32> = columns.into_iter().collect();
        let index: BTreeMap<i32, usize> = lead_times
            .iter()
            .enumerate()
            .map(|(position, lt)| (*lt, position))
            .collect();

        let rows = matrices
            .iter()
            .flat_map(|matrix| matrix.iter_rows())
            .map(|view| LtRow {
                stay_date: view.stay_date(),
                values: lead_times.iter().map(|lt| view.get(*lt)).collect(),
            })
            .collect();

        Self {
            lead_times,
            index,
            rows,
        }
    }

    /// Build a matrix from a DataFrame with a date column and integer-named
    /// lead time columns.
    ///
    /// The date column may be a `Date` or an ISO (`YYYY-MM-DD`) string
    /// column. Every other column name must cast to an integer.
    pub fn from_dataframe(df: &DataFrame, date_column: &str) -> Result<Self> {
        let dates = read_date_column(df, date_column)?;

        let mut lead_times = Vec::new();
        let mut columns: Vec<Vec<Option<f64>>> = Vec::new();
        for series in df.get_columns() {
            if series.name() == date_column {
                continue;
            }
            lead_times.push(parse_lead_time(series.name())?);
            let values = series.cast(&DataType::Float64)?;
            columns.push(values.f64()?.into_iter().collect());
        }

        let rows = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| (date, columns.iter().map(|col| col[i]).collect()))
            .collect();

        Self::new(lead_times, rows)
    }

    /// Export as a DataFrame with a `stay_date` Date column followed by one
    /// Float64 column per lead time.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.lead_times.len() + 1);
        columns.push(date_series("stay_date", &self.stay_dates())?);
        for (idx, lt) in self.lead_times.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|row| row.values[idx]).collect();
            columns.push(Series::new(&lt.to_string(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Cast a column label to a lead time.
pub fn parse_lead_time(label: &str) -> Result<i32> {
    label
        .trim()
        .parse::<i32>()
        .map_err(|_| ForecastError::InvalidLeadTime(label.to_string()))
}

/// Reindex `matrix` columns to exactly `lt_min..=lt_max` in ascending order.
///
/// Columns outside the range are dropped, missing ones are filled with
/// missing cells; row order is preserved.
pub fn normalize_lt_columns(matrix: &LtMatrix, lt_min: i32, lt_max: i32) -> Result<LtMatrix> {
    if lt_min > lt_max {
        return Err(ForecastError::InvalidParameter(
            "lt_min must be less than or equal to lt_max".to_string(),
        ));
    }

    let lead_times: Vec<i32> = (lt_min..=lt_max).collect();
    let rows = matrix
        .iter_rows()
        .map(|view| {
            (
                view.stay_date(),
                lead_times.iter().map(|lt| view.get(*lt)).collect(),
            )
        })
        .collect();
    LtMatrix::new(lead_times, rows)
}

fn unix_epoch() -> NaiveDate {
    // chrono's default date is 1970-01-01
    NaiveDate::default()
}

pub(crate) fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let epoch = unix_epoch();
    let days: Vec<i32> = dates
        .iter()
        .map(|date| (*date - epoch).num_days() as i32)
        .collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

pub(crate) fn read_date_column(df: &DataFrame, date_column: &str) -> Result<Vec<NaiveDate>> {
    let series = df
        .column(date_column)
        .map_err(|_| ForecastError::MissingColumn(date_column.to_string()))?;

    let missing = || ForecastError::DataError(format!("Null value in column {}", date_column));

    match series.dtype() {
        DataType::Date => {
            let epoch = unix_epoch();
            let days = series.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .map(|day| {
                    day.map(|d| epoch + Duration::days(i64::from(d)))
                        .ok_or_else(missing)
                })
                .collect()
        }
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| {
                let text = value.ok_or_else(missing)?;
                parse_date(text)
            })
            .collect(),
        other => Err(ForecastError::DataError(format!(
            "Column {} has unsupported date type {:?}",
            date_column, other
        ))),
    }
}

/// Parse `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
        .map_err(|_| ForecastError::DataError(format!("Invalid date {:?}", text)))
}
