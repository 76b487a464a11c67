//! Calendar helpers: target months, week identifiers and weekday-keyed maps

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weekdays in Monday-first order.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Signed number of days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// A calendar month addressed as `YYYYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetMonth {
    year: i32,
    month: u32,
}

impl TargetMonth {
    /// Create a target month, validating the month number.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::InvalidParameter(format!(
                "Month must be within 1..=12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> NaiveDate {
        // Month is validated on construction, day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.offset(1).first_day() - Duration::days(1)
    }

    /// Whether `date` falls inside the month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Shift by a signed number of months.
    pub fn offset(&self, months: i32) -> Self {
        let index = self.year * 12 + self.month as i32 - 1 + months;
        Self {
            year: index.div_euclid(12),
            month: (index.rem_euclid(12) + 1) as u32,
        }
    }

    /// Months from `self - back` to `self + forward`, inclusive and ascending.
    pub fn around(&self, back: u32, forward: u32) -> Vec<Self> {
        (-(back as i32)..=forward as i32)
            .map(|offset| self.offset(offset))
            .collect()
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for TargetMonth {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(ForecastError::InvalidParameter(format!(
                "Target month must be YYYYMM, got {:?}",
                s
            )));
        }
        let year = trimmed[..4]
            .parse::<i32>()
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let month = trimmed[4..]
            .parse::<u32>()
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        Self::new(year, month)
    }
}

/// Which weekday starts a week when grouping stay dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekBoundary {
    /// ISO 8601 weeks (Monday start, ISO week-numbering year).
    #[default]
    Iso,
    /// Weeks starting on Sunday.
    Sun,
}

/// Identifier of the week a stay date belongs to.
///
/// For [`WeekBoundary::Iso`] this is the ISO year and week. For
/// [`WeekBoundary::Sun`] it is the year of the week's Sunday and the
/// 1-based index of that Sunday within its year, so a week that straddles
/// New Year keeps a single id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekId {
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}

/// Compute the week id of `date` under `boundary`.
pub fn week_id(date: NaiveDate, boundary: WeekBoundary) -> WeekId {
    match boundary {
        WeekBoundary::Iso => {
            let iso = date.iso_week();
            WeekId {
                year: iso.year(),
                week: iso.week(),
            }
        }
        WeekBoundary::Sun => {
            let start =
                date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
            WeekId {
                year: start.year(),
                week: start.ordinal0() / 7 + 1,
            }
        }
    }
}

/// Seven optional slots keyed by weekday (Monday first).
#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayMap<T> {
    slots: [Option<T>; 7],
}

impl<T> Default for WeekdayMap<T> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<T> WeekdayMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `weekday`, returning the previous value.
    pub fn insert(&mut self, weekday: Weekday, value: T) -> Option<T> {
        self.slots[weekday.num_days_from_monday() as usize].replace(value)
    }

    pub fn get(&self, weekday: Weekday) -> Option<&T> {
        self.slots[weekday.num_days_from_monday() as usize].as_ref()
    }

    /// Iterate filled slots in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &T)> {
        WEEKDAYS
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(weekday, slot)| slot.as_ref().map(|value| (*weekday, value)))
    }

    /// Weekdays with a value, Monday first.
    pub fn weekdays(&self) -> Vec<Weekday> {
        self.iter().map(|(weekday, _)| weekday).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_target_month_bounds() {
        let feb = TargetMonth::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), date(2024, 2, 1));
        assert_eq!(feb.last_day(), date(2024, 2, 29));
        assert!(feb.contains(date(2024, 2, 29)));
        assert!(!feb.contains(date(2024, 3, 1)));
        assert!(TargetMonth::new(2024, 13).is_err());
    }

    #[test]
    fn test_target_month_offset_crosses_years() {
        let jan = TargetMonth::new(2025, 1).unwrap();
        assert_eq!(jan.offset(-1), TargetMonth::new(2024, 12).unwrap());
        assert_eq!(jan.offset(-13), TargetMonth::new(2023, 12).unwrap());
        assert_eq!(jan.offset(12), TargetMonth::new(2026, 1).unwrap());

        let around = jan.around(1, 1);
        assert_eq!(around.len(), 3);
        assert_eq!(around[0].to_string(), "202412");
    }

    #[test]
    fn test_target_month_parse() {
        let month: TargetMonth = "202506".parse().unwrap();
        assert_eq!((month.year(), month.month()), (2025, 6));
        assert!("2025-06".parse::<TargetMonth>().is_err());
        assert!("202500".parse::<TargetMonth>().is_err());
    }

    #[test]
    fn test_weekday_map() {
        let mut map = WeekdayMap::new();
        assert!(map.is_empty());
        map.insert(Weekday::Sun, 7);
        map.insert(Weekday::Mon, 1);
        assert_eq!(map.insert(Weekday::Mon, 10), Some(1));
        assert_eq!(map.weekdays(), vec![Weekday::Mon, Weekday::Sun]);
        assert_eq!(map.get(Weekday::Tue), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2025, 6, 1), date(2025, 6, 15)), 14);
        assert_eq!(days_between(date(2025, 6, 15), date(2025, 6, 1)), -14);
    }
}
