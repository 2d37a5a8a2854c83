// 📅 Month-periods and date helpers
//
// A month-period ("2025-11") groups card payments by billing cycle.
// Dates are persisted as "YYYY-MM-DD", periods as "YYYY-MM".

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Four-digit years only, so "YYYY-MM" text sorts chronologically
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, TrackerError> {
        if !(1..=12).contains(&month) || !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(TrackerError::InvalidDate(format!("{:04}-{:02}", year, month)));
        }
        Ok(MonthPeriod { year, month })
    }

    /// Period a date belongs to
    pub fn from_date(date: NaiveDate) -> Self {
        MonthPeriod {
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

    fn out_of_range(&self) -> TrackerError {
        TrackerError::InvalidDate(self.to_string())
    }

    pub fn first_day(&self) -> Result<NaiveDate, TrackerError> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or_else(|| self.out_of_range())
    }

    /// Number of days in this month (28-31)
    pub fn length(&self) -> Result<u32, TrackerError> {
        let first = self.first_day()?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| self.out_of_range())?;
        Ok((next - first).num_days() as u32)
    }

    /// Fails when the result would leave the four-digit year range
    pub fn plus_months(&self, months: u32) -> Result<Self, TrackerError> {
        let date = self
            .first_day()?
            .checked_add_months(Months::new(months))
            .ok_or_else(|| self.out_of_range())?;
        MonthPeriod::new(date.year(), date.month())
    }

    /// Date in this month at `day`, clamped into 1..=length()
    ///
    /// Day 31 in a 30-day month lands on the 30th; day 30 in February lands
    /// on the 28th (29th in leap years).
    pub fn at_day_clamped(&self, day: u32) -> Result<NaiveDate, TrackerError> {
        let day = day.clamp(1, self.length()?);
        self.first_day()?
            .with_day(day)
            .ok_or_else(|| self.out_of_range())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthPeriod {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackerError::InvalidDate(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthPeriod::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthPeriod {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthPeriod> for String {
    fn from(period: MonthPeriod) -> Self {
        period.to_string()
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, TrackerError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .ok()
        .filter(|d| (MIN_YEAR..=MAX_YEAR).contains(&d.year()))
        .ok_or_else(|| TrackerError::InvalidDate(s.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Whole days from `today` until `due` (negative when overdue)
pub fn days_until(today: NaiveDate, due: NaiveDate) -> i64 {
    (due - today).num_days()
}
