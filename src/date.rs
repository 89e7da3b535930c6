//src/date.rs
//! Timezone-naive calendar days and the month values built on top of them.
//!
//! Every date that crosses the store boundary goes through [`CalendarDate::key`]
//! or [`CalendarDate::parse_key`]. Nothing in here carries a time of day.
use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),
    #[error("Date arithmetic overflowed starting from {0}")]
    Overflow(CalendarDate),
}

/// A single calendar day. Equality and ordering are by day only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Today in the local timezone, truncated to the day.
    #[must_use]
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Parses a canonical `YYYY-MM-DD` key. Surrounding whitespace is ignored.
    pub fn parse_key(value: &str) -> Result<Self, DateError> {
        NaiveDate::parse_from_str(value.trim(), KEY_FORMAT)
            .map(Self)
            .map_err(|_| DateError::InvalidDate(value.to_string()))
    }

    /// The canonical `YYYY-MM-DD` key used for every comparison with stored data.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.format(KEY_FORMAT).to_string()
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// 0 = Sunday ... 6 = Saturday.
    #[must_use]
    pub fn weekday_from_sunday(&self) -> u32 {
        self.0.weekday().num_days_from_sunday()
    }

    #[must_use]
    pub fn year_month(&self) -> YearMonth {
        YearMonth {
            year: self.year(),
            month: self.month(),
        }
    }

    pub fn add_days(self, days: u64) -> Result<Self, DateError> {
        self.0
            .checked_add_days(Days::new(days))
            .map(Self)
            .ok_or(DateError::Overflow(self))
    }

    pub fn sub_days(self, days: u64) -> Result<Self, DateError> {
        self.0
            .checked_sub_days(Days::new(days))
            .map(Self)
            .ok_or(DateError::Overflow(self))
    }

    /// Adds calendar months, clamping to the last day of the target month
    /// (Jan 31 + 1 month = Feb 28/29).
    pub fn add_months(self, months: u32) -> Result<Self, DateError> {
        self.0
            .checked_add_months(chrono::Months::new(months))
            .map(Self)
            .ok_or(DateError::Overflow(self))
    }

    #[must_use]
    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    #[must_use]
    pub const fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

impl FromStr for CalendarDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s)
    }
}

impl TryFrom<String> for CalendarDate {
    type Error = DateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_key(&value)
    }
}

impl From<CalendarDate> for String {
    fn from(value: CalendarDate) -> Self {
        value.key()
    }
}

/// A (year, month) pair, month in 1..=12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // Day 1 must exist for the pair to be usable at all.
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    #[must_use]
    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    #[must_use]
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> Result<CalendarDate, DateError> {
        CalendarDate::from_ymd(self.year, self.month, 1)
            .ok_or_else(|| DateError::InvalidMonth(self.to_string()))
    }

    /// Last day of the month, derived from the first day of the next one so
    /// February picks up leap years without a day-count table.
    pub fn last_day(&self) -> Result<CalendarDate, DateError> {
        let next = self.succ();
        let next_first = CalendarDate::from_ymd(next.year, next.month, 1)
            .ok_or_else(|| DateError::InvalidMonth(next.to_string()))?;
        next_first.sub_days(1)
    }

    pub fn range(&self) -> Result<MonthRange, DateError> {
        Ok(MonthRange {
            start: self.first_day()?,
            end: self.last_day()?,
        })
    }

    #[must_use]
    pub fn contains(&self, date: CalendarDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.month {
            1 => "January",
            2 => "February",
            3 => "March",
            4 => "April",
            5 => "May",
            6 => "June",
            7 => "July",
            8 => "August",
            9 => "September",
            10 => "October",
            11 => "November",
            _ => "December",
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || DateError::InvalidMonth(s.to_string());
        let (year, month) = trimmed.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

/// Inclusive [start, end] bounds of one calendar month; only ever used as a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthRange {
    pub start: CalendarDate,
    pub end: CalendarDate,
}

impl MonthRange {
    #[must_use]
    pub fn contains(&self, date: CalendarDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
