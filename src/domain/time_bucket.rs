//! Calendar keys used to partition visit statistics.
//!
//! Statistics are bucketed by UTC calendar month (`YYYY-MM`) and, inside a
//! record, by UTC calendar day. Retention is then a plain comparison of month
//! keys instead of wall-clock duration arithmetic.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing a month key.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MonthKeyError {
    #[error("month key must have the form YYYY-MM, got '{0}'")]
    Format(String),

    #[error("month out of range in '{0}'")]
    MonthOutOfRange(String),
}

/// A UTC calendar month, rendered as `YYYY-MM`.
///
/// Ordering is chronological (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Creates a key, returning `None` if `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month bucket of an event timestamp.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self::from_date(at.date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
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

    /// Returns the key `months` calendar months earlier.
    ///
    /// `2025-06` minus 6 is `2024-12`.
    pub fn minus_months(&self, months: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) - months as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .filter(|(y, m)| y.len() == 4 && m.len() == 2)
            .ok_or_else(|| MonthKeyError::Format(s.to_string()))?;

        let year: i32 = year
            .parse()
            .map_err(|_| MonthKeyError::Format(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| MonthKeyError::Format(s.to_string()))?;

        Self::new(year, month).ok_or_else(|| MonthKeyError::MonthOutOfRange(s.to_string()))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Day bucket of an event timestamp (UTC date).
pub fn day_key(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}
