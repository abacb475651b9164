//! Time types and Day Count Conventions for credit calculations.
//!
//! This module provides:
//! - `Date`: Type-safe date wrapper around chrono::NaiveDate
//! - `DayCountConvention`: Industry-standard day count conventions
//! - `Tenor` / `TimeUnit`: Calendar steps used to build pricing grids
//!
//! # Examples
//!
//! ```
//! use credit_core::types::time::{Date, DayCountConvention, Tenor};
//!
//! let start = Date::from_ymd(2024, 1, 1).unwrap();
//! let end = start.add_tenor("6M".parse::<Tenor>().unwrap()).unwrap();
//!
//! let yf = DayCountConvention::ActualActual365.year_fraction_dates(start, end);
//! assert!((yf - 0.4986).abs() < 0.001);
//! ```

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use super::error::DateError;

/// Type-safe date wrapper around chrono::NaiveDate.
///
/// Provides ISO 8601 serialisation and the calendar arithmetic needed to
/// lay out pricing grids.
///
/// # Examples
///
/// ```
/// use credit_core::types::time::Date;
///
/// let date = Date::from_ymd(2024, 6, 15).unwrap();
/// assert_eq!(date.year(), 2024);
///
/// let parsed: Date = "2024-06-15".parse().unwrap();
/// assert_eq!(date, parsed);
///
/// let later = Date::from_ymd(2024, 6, 25).unwrap();
/// assert_eq!(later - date, 10);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a Date from year, month, and day components.
    ///
    /// # Errors
    ///
    /// Returns `DateError::InvalidDate` if the components do not form a
    /// valid calendar date.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    /// Parses a date from an ISO 8601 string (YYYY-MM-DD).
    ///
    /// # Errors
    ///
    /// Returns `DateError::ParseError` if the string is not a valid date.
    pub fn parse(s: &str) -> Result<Self, DateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Date)
            .map_err(|e| DateError::ParseError(format!("'{}': {}", s, e)))
    }

    /// Returns the underlying chrono::NaiveDate.
    #[inline]
    pub fn into_inner(self) -> NaiveDate {
        self.0
    }

    /// Returns the year component.
    #[inline]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    #[inline]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day-of-month component.
    #[inline]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Adds (or, for negative `days`, subtracts) calendar days.
    pub fn add_days(self, days: i64) -> Result<Self, DateError> {
        let shifted = if days >= 0 {
            self.0.checked_add_days(Days::new(days as u64))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        shifted
            .map(Date)
            .ok_or_else(|| DateError::OutOfRange(format!("{} {:+} days", self, days)))
    }

    /// Adds calendar months, clamping to the month end when required
    /// (31 January + 1M = 29 February in a leap year).
    pub fn add_months(self, months: i32) -> Result<Self, DateError> {
        let shifted = if months >= 0 {
            self.0.checked_add_months(Months::new(months as u32))
        } else {
            self.0.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        shifted
            .map(Date)
            .ok_or_else(|| DateError::OutOfRange(format!("{} {:+} months", self, months)))
    }

    /// Adds a tenor.
    ///
    /// # Examples
    ///
    /// ```
    /// use credit_core::types::time::{Date, Tenor, TimeUnit};
    ///
    /// let d = Date::from_ymd(2024, 3, 20).unwrap();
    /// let q = d.add_tenor(Tenor::new(3, TimeUnit::Months)).unwrap();
    /// assert_eq!(q, Date::from_ymd(2024, 6, 20).unwrap());
    /// ```
    pub fn add_tenor(self, tenor: Tenor) -> Result<Self, DateError> {
        match tenor.unit {
            TimeUnit::Days => self.add_days(tenor.count as i64),
            TimeUnit::Weeks => self.add_days(7 * tenor.count as i64),
            TimeUnit::Months => self.add_months(tenor.count),
            TimeUnit::Years => self.add_months(12 * tenor.count),
        }
    }
}

impl Sub for Date {
    type Output = i64;

    /// Returns the number of days between two dates.
    fn sub(self, other: Self) -> i64 {
        (self.0 - other.0).num_days()
    }
}

impl FromStr for Date {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, DateError> {
        Date::parse(s)
    }
}

impl fmt::Display for Date {
    /// Formats the date as ISO 8601 (YYYY-MM-DD).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Day Count Convention (year fraction convention).
///
/// # Variants
/// - `ActualActual365`: Actual days / 365 (standard for CDS hazard curves)
/// - `ActualActual360`: Actual days / 360 (CDS premium leg accruals)
/// - `Thirty360`: Each month treated as 30 days, year as 360 days
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DayCountConvention {
    /// Actual/365 Fixed: actual_days / 365.0
    #[default]
    ActualActual365,

    /// Actual/360: actual_days / 360.0
    ActualActual360,

    /// 30/360 US Bond Basis
    Thirty360,
}

impl DayCountConvention {
    /// Returns the standard convention name.
    ///
    /// # Examples
    ///
    /// ```
    /// use credit_core::types::time::DayCountConvention;
    ///
    /// assert_eq!(DayCountConvention::ActualActual365.name(), "ACT/365");
    /// assert_eq!(DayCountConvention::Thirty360.name(), "30/360");
    /// ```
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::ActualActual365 => "ACT/365",
            DayCountConvention::ActualActual360 => "ACT/360",
            DayCountConvention::Thirty360 => "30/360",
        }
    }

    /// Calculates the year fraction between two dates.
    ///
    /// Returns a negative value when `start > end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use credit_core::types::time::{Date, DayCountConvention};
    ///
    /// let start = Date::from_ymd(2024, 1, 1).unwrap();
    /// let end = Date::from_ymd(2024, 7, 1).unwrap();
    ///
    /// let yf = DayCountConvention::ActualActual360.year_fraction_dates(start, end);
    /// assert!((yf - 0.5056).abs() < 0.001);
    /// ```
    pub fn year_fraction_dates(&self, start: Date, end: Date) -> f64 {
        let days = end - start;

        match self {
            DayCountConvention::ActualActual365 => days as f64 / 365.0,
            DayCountConvention::ActualActual360 => days as f64 / 360.0,
            DayCountConvention::Thirty360 => {
                let (lo, hi, sign) = if start <= end {
                    (start.into_inner(), end.into_inner(), 1.0)
                } else {
                    (end.into_inner(), start.into_inner(), -1.0)
                };

                let d1 = if lo.day() == 31 { 30 } else { lo.day() };
                let d2 = if hi.day() == 31 && d1 == 30 {
                    30
                } else {
                    hi.day()
                };

                let days_30_360 = 360 * (hi.year() - lo.year())
                    + 30 * (hi.month() as i32 - lo.month() as i32)
                    + (d2 as i32 - d1 as i32);
                sign * days_30_360 as f64 / 360.0
            }
        }
    }
}

impl FromStr for DayCountConvention {
    type Err = DateError;

    /// Parses a day count convention (case-insensitive, separators ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(['/', ' '], "").as_str() {
            "ACT365" | "ACTUAL365" | "A365" => Ok(DayCountConvention::ActualActual365),
            "ACT360" | "ACTUAL360" | "A360" => Ok(DayCountConvention::ActualActual360),
            "30360" | "THIRTY360" => Ok(DayCountConvention::Thirty360),
            _ => Err(DateError::ParseError(format!(
                "Unknown day count convention: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Calendar unit of a [`Tenor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Calendar days
    Days,
    /// Weeks of seven days
    Weeks,
    /// Calendar months (end-of-month clamped)
    Months,
    /// Calendar years
    Years,
}

/// A calendar step such as `3M` or `1Y`.
///
/// # Examples
///
/// ```
/// use credit_core::types::time::{Tenor, TimeUnit};
///
/// let t: Tenor = "3M".parse().unwrap();
/// assert_eq!(t, Tenor::new(3, TimeUnit::Months));
/// assert_eq!(t.to_string(), "3M");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tenor {
    /// Number of units
    pub count: i32,
    /// Calendar unit
    pub unit: TimeUnit,
}

impl Tenor {
    /// Creates a tenor from a count and a unit.
    #[inline]
    pub const fn new(count: i32, unit: TimeUnit) -> Self {
        Self { count, unit }
    }

    /// Quarterly step, the conventional CDS roll frequency.
    #[inline]
    pub const fn quarterly() -> Self {
        Self::new(3, TimeUnit::Months)
    }

    /// Returns true if the tenor moves time forward.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.count > 0
    }
}

impl FromStr for Tenor {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || DateError::ParseError(format!("Invalid tenor: '{}'", s));
        let split = s.len().checked_sub(1).ok_or_else(bad)?;
        if !s.is_char_boundary(split) {
            return Err(bad());
        }
        let (count, unit) = s.split_at(split);
        let count: i32 = count.parse().map_err(|_| bad())?;
        let unit = match unit.to_ascii_uppercase().as_str() {
            "D" => TimeUnit::Days,
            "W" => TimeUnit::Weeks,
            "M" => TimeUnit::Months,
            "Y" => TimeUnit::Years,
            _ => return Err(bad()),
        };
        Ok(Tenor::new(count, unit))
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeUnit::Days => "D",
            TimeUnit::Weeks => "W",
            TimeUnit::Months => "M",
            TimeUnit::Years => "Y",
        };
        write!(f, "{}{}", self.count, unit)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::{DayCountConvention, Tenor};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    impl Serialize for DayCountConvention {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(self.name())
        }
    }

    impl<'de> Deserialize<'de> for DayCountConvention {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            DayCountConvention::from_str(&s).map_err(de::Error::custom)
        }
    }

    impl Serialize for Tenor {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Tenor {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Tenor::from_str(&s).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).unwrap()
    }

    // ========================================
    // Date
    // ========================================

    #[test]
    fn test_date_from_ymd_invalid() {
        assert!(matches!(
            Date::from_ymd(2023, 2, 29),
            Err(DateError::InvalidDate { .. })
        ));
        assert!(Date::from_ymd(2024, 2, 29).is_ok());
    }

    #[test]
    fn test_date_parse_and_display() {
        let date = Date::parse("2025-12-20").unwrap();
        assert_eq!(date.to_string(), "2025-12-20");
        assert!(Date::parse("20-12-2025").is_err());
    }

    #[test]
    fn test_add_months_clamps_month_end() {
        assert_eq!(d(2024, 1, 31).add_months(1).unwrap(), d(2024, 2, 29));
        assert_eq!(d(2023, 1, 31).add_months(1).unwrap(), d(2023, 2, 28));
        assert_eq!(d(2024, 5, 15).add_months(-3).unwrap(), d(2024, 2, 15));
    }

    #[test]
    fn test_add_tenor_units() {
        let start = d(2024, 3, 20);
        assert_eq!(start.add_tenor(Tenor::new(10, TimeUnit::Days)).unwrap(), d(2024, 3, 30));
        assert_eq!(start.add_tenor(Tenor::new(2, TimeUnit::Weeks)).unwrap(), d(2024, 4, 3));
        assert_eq!(start.add_tenor(Tenor::new(5, TimeUnit::Years)).unwrap(), d(2029, 3, 20));
        assert_eq!(start.add_days(-20).unwrap(), d(2024, 2, 29));
    }

    #[test]
    fn test_date_subtraction() {
        assert_eq!(d(2024, 3, 1) - d(2024, 2, 1), 29);
        assert_eq!(d(2024, 2, 1) - d(2024, 3, 1), -29);
    }

    // ========================================
    // DayCountConvention
    // ========================================

    #[test]
    fn test_year_fraction_act_365() {
        let yf =
            DayCountConvention::ActualActual365.year_fraction_dates(d(2024, 1, 1), d(2025, 1, 1));
        assert!((yf - 366.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn test_year_fraction_thirty_360_negative() {
        let dcc = DayCountConvention::Thirty360;
        let fwd = dcc.year_fraction_dates(d(2024, 1, 31), d(2024, 7, 31));
        let back = dcc.year_fraction_dates(d(2024, 7, 31), d(2024, 1, 31));
        assert!((fwd - 0.5).abs() < 1e-12);
        assert!((fwd + back).abs() < 1e-12);
    }

    #[test]
    fn test_dcc_from_str() {
        assert_eq!(
            "act/360".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::ActualActual360
        );
        assert!("ACT/ACT".parse::<DayCountConvention>().is_err());
    }

    // ========================================
    // Tenor
    // ========================================

    #[test]
    fn test_tenor_parse() {
        assert_eq!("1y".parse::<Tenor>().unwrap(), Tenor::new(1, TimeUnit::Years));
        assert_eq!("12M".parse::<Tenor>().unwrap().to_string(), "12M");
        assert!("M".parse::<Tenor>().is_err());
        assert!("".parse::<Tenor>().is_err());
        assert!("3Q".parse::<Tenor>().is_err());
    }

    #[test]
    fn test_tenor_quarterly() {
        assert!(Tenor::quarterly().is_positive());
        assert!(!Tenor::new(0, TimeUnit::Days).is_positive());
    }
}
