//! Pricing time grids.
//!
//! A [`TimeGrid`] is the ordered set of dates at which a basket engine
//! computes its loss distribution. The first date is the portfolio start
//! (no loss yet); the last is the maturity.

use credit_core::types::time::{Date, Tenor};

use crate::error::BasketError;

/// Lower and upper grid indices around a date and the linear weight of the
/// upper one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBracket {
    /// Index at or before the date.
    pub lower: usize,
    /// Index at or after the date.
    pub upper: usize,
    /// Weight of `upper` in [0, 1].
    pub weight: f64,
}

/// Strictly increasing computation dates from portfolio start to maturity.
///
/// # Example
///
/// ```
/// use credit_core::types::time::{Date, Tenor};
/// use credit_models::schedule::TimeGridBuilder;
///
/// let grid = TimeGridBuilder::new()
///     .start(Date::from_ymd(2024, 3, 20).unwrap())
///     .maturity(Date::from_ymd(2025, 3, 20).unwrap())
///     .step(Tenor::quarterly())
///     .build()
///     .unwrap();
///
/// assert_eq!(grid.len(), 5);
/// assert_eq!(grid.maturity(), Date::from_ymd(2025, 3, 20).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    dates: Vec<Date>,
}

impl TimeGrid {
    /// All dates, starting with the portfolio start.
    #[inline]
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Portfolio start.
    #[inline]
    pub fn start(&self) -> Date {
        self.dates[0]
    }

    /// Last date.
    #[inline]
    pub fn maturity(&self) -> Date {
        self.dates[self.dates.len() - 1]
    }

    /// Number of dates including the start.
    #[inline]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Always false; a grid holds at least start and maturity.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Bracket a date for linear interpolation, clamped to the grid ends.
    pub fn bracket(&self, date: Date) -> GridBracket {
        let last = self.dates.len() - 1;
        if date <= self.dates[0] {
            return GridBracket { lower: 0, upper: 0, weight: 0.0 };
        }
        if date >= self.dates[last] {
            return GridBracket { lower: last, upper: last, weight: 0.0 };
        }
        let upper = self.dates.partition_point(|d| *d < date);
        if self.dates[upper] == date {
            return GridBracket { lower: upper, upper, weight: 0.0 };
        }
        let lower = upper - 1;
        let span = (self.dates[upper] - self.dates[lower]) as f64;
        GridBracket {
            lower,
            upper,
            weight: (date - self.dates[lower]) as f64 / span,
        }
    }
}

/// Builder for [`TimeGrid`].
///
/// Either a step tenor or explicit dates; explicit dates outside
/// `(start, maturity)` are dropped and maturity is always appended.
#[derive(Debug, Clone, Default)]
pub struct TimeGridBuilder {
    start: Option<Date>,
    maturity: Option<Date>,
    step: Option<Tenor>,
    dates: Vec<Date>,
}

impl TimeGridBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Portfolio start.
    pub fn start(mut self, date: Date) -> Self {
        self.start = Some(date);
        self
    }

    /// Final date.
    pub fn maturity(mut self, date: Date) -> Self {
        self.maturity = Some(date);
        self
    }

    /// Step between consecutive dates.
    pub fn step(mut self, tenor: Tenor) -> Self {
        self.step = Some(tenor);
        self
    }

    /// Explicit intermediate dates.
    pub fn dates(mut self, dates: impl IntoIterator<Item = Date>) -> Self {
        self.dates.extend(dates);
        self
    }

    /// Build the grid.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` - Missing start or maturity, start not before
    ///   maturity, or a non-positive step
    /// * `Date` - Stepping overflowed the calendar
    pub fn build(self) -> Result<TimeGrid, BasketError> {
        let start = self
            .start
            .ok_or_else(|| BasketError::invalid("time grid", "missing start"))?;
        let maturity = self
            .maturity
            .ok_or_else(|| BasketError::invalid("time grid", "missing maturity"))?;
        if start >= maturity {
            return Err(BasketError::invalid(
                "time grid",
                format!("start {start} not before maturity {maturity}"),
            ));
        }

        let mut dates = vec![start];
        if let Some(step) = self.step {
            if !step.is_positive() {
                return Err(BasketError::invalid("time grid step", step.to_string()));
            }
            // Offsets from the start avoid month-end drift.
            let mut k = 1;
            loop {
                let next = start.add_tenor(Tenor::new(step.count * k, step.unit))?;
                if next >= maturity {
                    break;
                }
                dates.push(next);
                k += 1;
            }
        }
        dates.extend(self.dates.into_iter().filter(|d| *d > start && *d < maturity));
        dates.push(maturity);
        dates.sort_unstable();
        dates.dedup();
        Ok(TimeGrid { dates })
    }
}
