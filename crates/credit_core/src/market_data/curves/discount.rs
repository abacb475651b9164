//! Dated discount curve.

use super::{FlatCurve, YieldCurve, ZeroRateCurve};
use crate::market_data::error::MarketDataError;
use crate::types::{Date, DayCountConvention};

#[derive(Debug, Clone)]
enum DiscountTerm {
    Flat(FlatCurve<f64>),
    Zero(ZeroRateCurve<f64>),
}

/// Discount factors queried by date.
///
/// Dates on or before the as-of date discount at 1.
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::DiscountCurve;
/// use credit_core::types::Date;
///
/// let as_of = Date::from_ymd(2024, 1, 1).unwrap();
/// let curve = DiscountCurve::flat(as_of, 0.03);
/// let df = curve.discount_factor(Date::from_ymd(2025, 1, 1).unwrap()).unwrap();
/// assert!((df - (-0.03_f64 * 366.0 / 365.0).exp()).abs() < 1e-14);
/// ```
#[derive(Debug, Clone)]
pub struct DiscountCurve {
    as_of: Date,
    day_count: DayCountConvention,
    term: DiscountTerm,
}

impl DiscountCurve {
    /// Flat continuously compounded rate on ACT/365.
    pub fn flat(as_of: Date, rate: f64) -> Self {
        Self {
            as_of,
            day_count: DayCountConvention::ActualActual365,
            term: DiscountTerm::Flat(FlatCurve::new(rate)),
        }
    }

    /// Zero rates on dated pillars.
    ///
    /// # Errors
    ///
    /// As [`ZeroRateCurve::new`]; pillars must lie after `as_of`.
    pub fn from_zero_rates(
        as_of: Date,
        day_count: DayCountConvention,
        pillars: &[(Date, f64)],
    ) -> Result<Self, MarketDataError> {
        let tenors: Vec<f64> = pillars
            .iter()
            .map(|&(date, _)| day_count.year_fraction_dates(as_of, date))
            .collect();
        let rates: Vec<f64> = pillars.iter().map(|&(_, r)| r).collect();
        Ok(Self {
            as_of,
            day_count,
            term: DiscountTerm::Zero(ZeroRateCurve::new(&tenors, &rates)?),
        })
    }

    /// Valuation date.
    #[inline]
    pub fn as_of(&self) -> Date {
        self.as_of
    }

    /// Discount factor for a payment on `date`.
    pub fn discount_factor(&self, date: Date) -> Result<f64, MarketDataError> {
        let t = self.day_count.year_fraction_dates(self.as_of, date).max(0.0);
        match &self.term {
            DiscountTerm::Flat(curve) => curve.discount_factor(t),
            DiscountTerm::Zero(curve) => curve.discount_factor(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).unwrap()
    }

    #[test]
    fn test_past_dates_discount_at_one() {
        let curve = DiscountCurve::flat(d(2024, 6, 1), 0.05);
        assert_eq!(curve.discount_factor(d(2024, 1, 1)).unwrap(), 1.0);
    }

    #[test]
    fn test_zero_rate_pillars() {
        let as_of = d(2024, 1, 1);
        let curve = DiscountCurve::from_zero_rates(
            as_of,
            DayCountConvention::ActualActual365,
            &[(d(2025, 1, 1), 0.02), (d(2029, 1, 1), 0.04)],
        )
        .unwrap();
        let df = curve.discount_factor(d(2029, 1, 1)).unwrap();
        let t = (d(2029, 1, 1) - as_of) as f64 / 365.0;
        assert_relative_eq!(df, (-0.04 * t).exp(), epsilon = 1e-14);
    }
}
