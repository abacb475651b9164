//! Dated survival curves for reference names.
//!
//! A [`SurvivalCurve`] wraps a hazard term structure with the metadata a
//! basket model needs: the reference name, the valuation date, an optional
//! [`SurvivalCalibrator`] recording the recovery assumption the curve was
//! built with, and an optional refinance (early maturity) date.

use std::sync::Arc;

use super::{CreditCurve, DiscountCurve, FlatHazardRateCurve, HazardRateCurve, RecoveryCurve};
use crate::market_data::error::MarketDataError;
use crate::types::{Date, DayCountConvention};

#[derive(Debug, Clone, PartialEq)]
enum HazardTerm {
    Flat(FlatHazardRateCurve<f64>),
    Pillars(HazardRateCurve<f64>),
}

/// Inputs a survival curve was calibrated against.
///
/// Bootstrapping itself happens elsewhere; the calibrator only carries the
/// recovery curve (and optionally the discount curve) so that downstream
/// models price with the same assumptions.
#[derive(Debug, Clone, Default)]
pub struct SurvivalCalibrator {
    recovery: Option<RecoveryCurve>,
    discount: Option<Arc<DiscountCurve>>,
}

impl SurvivalCalibrator {
    /// Calibrator carrying a recovery curve.
    pub fn new(recovery: RecoveryCurve) -> Self {
        Self {
            recovery: Some(recovery),
            discount: None,
        }
    }

    /// Attach the discount curve used in calibration.
    pub fn with_discount(mut self, discount: Arc<DiscountCurve>) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Recovery curve, if the calibrator recorded one.
    #[inline]
    pub fn recovery_curve(&self) -> Option<&RecoveryCurve> {
        self.recovery.as_ref()
    }

    /// Discount curve, if the calibrator recorded one.
    #[inline]
    pub fn discount_curve(&self) -> Option<&Arc<DiscountCurve>> {
        self.discount.as_ref()
    }
}

/// Survival probability term structure for one reference name.
///
/// Dates on or before the as-of date have survival probability 1.
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
/// use credit_core::types::Date;
///
/// let as_of = Date::from_ymd(2024, 3, 20).unwrap();
/// let curve = SurvivalCurve::flat("ACME", as_of, 0.02)
///     .unwrap()
///     .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap());
///
/// let five_years = Date::from_ymd(2029, 3, 20).unwrap();
/// let s = curve.survival_probability(five_years).unwrap();
/// assert!(s > 0.90 && s < 0.91);
/// assert_eq!(curve.recovery_curve().unwrap().recovery_rate(five_years), 0.4);
/// ```
#[derive(Debug, Clone)]
pub struct SurvivalCurve {
    name: String,
    as_of: Date,
    day_count: DayCountConvention,
    hazard: HazardTerm,
    calibrator: Option<SurvivalCalibrator>,
    refinance: Option<Date>,
}

impl SurvivalCurve {
    /// Curve with a constant hazard rate on ACT/365.
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidHazardRate` for a negative rate.
    pub fn flat(
        name: impl Into<String>,
        as_of: Date,
        hazard_rate: f64,
    ) -> Result<Self, MarketDataError> {
        if hazard_rate.is_nan() || hazard_rate < 0.0 {
            return Err(MarketDataError::InvalidHazardRate { rate: hazard_rate });
        }
        Ok(Self {
            name: name.into(),
            as_of,
            day_count: DayCountConvention::ActualActual365,
            hazard: HazardTerm::Flat(FlatHazardRateCurve::new(hazard_rate)),
            calibrator: None,
            refinance: None,
        })
    }

    /// Curve with piecewise-constant hazard rates ending on dated pillars.
    ///
    /// # Errors
    ///
    /// As [`HazardRateCurve::new`]; pillar dates must follow `as_of`.
    pub fn from_hazard_rates(
        name: impl Into<String>,
        as_of: Date,
        day_count: DayCountConvention,
        pillars: &[(Date, f64)],
    ) -> Result<Self, MarketDataError> {
        let tenors: Vec<f64> = pillars
            .iter()
            .map(|&(date, _)| day_count.year_fraction_dates(as_of, date))
            .collect();
        let rates: Vec<f64> = pillars.iter().map(|&(_, h)| h).collect();
        Ok(Self {
            name: name.into(),
            as_of,
            day_count,
            hazard: HazardTerm::Pillars(HazardRateCurve::new(&tenors, &rates)?),
            calibrator: None,
            refinance: None,
        })
    }

    /// Attach a calibrator.
    pub fn with_calibrator(mut self, calibrator: SurvivalCalibrator) -> Self {
        self.calibrator = Some(calibrator);
        self
    }

    /// Attach a calibrator carrying only a recovery curve.
    pub fn with_recovery(self, recovery: RecoveryCurve) -> Self {
        self.with_calibrator(SurvivalCalibrator::new(recovery))
    }

    /// Attach a refinance (early maturity) date.
    pub fn with_refinance(mut self, date: Date) -> Self {
        self.refinance = Some(date);
        self
    }

    /// Reference name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Valuation date.
    #[inline]
    pub fn as_of(&self) -> Date {
        self.as_of
    }

    /// Day count used to turn dates into curve times.
    #[inline]
    pub fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    /// Calibrator, if any.
    #[inline]
    pub fn calibrator(&self) -> Option<&SurvivalCalibrator> {
        self.calibrator.as_ref()
    }

    /// Recovery curve exposed by the calibrator, if any.
    #[inline]
    pub fn recovery_curve(&self) -> Option<&RecoveryCurve> {
        self.calibrator.as_ref().and_then(|c| c.recovery_curve())
    }

    /// Refinance date, if the name matures early.
    #[inline]
    pub fn refinance_date(&self) -> Option<Date> {
        self.refinance
    }

    fn curve(&self) -> &dyn CreditCurve<f64> {
        match &self.hazard {
            HazardTerm::Flat(c) => c,
            HazardTerm::Pillars(c) => c,
        }
    }

    fn time(&self, date: Date) -> f64 {
        self.day_count.year_fraction_dates(self.as_of, date).max(0.0)
    }

    /// Survival probability to `date`.
    pub fn survival_probability(&self, date: Date) -> Result<f64, MarketDataError> {
        self.curve().survival_probability(self.time(date))
    }

    /// Default probability by `date`.
    pub fn default_probability(&self, date: Date) -> Result<f64, MarketDataError> {
        Ok(1.0 - self.survival_probability(date)?)
    }

    /// Probability of defaulting in `(start, end]` given survival to `start`.
    ///
    /// Returns 0 when `end <= start`.
    pub fn conditional_default_probability(
        &self,
        start: Date,
        end: Date,
    ) -> Result<f64, MarketDataError> {
        if end <= start {
            return Ok(0.0);
        }
        let fwd = self
            .curve()
            .forward_survival_probability(self.time(start), self.time(end))?;
        Ok(1.0 - fwd)
    }

    /// Instantaneous hazard rate at `date`.
    pub fn hazard_rate(&self, date: Date) -> Result<f64, MarketDataError> {
        self.curve().hazard_rate(self.time(date))
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
    fn test_flat_survival_dates() {
        let as_of = d(2024, 1, 1);
        let curve = SurvivalCurve::flat("A", as_of, 0.02).unwrap();
        assert_eq!(curve.survival_probability(d(2023, 6, 1)).unwrap(), 1.0);
        let t = (d(2026, 1, 1) - as_of) as f64 / 365.0;
        assert_relative_eq!(
            curve.default_probability(d(2026, 1, 1)).unwrap(),
            1.0 - (-0.02 * t).exp(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_conditional_default() {
        let as_of = d(2024, 1, 1);
        let curve = SurvivalCurve::flat("A", as_of, 0.05).unwrap();
        let p = curve
            .conditional_default_probability(d(2025, 1, 1), d(2026, 1, 1))
            .unwrap();
        assert_relative_eq!(p, 1.0 - (-0.05_f64).exp(), epsilon = 1e-14);
        assert_eq!(
            curve
                .conditional_default_probability(d(2026, 1, 1), d(2025, 1, 1))
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn test_missing_recovery() {
        let as_of = d(2024, 1, 1);
        let bare = SurvivalCurve::flat("A", as_of, 0.01).unwrap();
        assert!(bare.recovery_curve().is_none());

        let empty = bare.clone().with_calibrator(SurvivalCalibrator::default());
        assert!(empty.calibrator().is_some());
        assert!(empty.recovery_curve().is_none());
    }

    #[test]
    fn test_pillar_curve_and_refinance() {
        let as_of = d(2024, 1, 1);
        let curve = SurvivalCurve::from_hazard_rates(
            "B",
            as_of,
            DayCountConvention::ActualActual365,
            &[(d(2025, 1, 1), 0.01), (d(2029, 1, 1), 0.03)],
        )
        .unwrap()
        .with_refinance(d(2027, 1, 1));
        assert_eq!(curve.refinance_date(), Some(d(2027, 1, 1)));
        assert_eq!(curve.hazard_rate(d(2024, 6, 1)).unwrap(), 0.01);
        assert_eq!(curve.hazard_rate(d(2026, 6, 1)).unwrap(), 0.03);
        assert!(SurvivalCurve::flat("C", as_of, -0.01).is_err());
    }
}
