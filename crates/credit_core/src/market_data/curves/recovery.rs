//! Dated recovery rate curves.

use crate::market_data::error::MarketDataError;
use crate::math::interpolators::LinearInterpolator;
use crate::types::Date;

#[derive(Debug, Clone, PartialEq)]
enum RecoveryTerm {
    Flat(f64),
    /// Linear in days from the as-of date, flat outside the pillars
    Dated(LinearInterpolator<f64>),
}

/// Expected recovery given default as a function of the default date.
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::RecoveryCurve;
/// use credit_core::types::Date;
///
/// let as_of = Date::from_ymd(2024, 3, 20).unwrap();
/// let curve = RecoveryCurve::flat(as_of, 0.4).unwrap();
/// assert_eq!(curve.recovery_rate(Date::from_ymd(2029, 3, 20).unwrap()), 0.4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryCurve {
    as_of: Date,
    term: RecoveryTerm,
}

fn check_rate(rate: f64) -> Result<f64, MarketDataError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(MarketDataError::InvalidRecoveryRate { rate })
    }
}

impl RecoveryCurve {
    /// Constant recovery rate.
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidRecoveryRate` if `rate` is outside [0, 1].
    pub fn flat(as_of: Date, rate: f64) -> Result<Self, MarketDataError> {
        Ok(Self {
            as_of,
            term: RecoveryTerm::Flat(check_rate(rate)?),
        })
    }

    /// Recovery rates on dated pillars, interpolated linearly in time.
    ///
    /// A single pillar gives a flat curve.
    ///
    /// # Errors
    ///
    /// * `MarketDataError::InsufficientData` - No pillars
    /// * `MarketDataError::InvalidRecoveryRate` - Rate outside [0, 1]
    /// * `MarketDataError::Interpolation` - Repeated pillar date
    pub fn from_points(as_of: Date, points: &[(Date, f64)]) -> Result<Self, MarketDataError> {
        match points {
            [] => Err(MarketDataError::InsufficientData { got: 0, need: 1 }),
            [(_, rate)] => Self::flat(as_of, *rate),
            _ => {
                let mut xs = Vec::with_capacity(points.len());
                let mut ys = Vec::with_capacity(points.len());
                for &(date, rate) in points {
                    xs.push((date - as_of) as f64);
                    ys.push(check_rate(rate)?);
                }
                Ok(Self {
                    as_of,
                    term: RecoveryTerm::Dated(LinearInterpolator::new(&xs, &ys)?),
                })
            }
        }
    }

    /// Valuation date of the curve.
    #[inline]
    pub fn as_of(&self) -> Date {
        self.as_of
    }

    /// Recovery rate for a default on `date`.
    pub fn recovery_rate(&self, date: Date) -> f64 {
        match &self.term {
            RecoveryTerm::Flat(rate) => *rate,
            RecoveryTerm::Dated(interp) => interp.interpolate_clamped((date - self.as_of) as f64),
        }
    }

    /// Highest recovery rate the curve can return.
    pub fn max_rate(&self) -> f64 {
        match &self.term {
            RecoveryTerm::Flat(rate) => *rate,
            RecoveryTerm::Dated(interp) => interp.ys().iter().copied().fold(0.0, f64::max),
        }
    }
}
