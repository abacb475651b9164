//! Flat and zero-rate pillar yield curves.

use super::YieldCurve;
use crate::market_data::error::MarketDataError;
use crate::math::interpolators::{Interpolator, LinearInterpolator};
use num_traits::Float;

/// Flat yield curve with a constant continuously compounded rate.
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::{YieldCurve, FlatCurve};
///
/// let curve = FlatCurve::new(0.03_f64);
/// assert_eq!(curve.rate(), 0.03);
/// assert!((curve.discount_factor(2.0).unwrap() - (-0.06_f64).exp()).abs() < 1e-14);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatCurve<T: Float> {
    rate: T,
}

impl<T: Float> FlatCurve<T> {
    /// Construct a flat curve with the given constant rate.
    #[inline]
    pub fn new(rate: T) -> Self {
        Self { rate }
    }

    /// Return the constant rate.
    #[inline]
    pub fn rate(&self) -> T {
        self.rate
    }
}

impl<T: Float> YieldCurve<T> for FlatCurve<T> {
    fn discount_factor(&self, t: T) -> Result<T, MarketDataError> {
        if t < T::zero() {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        Ok((-self.rate * t).exp())
    }
}

/// Zero-rate curve on pillar tenors.
///
/// Zero rates are interpolated linearly between pillars and held flat
/// outside them; `D(t) = exp(−r(t)·t)`.
#[derive(Debug, Clone)]
pub struct ZeroRateCurve<T: Float> {
    rates: LinearInterpolator<T>,
}

impl<T: Float> ZeroRateCurve<T> {
    /// Construct from pillar tenors (years) and zero rates.
    ///
    /// # Errors
    ///
    /// * `MarketDataError::InsufficientData` - Fewer than 2 pillars
    /// * `MarketDataError::InvalidMaturity` - Non-positive tenor
    /// * `MarketDataError::Interpolation` - Unsorted or duplicated tenors
    pub fn new(tenors: &[T], rates: &[T]) -> Result<Self, MarketDataError> {
        if tenors.len() < 2 || tenors.len() != rates.len() {
            return Err(MarketDataError::InsufficientData {
                got: tenors.len().min(rates.len()),
                need: 2.max(tenors.len()),
            });
        }
        if let Some(&t) = tenors.iter().find(|&&t| t <= T::zero()) {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        Ok(Self {
            rates: LinearInterpolator::new(tenors, rates)?,
        })
    }
}

impl<T: Float> YieldCurve<T> for ZeroRateCurve<T> {
    fn discount_factor(&self, t: T) -> Result<T, MarketDataError> {
        if t < T::zero() {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        let r = self.rates.interpolate_clamped(t);
        Ok((-r * t).exp())
    }

    fn zero_rate(&self, t: T) -> Result<T, MarketDataError> {
        if t <= T::zero() {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        Ok(self.rates.interpolate_clamped(t))
    }
}
