//! Hazard rate curve abstractions for default risk calculations.
//!
//! This module provides:
//! - [`CreditCurve`]: Generic trait for hazard rate and survival probability calculations
//! - [`HazardRateCurve`]: Piecewise-constant hazard rate curve
//! - [`FlatHazardRateCurve`]: Constant hazard rate curve

use crate::market_data::error::MarketDataError;
use num_traits::Float;

/// Generic credit curve trait for hazard rate and survival probability calculations.
///
/// Times are year fractions from the curve's valuation date.
///
/// # Invariants
///
/// - λ(t) ≥ 0 for all t ≥ 0
/// - P(τ > 0) = 1
/// - P(τ > t) is non-increasing in t
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::{CreditCurve, HazardRateCurve};
///
/// let curve = HazardRateCurve::new(&[1.0_f64, 3.0, 5.0], &[0.01, 0.012, 0.015]).unwrap();
/// let surv = curve.survival_probability(1.0).unwrap();
/// assert!((surv - (-0.01_f64).exp()).abs() < 1e-12);
/// ```
pub trait CreditCurve<T: Float> {
    /// Return the instantaneous hazard rate at time `t`.
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidMaturity` if `t < 0`.
    fn hazard_rate(&self, t: T) -> Result<T, MarketDataError>;

    /// Return the survival probability P(τ > t) = exp(-∫₀ᵗ λ(s)ds).
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidMaturity` if `t < 0`.
    fn survival_probability(&self, t: T) -> Result<T, MarketDataError>;

    /// Return the default probability P(τ ≤ t).
    fn default_probability(&self, t: T) -> Result<T, MarketDataError> {
        Ok(T::one() - self.survival_probability(t)?)
    }

    /// Return the forward survival probability P(τ > t2 | τ > t1).
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidMaturity` if `t2 < t1`.
    fn forward_survival_probability(&self, t1: T, t2: T) -> Result<T, MarketDataError> {
        if t2 < t1 {
            return Err(MarketDataError::InvalidMaturity {
                t: (t2 - t1).to_f64().unwrap_or(0.0),
            });
        }
        let s1 = self.survival_probability(t1)?;
        let s2 = self.survival_probability(t2)?;
        if s1 <= T::zero() {
            return Ok(T::zero());
        }
        Ok(s2 / s1)
    }
}

fn check_time<T: Float>(t: T) -> Result<(), MarketDataError> {
    if t < T::zero() {
        return Err(MarketDataError::InvalidMaturity {
            t: t.to_f64().unwrap_or(0.0),
        });
    }
    Ok(())
}

/// Piecewise-constant hazard rate curve.
///
/// Pillar `i` carries the hazard rate that applies on `(t_{i-1}, t_i]`
/// (with `t_{-1} = 0`); the last rate is extended flat beyond the final
/// pillar. This is the usual shape produced by a CDS bootstrap.
///
/// ```text
/// Λ(t) = Σ λᵢ · (min(t, tᵢ) − tᵢ₋₁)⁺
/// P(τ > t) = exp(−Λ(t))
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HazardRateCurve<T: Float> {
    tenors: Vec<T>,
    hazard_rates: Vec<T>,
}

impl<T: Float> HazardRateCurve<T> {
    /// Construct a hazard rate curve from pillar points.
    ///
    /// # Arguments
    ///
    /// * `tenors` - Pillar times in years, strictly increasing and positive
    /// * `hazard_rates` - Hazard rate for the period ending at each pillar
    ///
    /// # Errors
    ///
    /// * `MarketDataError::InsufficientData` - No pillars, or length mismatch
    /// * `MarketDataError::InvalidMaturity` - Non-positive or unsorted tenor
    /// * `MarketDataError::InvalidHazardRate` - Negative hazard rate
    pub fn new(tenors: &[T], hazard_rates: &[T]) -> Result<Self, MarketDataError> {
        if tenors.is_empty() {
            return Err(MarketDataError::InsufficientData { got: 0, need: 1 });
        }
        if tenors.len() != hazard_rates.len() {
            return Err(MarketDataError::InsufficientData {
                got: hazard_rates.len(),
                need: tenors.len(),
            });
        }

        for (i, &t) in tenors.iter().enumerate() {
            if t <= T::zero() || (i > 0 && t <= tenors[i - 1]) {
                return Err(MarketDataError::InvalidMaturity {
                    t: t.to_f64().unwrap_or(0.0),
                });
            }
        }

        if let Some(&h) = hazard_rates.iter().find(|&&h| h < T::zero()) {
            return Err(MarketDataError::InvalidHazardRate {
                rate: h.to_f64().unwrap_or(0.0),
            });
        }

        Ok(Self {
            tenors: tenors.to_vec(),
            hazard_rates: hazard_rates.to_vec(),
        })
    }

    /// Return the pillar times.
    #[inline]
    pub fn tenors(&self) -> &[T] {
        &self.tenors
    }

    /// Return the pillar hazard rates.
    #[inline]
    pub fn hazard_rates(&self) -> &[T] {
        &self.hazard_rates
    }

    /// Integrated hazard Λ(t).
    fn integrated_hazard(&self, t: T) -> T {
        let mut integral = T::zero();
        let mut prev = T::zero();
        for (&tenor, &h) in self.tenors.iter().zip(self.hazard_rates.iter()) {
            if t <= prev {
                return integral;
            }
            let end = if t < tenor { t } else { tenor };
            integral = integral + h * (end - prev);
            prev = tenor;
        }
        if t > prev {
            let last = self.hazard_rates[self.hazard_rates.len() - 1];
            integral = integral + last * (t - prev);
        }
        integral
    }
}

impl<T: Float> CreditCurve<T> for HazardRateCurve<T> {
    fn hazard_rate(&self, t: T) -> Result<T, MarketDataError> {
        check_time(t)?;
        let idx = self.tenors.partition_point(|&tenor| tenor < t);
        let idx = idx.min(self.hazard_rates.len() - 1);
        Ok(self.hazard_rates[idx])
    }

    fn survival_probability(&self, t: T) -> Result<T, MarketDataError> {
        check_time(t)?;
        Ok((-self.integrated_hazard(t)).exp())
    }
}

/// A flat (constant) hazard rate curve.
///
/// ```text
/// P(τ > t) = exp(−λ t)
/// ```
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::{CreditCurve, FlatHazardRateCurve};
///
/// let curve = FlatHazardRateCurve::new(0.02_f64);
/// let surv = curve.survival_probability(5.0).unwrap();
/// assert!((surv - (-0.1_f64).exp()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatHazardRateCurve<T: Float> {
    hazard_rate: T,
}

impl<T: Float> FlatHazardRateCurve<T> {
    /// Construct a flat hazard rate curve.
    #[inline]
    pub fn new(hazard_rate: T) -> Self {
        Self { hazard_rate }
    }

    /// Return the constant hazard rate.
    #[inline]
    pub fn rate(&self) -> T {
        self.hazard_rate
    }
}

impl<T: Float> CreditCurve<T> for FlatHazardRateCurve<T> {
    fn hazard_rate(&self, t: T) -> Result<T, MarketDataError> {
        check_time(t)?;
        Ok(self.hazard_rate)
    }

    fn survival_probability(&self, t: T) -> Result<T, MarketDataError> {
        check_time(t)?;
        Ok((-self.hazard_rate * t).exp())
    }
}
