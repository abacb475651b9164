//! Base correlation curves.
//!
//! A [`BaseCorrelation`] maps a detachment strike to the correlation of an
//! equity tranche `[0, k]`. Strikes are rescaled according to a
//! [`StrikeMethod`] before lookup; the scaling itself needs the pool model
//! and is performed by the tranche mapper.

use std::fmt;
use std::str::FromStr;

use credit_core::math::interpolators::LinearInterpolator;

use crate::error::BasketError;

/// How tranche strikes are normalised before the correlation lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StrikeMethod {
    /// Strike used as given.
    #[default]
    Unscaled,
    /// Strike divided by pool expected loss at tranche maturity.
    ExpectedLoss,
    /// Strike divided by discounted pool expected loss to tranche maturity.
    DiscountedExpectedLoss,
}

impl StrikeMethod {
    /// Whether the method needs a discount curve.
    #[inline]
    pub fn needs_discount_curve(&self) -> bool {
        matches!(self, Self::DiscountedExpectedLoss)
    }
}

impl FromStr for StrikeMethod {
    type Err = BasketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "unscaled" => Ok(Self::Unscaled),
            "expectedloss" | "el" => Ok(Self::ExpectedLoss),
            "discountedexpectedloss" | "discountedel" | "pv" => Ok(Self::DiscountedExpectedLoss),
            _ => Err(BasketError::invalid("strike method", s)),
        }
    }
}

impl fmt::Display for StrikeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unscaled => "Unscaled",
            Self::ExpectedLoss => "ExpectedLoss",
            Self::DiscountedExpectedLoss => "DiscountedExpectedLoss",
        };
        f.write_str(s)
    }
}

/// Strike-indexed correlation curve.
///
/// Correlations are interpolated linearly in strike and extended flat
/// outside the quoted range.
///
/// # Example
///
/// ```
/// use credit_models::correlation::{BaseCorrelation, StrikeMethod};
///
/// let strikes = vec![0.03, 0.07, 0.10];
/// let bc = BaseCorrelation::new(strikes, vec![0.2, 0.3, 0.4], StrikeMethod::Unscaled).unwrap();
/// assert!((bc.correlation_at(0.05) - 0.25).abs() < 1e-12);
/// assert_eq!(bc.correlation_at(0.5), 0.4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BaseCorrelation {
    strikes: Vec<f64>,
    correlations: Vec<f64>,
    method: StrikeMethod,
}

impl BaseCorrelation {
    /// Build a curve from quoted strikes and correlations.
    ///
    /// # Errors
    ///
    /// * `ArgumentShape` - Lengths differ or no quotes
    /// * `InvalidParameter` - Strikes not strictly increasing and positive,
    ///   or correlations outside [0, 1]
    pub fn new(
        strikes: Vec<f64>,
        correlations: Vec<f64>,
        method: StrikeMethod,
    ) -> Result<Self, BasketError> {
        if strikes.is_empty() || strikes.len() != correlations.len() {
            return Err(BasketError::ArgumentShape {
                what: "base correlation quotes",
                expected: strikes.len().max(1),
                actual: correlations.len(),
            });
        }
        if strikes[0] <= 0.0 || strikes.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BasketError::invalid(
                "base correlation strikes",
                "must be positive and strictly increasing",
            ));
        }
        check_correlations(&correlations)?;
        Ok(Self {
            strikes,
            correlations,
            method,
        })
    }

    /// Quoted strikes.
    #[inline]
    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    /// Quoted correlations.
    #[inline]
    pub fn correlations(&self) -> &[f64] {
        &self.correlations
    }

    /// Strike scaling method.
    #[inline]
    pub fn method(&self) -> StrikeMethod {
        self.method
    }

    /// Replace the quoted correlations, keeping the strikes.
    ///
    /// # Errors
    ///
    /// As [`BaseCorrelation::new`].
    pub fn set_correlations(&mut self, correlations: Vec<f64>) -> Result<(), BasketError> {
        if correlations.len() != self.strikes.len() {
            return Err(BasketError::ArgumentShape {
                what: "base correlation quotes",
                expected: self.strikes.len(),
                actual: correlations.len(),
            });
        }
        check_correlations(&correlations)?;
        self.correlations = correlations;
        Ok(())
    }

    /// Correlation at an already-scaled strike.
    pub fn correlation_at(&self, strike: f64) -> f64 {
        if self.strikes.len() == 1 {
            return self.correlations[0];
        }
        match LinearInterpolator::new(&self.strikes, &self.correlations) {
            Ok(interp) => interp.interpolate_clamped(strike),
            Err(_) => self.correlations[0],
        }
    }
}

fn check_correlations(correlations: &[f64]) -> Result<(), BasketError> {
    match correlations.iter().find(|c| !(0.0..=1.0).contains(*c)) {
        Some(bad) => Err(BasketError::invalid(
            "base correlation",
            format!("{bad} outside [0, 1]"),
        )),
        None => Ok(()),
    }
}
