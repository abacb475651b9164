//! Tranche slices of pool loss.

use credit_core::types::time::Date;

use crate::error::BasketError;

/// An `[attach, detach]` slice of pool loss.
///
/// Losses eat the slice from the bottom; amortization (recovered and
/// prepaid principal) reduces it from the top.
///
/// # Example
///
/// ```
/// use credit_models::tranche::TrancheSlice;
///
/// let mezz = TrancheSlice::new(0.03, 0.07).unwrap().amortizing(true);
/// assert!((mezz.width() - 0.04).abs() < 1e-15);
/// assert!((mezz.minimum_amortization_level() - 0.93).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrancheSlice {
    attach: f64,
    detach: f64,
    maturity: Option<Date>,
    amortizes: bool,
    recovery_correlation: Option<f64>,
}

impl TrancheSlice {
    /// Slice with `0 ≤ attach < detach ≤ 1`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when the bounds are out of order or outside [0, 1].
    pub fn new(attach: f64, detach: f64) -> Result<Self, BasketError> {
        if !(0.0..1.0).contains(&attach) || !(attach < detach && detach <= 1.0) {
            return Err(BasketError::invalid(
                "tranche bounds",
                format!("need 0 <= attach < detach <= 1, got [{attach}, {detach}]"),
            ));
        }
        Ok(Self {
            attach,
            detach,
            maturity: None,
            amortizes: false,
            recovery_correlation: None,
        })
    }

    /// Tranche-specific maturity.
    pub fn with_maturity(mut self, maturity: Date) -> Self {
        self.maturity = Some(maturity);
        self
    }

    /// Whether the tranche amortizes on principal paydown.
    pub fn amortizing(mut self, amortizes: bool) -> Self {
        self.amortizes = amortizes;
        self
    }

    /// Override the copula recovery correlation for this tranche.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` outside [-1, 1].
    pub fn with_recovery_correlation(mut self, c: f64) -> Result<Self, BasketError> {
        if !(-1.0..=1.0).contains(&c) {
            return Err(BasketError::invalid(
                "recovery correlation",
                format!("{c} outside [-1, 1]"),
            ));
        }
        self.recovery_correlation = Some(c);
        Ok(self)
    }

    /// Attachment level.
    #[inline]
    pub fn attach(&self) -> f64 {
        self.attach
    }

    /// Detachment level.
    #[inline]
    pub fn detach(&self) -> f64 {
        self.detach
    }

    /// `detach − attach`.
    #[inline]
    pub fn width(&self) -> f64 {
        self.detach - self.attach
    }

    /// Tranche maturity, if it differs from the pool's.
    #[inline]
    pub fn maturity(&self) -> Option<Date> {
        self.maturity
    }

    /// Amortizes on principal paydown.
    #[inline]
    pub fn amortizes(&self) -> bool {
        self.amortizes
    }

    /// Recovery correlation override.
    #[inline]
    pub fn recovery_correlation(&self) -> Option<f64> {
        self.recovery_correlation
    }

    /// Pool amortization fraction above which this tranche is affected.
    ///
    /// `1 − detach` for amortizing tranches; 1 otherwise, which no pool
    /// amortization exceeds.
    pub fn minimum_amortization_level(&self) -> f64 {
        if self.amortizes {
            1.0 - self.detach
        } else {
            1.0
        }
    }
}

/// Smallest minimum amortization level of a batch (1 for an empty batch).
pub fn minimum_amortization_level(slices: &[TrancheSlice]) -> f64 {
    slices
        .iter()
        .map(TrancheSlice::minimum_amortization_level)
        .fold(1.0, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_validation() {
        assert!(TrancheSlice::new(0.0, 0.03).is_ok());
        assert!(TrancheSlice::new(0.0, 1.0).is_ok());
        assert!(TrancheSlice::new(0.07, 0.03).is_err());
        assert!(TrancheSlice::new(0.03, 0.03).is_err());
        assert!(TrancheSlice::new(-0.01, 0.03).is_err());
        assert!(TrancheSlice::new(0.5, 1.2).is_err());
        assert!(TrancheSlice::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_amortization_levels() {
        let senior = TrancheSlice::new(0.15, 0.30).unwrap().amortizing(true);
        let equity = TrancheSlice::new(0.0, 0.03).unwrap();
        assert_relative_eq!(senior.minimum_amortization_level(), 0.70);
        assert_eq!(equity.minimum_amortization_level(), 1.0);
        assert_relative_eq!(minimum_amortization_level(&[equity.clone(), senior]), 0.70);
        assert_eq!(minimum_amortization_level(&[equity]), 1.0);
        assert_eq!(minimum_amortization_level(&[]), 1.0);
    }

    #[test]
    fn test_overrides() {
        let maturity = Date::from_ymd(2031, 6, 20).unwrap();
        let t = TrancheSlice::new(0.03, 0.07)
            .unwrap()
            .with_maturity(maturity)
            .with_recovery_correlation(0.2)
            .unwrap();
        assert_eq!(t.maturity(), Some(maturity));
        assert_eq!(t.recovery_correlation(), Some(0.2));
        assert!(t.clone().with_recovery_correlation(-1.5).is_err());
    }
}
