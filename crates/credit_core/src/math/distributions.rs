//! Probability distribution helpers for latent-variable copulas.
//!
//! The standard normal functions are expressed through `statrs`'s
//! complementary error function so that both tails keep full relative
//! precision. Student-t, chi-squared and gamma quantiles are thin wrappers
//! over the corresponding `statrs` distributions.

use crate::types::NumericsError;
use statrs::distribution::{ChiSquared, ContinuousCDF, Gamma, StudentsT};
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// 1/√(2π)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density φ(x).
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal distribution function Φ(x).
///
/// # Example
///
/// ```
/// use credit_core::math::distributions::{norm_cdf, norm_inv};
///
/// assert!((norm_cdf(0.0) - 0.5).abs() < 1e-15);
/// assert!((norm_cdf(norm_inv(0.025)) - 0.025).abs() < 1e-14);
/// ```
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    if x == f64::NEG_INFINITY {
        return 0.0;
    }
    if x == f64::INFINITY {
        return 1.0;
    }
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal quantile Φ⁻¹(p); `p <= 0` maps to −∞ and `p >= 1` to +∞.
#[inline]
pub fn norm_inv(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Standard Student-t distribution with `nu` degrees of freedom.
#[derive(Debug, Clone)]
pub struct StudentT {
    nu: f64,
    dist: StudentsT,
}

impl StudentT {
    /// Creates the distribution.
    ///
    /// # Errors
    ///
    /// `NumericsError::InvalidParameter` unless `nu > 0`.
    pub fn new(nu: f64) -> Result<Self, NumericsError> {
        if nu.is_nan() || nu <= 0.0 {
            return Err(NumericsError::InvalidParameter { name: "nu", value: nu });
        }
        let dist = StudentsT::new(0.0, 1.0, nu)
            .map_err(|_| NumericsError::InvalidParameter { name: "nu", value: nu })?;
        Ok(Self { nu, dist })
    }

    /// Degrees of freedom.
    #[inline]
    pub fn nu(&self) -> f64 {
        self.nu
    }

    /// Distribution function.
    #[inline]
    pub fn cdf(&self, x: f64) -> f64 {
        if x.is_infinite() {
            return if x > 0.0 { 1.0 } else { 0.0 };
        }
        self.dist.cdf(x)
    }

    /// Quantile function with infinite tails outside (0, 1).
    #[inline]
    pub fn inverse_cdf(&self, p: f64) -> f64 {
        if p <= 0.0 {
            return f64::NEG_INFINITY;
        }
        if p >= 1.0 {
            return f64::INFINITY;
        }
        self.dist.inverse_cdf(p)
    }

    /// Scale that gives the t variable unit variance, `√((ν−2)/ν)`.
    ///
    /// Returns 1 when the variance is infinite (`ν <= 2`).
    #[inline]
    pub fn unit_variance_scale(&self) -> f64 {
        if self.nu > 2.0 {
            ((self.nu - 2.0) / self.nu).sqrt()
        } else {
            1.0
        }
    }
}

/// Chi-squared quantile with `nu` degrees of freedom.
///
/// # Errors
///
/// `NumericsError::InvalidParameter` unless `nu > 0` and `0 < p < 1`.
pub fn chi_squared_quantile(nu: f64, p: f64) -> Result<f64, NumericsError> {
    check_probability(p)?;
    let dist = ChiSquared::new(nu)
        .map_err(|_| NumericsError::InvalidParameter { name: "nu", value: nu })?;
    Ok(dist.inverse_cdf(p))
}

/// Quantile of the Gamma(shape, rate = 1) distribution.
///
/// # Errors
///
/// `NumericsError::InvalidParameter` unless `shape > 0` and `0 < p < 1`.
pub fn gamma_quantile(shape: f64, p: f64) -> Result<f64, NumericsError> {
    check_probability(p)?;
    let dist = Gamma::new(shape, 1.0).map_err(|_| NumericsError::InvalidParameter {
        name: "shape",
        value: shape,
    })?;
    Ok(dist.inverse_cdf(p))
}

fn check_probability(p: f64) -> Result<(), NumericsError> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(NumericsError::InvalidParameter {
            name: "probability",
            value: p,
        })
    }
}
