//! Copula families for factor default models.
//!
//! This module provides:
//! - [`CopulaFamily`]: Family tag, parsed from text by [`FromStr`]
//! - [`Copula`]: Family plus shape parameters, immutable once built
//! - [`FactorQuadrature`]: Factor nodes and conditional default
//!   probabilities ([`conditional`])

pub mod conditional;

pub use conditional::{
    archimedean_theta, conditional_recovery, Conditioned, FactorNode, FactorQuadrature,
};

use std::fmt;
use std::str::FromStr;

use crate::error::BasketError;

/// Copula family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CopulaFamily {
    /// One- or multi-factor Gaussian.
    Gauss,
    /// Gaussian allowing perfect correlation (unit loadings).
    ExtendedGauss,
    /// Student-t with a common chi-squared mixing variable.
    StudentT,
    /// Independent Student-t factor and idiosyncratic terms.
    DoubleT,
    /// Archimedean, gamma frailty.
    Clayton,
    /// Archimedean, positive stable frailty.
    Gumbel,
    /// Archimedean, logarithmic series frailty.
    Frank,
    /// Normal inverse Gaussian factor and idiosyncratic terms.
    Nig,
    /// Gaussian with a loading that jumps below a factor threshold.
    RandomFactorLoading,
    /// Common Poisson shock.
    Poisson,
}

impl CopulaFamily {
    /// All families.
    pub const ALL: [CopulaFamily; 10] = [
        Self::Gauss,
        Self::ExtendedGauss,
        Self::StudentT,
        Self::DoubleT,
        Self::Clayton,
        Self::Gumbel,
        Self::Frank,
        Self::Nig,
        Self::RandomFactorLoading,
        Self::Poisson,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gauss => "Gauss",
            Self::ExtendedGauss => "ExtendedGauss",
            Self::StudentT => "StudentT",
            Self::DoubleT => "DoubleT",
            Self::Clayton => "Clayton",
            Self::Gumbel => "Gumbel",
            Self::Frank => "Frank",
            Self::Nig => "NIG",
            Self::RandomFactorLoading => "RandomFactorLoading",
            Self::Poisson => "Poisson",
        }
    }

    /// Clayton, Gumbel or Frank.
    #[inline]
    pub fn is_archimedean(&self) -> bool {
        matches!(self, Self::Clayton | Self::Gumbel | Self::Frank)
    }

    /// Families whose factor is standard normal.
    #[inline]
    pub fn is_normal_factor(&self) -> bool {
        matches!(self, Self::Gauss | Self::ExtendedGauss | Self::RandomFactorLoading)
    }

    /// Families with extreme tail dependence (Archimedean and Poisson).
    #[inline]
    pub fn is_extreme_tail(&self) -> bool {
        self.is_archimedean() || matches!(self, Self::Poisson)
    }

    /// Families that can integrate over several factors.
    #[inline]
    pub fn supports_multi_factor(&self) -> bool {
        matches!(self, Self::Gauss | Self::ExtendedGauss)
    }
}

impl FromStr for CopulaFamily {
    type Err = BasketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.to_ascii_lowercase().replace(['_', '-', ' '], "");
        match key.as_str() {
            "gauss" | "gaussian" => Ok(Self::Gauss),
            "extendedgauss" | "extendedgaussian" => Ok(Self::ExtendedGauss),
            "studentt" | "t" => Ok(Self::StudentT),
            "doublet" => Ok(Self::DoubleT),
            "clayton" => Ok(Self::Clayton),
            "gumbel" => Ok(Self::Gumbel),
            "frank" => Ok(Self::Frank),
            "nig" | "normalinversegaussian" => Ok(Self::Nig),
            "randomfactorloading" | "rfl" => Ok(Self::RandomFactorLoading),
            "poisson" => Ok(Self::Poisson),
            _ => Err(BasketError::UnknownCopulaType(s.to_string())),
        }
    }
}

impl fmt::Display for CopulaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Copula family with its shape parameters.
///
/// # Example
///
/// ```
/// use credit_models::copula::{Copula, CopulaFamily};
///
/// let t = Copula::student_t(5.0).unwrap();
/// assert_eq!(t.family(), CopulaFamily::StudentT);
/// assert_eq!(t.dof(), 5.0);
///
/// let g = Copula::gauss().with_recovery_correlation(0.3).unwrap();
/// assert_eq!(g.recovery_correlation(), Some(0.3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Copula {
    family: CopulaFamily,
    dof: f64,
    idio_dof: f64,
    nig_alpha: f64,
    nig_beta: f64,
    rfl_threshold: f64,
    rfl_shift: f64,
    recovery_correlation: Option<f64>,
}

fn check_dof(name: &'static str, nu: f64) -> Result<f64, BasketError> {
    if nu.is_finite() && nu > 2.0 {
        Ok(nu)
    } else {
        Err(BasketError::invalid(name, format!("{nu} must exceed 2")))
    }
}

impl Copula {
    /// Family with default shape parameters.
    pub fn new(family: CopulaFamily) -> Self {
        Self {
            family,
            dof: 4.0,
            idio_dof: 4.0,
            nig_alpha: 1.0,
            nig_beta: 0.0,
            rfl_threshold: -2.0,
            rfl_shift: 0.2,
            recovery_correlation: None,
        }
    }

    /// Gaussian copula.
    pub fn gauss() -> Self {
        Self::new(CopulaFamily::Gauss)
    }

    /// Student-t copula with ν degrees of freedom (ν > 2).
    pub fn student_t(dof: f64) -> Result<Self, BasketError> {
        Ok(Self {
            dof: check_dof("degrees of freedom", dof)?,
            ..Self::new(CopulaFamily::StudentT)
        })
    }

    /// Double-t copula with factor and idiosyncratic degrees of freedom.
    pub fn double_t(factor_dof: f64, idio_dof: f64) -> Result<Self, BasketError> {
        Ok(Self {
            dof: check_dof("factor degrees of freedom", factor_dof)?,
            idio_dof: check_dof("idiosyncratic degrees of freedom", idio_dof)?,
            ..Self::new(CopulaFamily::DoubleT)
        })
    }

    /// NIG copula with tail parameter α > 0 and skew |β| < α.
    pub fn nig(alpha: f64, beta: f64) -> Result<Self, BasketError> {
        if !(alpha > 0.0 && alpha.is_finite()) || beta.abs() >= alpha {
            return Err(BasketError::invalid(
                "nig parameters",
                format!("need alpha > 0 and |beta| < alpha, got ({alpha}, {beta})"),
            ));
        }
        Ok(Self {
            nig_alpha: alpha,
            nig_beta: beta,
            ..Self::new(CopulaFamily::Nig)
        })
    }

    /// Random factor loading: loading βᵢ + `shift` when the factor is at or
    /// below `threshold`, βᵢ above it.
    pub fn random_factor_loading(threshold: f64, shift: f64) -> Result<Self, BasketError> {
        if !threshold.is_finite() || !(0.0..1.0).contains(&shift) {
            return Err(BasketError::invalid(
                "random factor loading",
                format!("threshold {threshold}, shift {shift}"),
            ));
        }
        Ok(Self {
            rfl_threshold: threshold,
            rfl_shift: shift,
            ..Self::new(CopulaFamily::RandomFactorLoading)
        })
    }

    /// Attach a recovery correlation c in [-1, 1].
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

    /// Family tag.
    #[inline]
    pub fn family(&self) -> CopulaFamily {
        self.family
    }

    /// Degrees of freedom (Student-t) or factor degrees of freedom (double-t).
    #[inline]
    pub fn dof(&self) -> f64 {
        self.dof
    }

    /// Idiosyncratic degrees of freedom (double-t).
    #[inline]
    pub fn idio_dof(&self) -> f64 {
        self.idio_dof
    }

    /// NIG (α, β).
    #[inline]
    pub fn nig_params(&self) -> (f64, f64) {
        (self.nig_alpha, self.nig_beta)
    }

    /// Random factor loading (threshold, shift).
    #[inline]
    pub fn rfl_params(&self) -> (f64, f64) {
        (self.rfl_threshold, self.rfl_shift)
    }

    /// Recovery correlation, if any.
    #[inline]
    pub fn recovery_correlation(&self) -> Option<f64> {
        self.recovery_correlation
    }
}

impl Default for Copula {
    fn default() -> Self {
        Self::gauss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_round_trip_names() {
        for family in CopulaFamily::ALL {
            assert_eq!(family.name().parse::<CopulaFamily>().unwrap(), family);
        }
        assert_eq!("double-t".parse::<CopulaFamily>().unwrap(), CopulaFamily::DoubleT);
        assert!(matches!(
            "Vine".parse::<CopulaFamily>(),
            Err(BasketError::UnknownCopulaType(tag)) if tag == "Vine"
        ));
    }

    #[test]
    fn test_family_classes() {
        assert!(CopulaFamily::Clayton.is_extreme_tail());
        assert!(CopulaFamily::Poisson.is_extreme_tail());
        assert!(!CopulaFamily::StudentT.is_extreme_tail());
        assert!(CopulaFamily::Gauss.supports_multi_factor());
        assert!(!CopulaFamily::Nig.supports_multi_factor());
    }

    #[test]
    fn test_parameter_validation() {
        assert!(Copula::student_t(2.0).is_err());
        assert!(Copula::double_t(4.0, f64::NAN).is_err());
        assert!(Copula::nig(1.0, 1.0).is_err());
        assert!(Copula::nig(1.0, -0.5).is_ok());
        assert!(Copula::random_factor_loading(-1.5, 1.2).is_err());
        assert!(Copula::gauss().with_recovery_correlation(1.5).is_err());
    }
}
