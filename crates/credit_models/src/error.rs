//! Error types for basket model construction.
//!
//! Every variant describes a structural problem detected before any
//! numerical work starts. None of them are retried or defaulted away.

use credit_core::market_data::MarketDataError;
use credit_core::types::{DateError, NumericsError, SolverError};
use thiserror::Error;

/// Configuration error for basket engines.
///
/// Raised by configuration builders when a parameter is out of range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Grid size outside (0, 1].
    #[error("Invalid grid size {0}: must be in (0, 1]")]
    InvalidGridSize(f64),

    /// Monte Carlo sample size outside [1, 10_000_000].
    #[error("Invalid sample size {0}: must be in range [1, 10_000_000]")]
    InvalidSampleSize(usize),

    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },
}

/// Errors raised while building or querying a basket model.
///
/// # Examples
/// ```
/// use credit_models::BasketError;
///
/// let err = BasketError::ArgumentShape { what: "principals", expected: 5, actual: 4 };
/// assert!(err.to_string().contains("expected 5"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BasketError {
    /// Array lengths do not line up.
    #[error("Argument shape mismatch for {what}: expected {expected}, got {actual}")]
    ArgumentShape {
        /// Which argument was malformed
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// A survival curve has no calibrator-derived recovery curve.
    #[error("Survival curve '{curve}' has no recovery curve")]
    MissingRecoveryData {
        /// Name of the offending curve
        curve: String,
    },

    /// Correlation argument cannot be interpreted.
    #[error("Invalid correlation input: {0}")]
    InvalidCorrelationInput(String),

    /// Correlation/copula pairing the selected strategy cannot consume.
    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    /// Unrecognised copula family tag.
    #[error("Unknown copula type '{0}'")]
    UnknownCopulaType(String),

    /// Parameter outside its valid range.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Description of the invalid value
        value: String,
    },

    /// No names survived filtering.
    #[error("Pool contains no names")]
    EmptyPool,

    /// Strike scaling requires a discount curve that was not supplied.
    #[error("Discounted strike scaling requires a discount curve")]
    MissingDiscountCurve,

    /// Market data failure.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// Root finding failure.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Numerical helper failure.
    #[error(transparent)]
    Numerics(#[from] NumericsError),

    /// Date arithmetic failure.
    #[error(transparent)]
    Date(#[from] DateError),

    /// Engine configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BasketError {
    /// Shorthand for [`BasketError::InvalidParameter`].
    pub(crate) fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = BasketError::MissingRecoveryData {
            curve: "ACME".to_string(),
        };
        assert!(err.to_string().contains("ACME"));

        let err = BasketError::UnknownCopulaType("Banana".to_string());
        assert_eq!(err.to_string(), "Unknown copula type 'Banana'");

        let err: BasketError = ConfigError::InvalidSampleSize(0).into();
        assert!(err.to_string().contains("sample size 0"));
    }

    #[test]
    fn test_from_market_data() {
        let err: BasketError = MarketDataError::InvalidHazardRate { rate: -1.0 }.into();
        assert!(matches!(err, BasketError::MarketData(_)));
    }
}
