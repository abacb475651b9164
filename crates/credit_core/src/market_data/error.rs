//! Market data error types.
//!
//! This module provides structured error handling for survival, recovery
//! and discount curve construction and lookups.

use crate::types::{DateError, InterpolationError};
use thiserror::Error;

/// Market data operation errors.
///
/// # Variants
///
/// - `InvalidMaturity`: Negative or non-increasing time to maturity
/// - `InvalidHazardRate`: Negative hazard rate
/// - `InvalidRecoveryRate`: Recovery rate outside [0, 1]
/// - `OutOfBounds`: Query outside valid domain
/// - `Interpolation`: Wrapped interpolation error
/// - `InsufficientData`: Not enough data points for construction
/// - `Date`: Wrapped date error
///
/// # Examples
///
/// ```
/// use credit_core::market_data::MarketDataError;
///
/// let err = MarketDataError::InvalidMaturity { t: -1.0 };
/// assert!(format!("{}", err).contains("-1"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Invalid maturity (negative time or unsorted pillars).
    #[error("Invalid maturity: t = {t}")]
    InvalidMaturity {
        /// The invalid maturity value
        t: f64,
    },

    /// Hazard rate is negative.
    #[error("Invalid hazard rate: {rate}")]
    InvalidHazardRate {
        /// The invalid hazard rate
        rate: f64,
    },

    /// Recovery rate is outside [0, 1].
    #[error("Invalid recovery rate: {rate} not in [0, 1]")]
    InvalidRecoveryRate {
        /// The invalid recovery rate
        rate: f64,
    },

    /// Query point outside valid domain.
    #[error("Out of bounds: {x} not in [{min}, {max}]")]
    OutOfBounds {
        /// The query point that was out of bounds
        x: f64,
        /// Minimum valid value
        min: f64,
        /// Maximum valid value
        max: f64,
    },

    /// Interpolation error.
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// Insufficient data for construction.
    #[error("Insufficient data: got {got}, need {need}")]
    InsufficientData {
        /// Number of points provided
        got: usize,
        /// Minimum number of points required
        need: usize,
    },

    /// Date error raised while building a dated curve.
    #[error("Date error: {0}")]
    Date(#[from] DateError),
}
