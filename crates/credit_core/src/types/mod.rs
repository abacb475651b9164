//! Time and error types.
//!
//! This module provides:
//! - `time`: `Date`, `DayCountConvention`, `Tenor` and `TimeUnit`
//! - `error`: Structured error types for date, interpolation, solver and numerics operations
//!
//! # Re-exports
//!
//! - [`Date`], [`DayCountConvention`], [`Tenor`], [`TimeUnit`] from `time`
//! - [`DateError`], [`InterpolationError`], [`NumericsError`], [`SolverError`] from `error`

pub mod error;
pub mod time;

pub use error::{DateError, InterpolationError, NumericsError, SolverError};
pub use time::{Date, DayCountConvention, Tenor, TimeUnit};
