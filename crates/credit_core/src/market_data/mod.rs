//! Market data structures for credit basket pricing.
//!
//! # Components
//!
//! - [`curves`]: Survival, recovery and discount curves
//! - [`error`]: Market data error types (MarketDataError)
//!
//! # Example
//!
//! ```
//! use credit_core::market_data::curves::{DiscountCurve, SurvivalCurve};
//! use credit_core::types::Date;
//!
//! let as_of = Date::from_ymd(2024, 1, 1).unwrap();
//! let discount = DiscountCurve::flat(as_of, 0.03);
//! let df = discount.discount_factor(Date::from_ymd(2025, 1, 1).unwrap()).unwrap();
//! assert!((df - (-0.03_f64 * 366.0 / 365.0).exp()).abs() < 1e-12);
//!
//! let curve = SurvivalCurve::flat("NAME", as_of, 0.01).unwrap();
//! assert_eq!(curve.survival_probability(as_of).unwrap(), 1.0);
//! ```

pub mod curves;
pub mod error;

pub use curves::{
    CreditCurve, DiscountCurve, FlatCurve, FlatHazardRateCurve, HazardRateCurve, RecoveryCurve,
    SurvivalCalibrator, SurvivalCurve, YieldCurve, ZeroRateCurve,
};
pub use error::MarketDataError;
