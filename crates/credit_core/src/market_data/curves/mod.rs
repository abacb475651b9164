//! Curve abstractions for credit basket calculations.
//!
//! This module provides:
//! - [`YieldCurve`]: Generic trait for discount factor and rate calculations
//! - [`FlatCurve`] / [`ZeroRateCurve`]: Time-indexed yield curves
//! - [`DiscountCurve`]: Dated discount curve used for strike scaling and PV
//! - [`CreditCurve`]: Generic trait for hazard rate and survival probability calculations
//! - [`HazardRateCurve`] / [`FlatHazardRateCurve`]: Hazard term structures
//! - [`SurvivalCurve`]: Dated per-name survival curve with calibrator metadata
//! - [`RecoveryCurve`]: Dated recovery rate term structure

mod credit;
mod discount;
mod flat;
mod recovery;
mod survival;
mod traits;

pub use credit::{CreditCurve, FlatHazardRateCurve, HazardRateCurve};
pub use discount::DiscountCurve;
pub use flat::{FlatCurve, ZeroRateCurve};
pub use recovery::RecoveryCurve;
pub use survival::{SurvivalCalibrator, SurvivalCurve};
pub use traits::YieldCurve;
