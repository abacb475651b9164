//! # credit_core: Foundations for Credit Basket Pricing
//!
//! ## Layer 1 (Foundation) Role
//!
//! credit_core is the bottom layer of the workspace, providing:
//! - Time types: `Date`, `DayCountConvention`, `Tenor` (`types::time`)
//! - Error types: `DateError`, `InterpolationError`, `SolverError`,
//!   `NumericsError` (`types::error`)
//! - Survival, recovery and discount curves (`market_data::curves`)
//! - Numerical building blocks: quadrature, Brent root finding, distributions,
//!   linear interpolation, Cholesky factorisation (`math`)
//!
//! ## Minimal Dependencies
//!
//! Layer 1 has no dependencies on other workspace crates:
//! - num-traits: Generic curve arithmetic
//! - statrs: Special functions and distribution quantiles
//! - chrono: Date arithmetic
//! - serde: Serialisation support (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
//! use credit_core::math::distributions::{norm_cdf, norm_inv};
//! use credit_core::types::{Date, DayCountConvention, Tenor};
//!
//! let start = Date::from_ymd(2024, 3, 20).unwrap();
//! let end = start.add_tenor("5Y".parse::<Tenor>().unwrap()).unwrap();
//! let yf = DayCountConvention::ActualActual365.year_fraction_dates(start, end);
//! assert!(yf > 4.99 && yf < 5.01);
//!
//! let curve = SurvivalCurve::flat("ACME", start, 0.02)
//!     .unwrap()
//!     .with_recovery(RecoveryCurve::flat(start, 0.4).unwrap());
//! let p = curve.default_probability(end).unwrap();
//! assert!((norm_cdf(norm_inv(p)) - p).abs() < 1e-12);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialisation for `Date`, `DayCountConvention` and `Tenor`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod market_data;
pub mod math;
pub mod types;
