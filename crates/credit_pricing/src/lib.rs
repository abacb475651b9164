//! # credit_pricing: Loss Distributions and Tranche Pricing
//!
//! ## Layer 3 (Pricing) Role
//!
//! credit_pricing turns a pool, a copula and a correlation into pool loss
//! distributions on a time grid and slices them into tranches:
//! - Discretised loss and default-count distributions (`distribution`)
//! - Basket engines with a cached state machine: uniform, large pool,
//!   semi-analytic, Monte Carlo and forward loss (`engine`)
//! - Tranche loss mapping with base-correlation strikes and nth-to-default
//!   views (`tranche`)
//! - CDO-squared aggregation over child CDOs (`cdo_squared`)
//! - Strategy selection and tranche wiring (`factory`)
//! - Seeded chunked random number generation (`rng`)
//!
//! ## Dependencies
//!
//! - credit_core (L1): curves, dates, numerics
//! - credit_models (L2): pool, correlation, copula, sizing, tranche slices
//! - rand / rand_distr: path simulation
//! - rayon: Monte Carlo chunks on a thread pool (optional)
//! - tracing: strategy and cache diagnostics
//!
//! ## Usage Examples
//!
//! ```rust
//! use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
//! use credit_core::types::Date;
//! use credit_models::copula::Copula;
//! use credit_models::correlation::CorrelationInput;
//! use credit_models::tranche::TrancheSlice;
//! use credit_pricing::factory::BasketPricerFactory;
//!
//! let as_of = Date::from_ymd(2024, 3, 20).unwrap();
//! let maturity = Date::from_ymd(2029, 3, 20).unwrap();
//! let curves: Vec<_> = (0..5)
//!     .map(|i| {
//!         Some(
//!             SurvivalCurve::flat(format!("N{i}"), as_of, 0.02)
//!                 .unwrap()
//!                 .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap()),
//!         )
//!     })
//!     .collect();
//!
//! let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Scalar(0.3));
//! let slices = [TrancheSlice::new(0.03, 0.07).unwrap()];
//! let mut tranches = factory
//!     .build_tranches(&curves, Some(&[1.0e7]), &slices, maturity)
//!     .unwrap();
//!
//! let el = tranches[0].expected_loss(maturity).unwrap();
//! assert!(el > 0.0 && el <= 1.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): Run Monte Carlo chunks on rayon; results are
//!   identical to the sequential run
//! - `serde` (default): Serialisation of configuration types

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod cdo_squared;
pub mod distribution;
pub mod engine;
pub mod factory;
pub mod rng;
pub mod tranche;
