//! # credit_models (L2: Business Logic)
//!
//! Pools, dependence models and numerical defaults for credit baskets.
//!
//! This crate provides:
//! - Reference pool filtering and principal scaling ([`pool`])
//! - Correlation models, base correlation, the shared correlation handle
//!   and the input resolution table ([`correlation`])
//! - Copula families and factor-node conditioning ([`copula`])
//! - Quadrature point and sample-size tables ([`sizing`])
//! - Tranche slices ([`tranche`]) and pricing time grids ([`schedule`])
//! - The basket error taxonomy ([`error`])
//!
//! ## Design Principles
//!
//! - **Tagged unions** for correlation and copula variants, resolved by
//!   explicit pattern matching
//! - **Validation at construction**: shape and data errors surface before
//!   any numerical work
//! - **Named constants** for every numerical default so tests can pin them
//!
//! ## Usage Examples
//!
//! ```rust
//! use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
//! use credit_core::types::Date;
//! use credit_models::copula::{Copula, FactorQuadrature};
//! use credit_models::correlation::{resolve, CorrelationInput, EngineTarget};
//! use credit_models::pool::Pool;
//! use credit_models::sizing;
//!
//! let as_of = Date::from_ymd(2024, 3, 20).unwrap();
//! let curves: Vec<_> = ["A", "B", "C"]
//!     .iter()
//!     .map(|n| {
//!         Some(
//!             SurvivalCurve::flat(*n, as_of, 0.02)
//!                 .unwrap()
//!                 .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap()),
//!         )
//!     })
//!     .collect();
//! let pool = Pool::from_curves(&curves, None).unwrap();
//!
//! let input = CorrelationInput::Scalar(0.3);
//! let resolution = resolve(&input, &pool.name_ids(), EngineTarget::SemiAnalytic).unwrap();
//! assert!(!resolution.is_deferred());
//!
//! let copula = Copula::gauss();
//! let points = sizing::points(copula.family(), pool.count());
//! let quad = FactorQuadrature::new(&copula, points, 1, 0.3).unwrap();
//! assert_eq!(quad.nodes().len(), 25);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod copula;
pub mod correlation;
pub mod error;
pub mod pool;
pub mod schedule;
pub mod sizing;
pub mod tranche;

pub use error::{BasketError, ConfigError};
pub use pool::{Name, Pool};
