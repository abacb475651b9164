//! Numerical building blocks.
//!
//! - [`interpolators`]: Linear interpolation
//! - [`solvers`]: Brent root finding
//! - [`quadrature`]: Gauss–Hermite and Gauss–Legendre rules
//! - [`distributions`]: Normal, Student-t, chi-squared and gamma helpers
//! - [`linalg`]: Cholesky factorisation

pub mod distributions;
pub mod interpolators;
pub mod linalg;
pub mod quadrature;
pub mod solvers;
