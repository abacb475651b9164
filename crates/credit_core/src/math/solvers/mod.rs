//! Root-finding solvers.
//!
//! - [`BrentSolver`]: Robust bracketing method without derivative requirement
//! - [`SolverConfig`]: Tolerance (default 1e-10) and iteration cap (default 100)

mod brent;
mod config;

pub use brent::BrentSolver;
pub use config::SolverConfig;
