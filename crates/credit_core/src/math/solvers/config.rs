//! Solver configuration types.

/// Root-finding configuration.
///
/// # Example
///
/// ```
/// use credit_core::math::solvers::SolverConfig;
///
/// let config = SolverConfig::default();
/// assert_eq!(config.max_iterations, 100);
/// assert!(SolverConfig::high_precision().tolerance < config.tolerance);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Absolute tolerance on both the abscissa and the residual
    pub tolerance: f64,
    /// Iteration cap before `MaxIterationsExceeded`
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

impl SolverConfig {
    /// Creates a configuration; non-positive inputs fall back to the defaults.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        let defaults = Self::default();
        Self {
            tolerance: if tolerance > 0.0 {
                tolerance
            } else {
                defaults.tolerance
            },
            max_iterations: if max_iterations > 0 {
                max_iterations
            } else {
                defaults.max_iterations
            },
        }
    }

    /// Tight tolerance used for latent-variable thresholds.
    pub fn high_precision() -> Self {
        Self {
            tolerance: 1e-14,
            max_iterations: 500,
        }
    }
}
