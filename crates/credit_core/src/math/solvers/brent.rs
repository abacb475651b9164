//! Brent's method root-finding solver.

use super::SolverConfig;
use crate::types::SolverError;

/// Maximum number of outward expansions in [`BrentSolver::find_root_expanding`].
const MAX_EXPANSIONS: usize = 60;

/// Brent's method root finder.
///
/// Combines bisection, secant and inverse quadratic interpolation. Used to
/// invert mixture distribution functions and to solve copula parameters
/// from rank correlations.
///
/// # Example
///
/// ```
/// use credit_core::math::solvers::{BrentSolver, SolverConfig};
///
/// let solver = BrentSolver::new(SolverConfig::default());
/// let root = solver.find_root(|x| x * x - 2.0, 0.0, 2.0).unwrap();
/// assert!((root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BrentSolver {
    config: SolverConfig,
}

impl BrentSolver {
    /// Create a new Brent solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Returns the solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Find a root of `f` in the bracket [a, b].
    ///
    /// # Errors
    ///
    /// * `SolverError::NoBracket` - `f(a)` and `f(b)` have the same sign
    /// * `SolverError::NumericalInstability` - `f` returned NaN
    /// * `SolverError::MaxIterationsExceeded` - Failed to converge
    pub fn find_root<F>(&self, f: F, a: f64, b: f64) -> Result<f64, SolverError>
    where
        F: Fn(f64) -> f64,
    {
        let tol = self.config.tolerance;
        let (mut a, mut b) = (a, b);
        let (mut fa, mut fb) = (f(a), f(b));
        if fa.is_nan() || fb.is_nan() {
            return Err(SolverError::NumericalInstability(format!(
                "objective is NaN on [{}, {}]",
                a, b
            )));
        }
        if fa == 0.0 {
            return Ok(a);
        }
        if fb == 0.0 {
            return Ok(b);
        }
        if fa.signum() == fb.signum() {
            return Err(SolverError::NoBracket { a, b });
        }

        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.config.max_iterations {
            if fb.signum() == fc.signum() {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol1 || fb.abs() < tol {
                return Ok(b);
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q);
                if a == c {
                    p = 2.0 * xm * s;
                    q = 1.0 - s;
                } else {
                    let qa = fa / fc;
                    let r = fb / fc;
                    p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                    q = (qa - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol1 {
                d
            } else {
                tol1.copysign(xm)
            };
            fb = f(b);
            if fb.is_nan() {
                return Err(SolverError::NumericalInstability(format!(
                    "objective is NaN at {}",
                    b
                )));
            }
        }

        Err(SolverError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }

    /// Find a root starting from `[a, b]`, doubling the bracket width
    /// outward until the signs differ.
    ///
    /// # Errors
    ///
    /// `SolverError::NoBracket` if no sign change is found after the
    /// expansion limit, otherwise as [`Self::find_root`].
    pub fn find_root_expanding<F>(&self, f: F, a: f64, b: f64) -> Result<f64, SolverError>
    where
        F: Fn(f64) -> f64,
    {
        let (mut lo, mut hi) = (a.min(b), a.max(b));
        let (mut flo, mut fhi) = (f(lo), f(hi));
        for _ in 0..MAX_EXPANSIONS {
            if flo.signum() != fhi.signum() || flo == 0.0 || fhi == 0.0 {
                return self.find_root(&f, lo, hi);
            }
            let width = (hi - lo).max(1e-8);
            if flo.abs() < fhi.abs() {
                lo -= width;
                flo = f(lo);
            } else {
                hi += width;
                fhi = f(hi);
            }
        }
        Err(SolverError::NoBracket { a: lo, b: hi })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_cubic_root() {
        let solver = BrentSolver::new(SolverConfig::default());
        let f = |x: f64| x * x * x - x - 2.0;
        let root = solver.find_root(f, 1.0, 2.0).unwrap();
        assert!(f(root).abs() < 1e-9);
    }

    #[test]
    fn test_find_root_reversed_bracket() {
        let solver = BrentSolver::default();
        let root = solver.find_root(|x: f64| x.exp() - 2.0, 1.0, 0.0).unwrap();
        assert!((root - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_no_bracket() {
        let solver = BrentSolver::default();
        assert!(matches!(
            solver.find_root(|x| x * x + 1.0, -1.0, 1.0),
            Err(SolverError::NoBracket { .. })
        ));
    }

    #[test]
    fn test_nan_objective() {
        let solver = BrentSolver::default();
        assert!(matches!(
            solver.find_root(|_| f64::NAN, 0.0, 1.0),
            Err(SolverError::NumericalInstability(_))
        ));
    }

    #[test]
    fn test_expanding_bracket() {
        let solver = BrentSolver::new(SolverConfig::high_precision());
        let root = solver
            .find_root_expanding(|x| x - 37.5, -1.0, 1.0)
            .unwrap();
        assert!((root - 37.5).abs() < 1e-10);
    }
}
