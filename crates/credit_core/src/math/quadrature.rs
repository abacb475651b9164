//! Gaussian quadrature rules for factor integration.
//!
//! - [`gauss_hermite`]: nodes and weights for E[f(Z)], Z ~ N(0, 1)
//! - [`gauss_legendre`]: nodes and weights on (0, 1), used in quantile
//!   space for non-normal factors
//!
//! Both rules return weights that sum to one, so a weighted sum is directly
//! an expectation.
//!
//! # Example
//!
//! ```
//! use credit_core::math::quadrature::gauss_hermite;
//!
//! let rule = gauss_hermite(12).unwrap();
//! let second_moment: f64 = rule.iter().map(|(x, w)| w * x * x).sum();
//! assert!((second_moment - 1.0).abs() < 1e-12);
//! ```

use crate::types::NumericsError;
use std::f64::consts::PI;

const NEWTON_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 3e-14;

/// π^(-1/4)
const PI_M4: f64 = 0.751_125_544_464_942_5;

/// Quadrature rule as `(node, weight)` pairs.
pub type QuadratureRule = Vec<(f64, f64)>;

/// Gauss–Hermite rule for the standard normal density.
///
/// Nodes are returned in increasing order; weights sum to one.
///
/// # Errors
///
/// `NumericsError::EmptyQuadrature` when `n == 0`.
pub fn gauss_hermite(n: usize) -> Result<QuadratureRule, NumericsError> {
    if n == 0 {
        return Err(NumericsError::EmptyQuadrature);
    }

    let nf = n as f64;
    let mut x = vec![0.0_f64; n];
    let mut w = vec![0.0_f64; n];
    let mut z = 0.0_f64;

    for i in 0..n.div_ceil(2) {
        z = match i {
            0 => (2.0 * nf + 1.0).sqrt() - 1.855_75 * (2.0 * nf + 1.0).powf(-1.0 / 6.0),
            1 => z - 1.14 * nf.powf(0.426) / z,
            2 => 1.86 * z - 0.86 * x[0],
            3 => 1.91 * z - 0.91 * x[1],
            _ => 2.0 * z - x[i - 2],
        };

        let mut pp = 1.0;
        for _ in 0..NEWTON_ITERATIONS {
            let mut p1 = PI_M4;
            let mut p2 = 0.0;
            for j in 1..=n {
                let jf = j as f64;
                let p3 = p2;
                p2 = p1;
                p1 = z * (2.0 / jf).sqrt() * p2 - ((jf - 1.0) / jf).sqrt() * p3;
            }
            pp = (2.0 * nf).sqrt() * p2;
            let z1 = z;
            z = z1 - p1 / pp;
            if (z - z1).abs() <= NEWTON_TOLERANCE {
                break;
            }
        }

        x[i] = z;
        x[n - 1 - i] = -z;
        w[i] = 2.0 / (pp * pp);
        w[n - 1 - i] = w[i];
    }

    // Physicists' rule for exp(-x²) → standard normal expectation
    let scale = PI.sqrt();
    let mut rule: QuadratureRule = x
        .into_iter()
        .zip(w)
        .map(|(xi, wi)| (xi * std::f64::consts::SQRT_2, wi / scale))
        .collect();
    rule.sort_by(|a, b| a.0.total_cmp(&b.0));
    normalise(&mut rule);
    Ok(rule)
}

fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

/// Gauss–Legendre rule on the open unit interval.
///
/// Nodes are increasing, strictly inside (0, 1); weights sum to one.
///
/// # Errors
///
/// `NumericsError::EmptyQuadrature` when `n == 0`.
pub fn gauss_legendre(n: usize) -> Result<QuadratureRule, NumericsError> {
    if n == 0 {
        return Err(NumericsError::EmptyQuadrature);
    }
    if n == 1 {
        return Ok(vec![(0.5, 1.0)]);
    }

    let nf = n as f64;
    let mut rule = vec![(0.0, 0.0); n];
    for i in 0..n.div_ceil(2) {
        let mut z = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        for _ in 0..NEWTON_ITERATIONS {
            let (p, dp) = legendre_with_derivative(n, z);
            let dz = p / dp;
            z -= dz;
            if dz.abs() < NEWTON_TOLERANCE {
                break;
            }
        }
        let (_, dp) = legendre_with_derivative(n, z);
        let weight = 1.0 / ((1.0 - z * z) * dp * dp);
        rule[i] = (0.5 * (1.0 - z), weight);
        rule[n - 1 - i] = (0.5 * (1.0 + z), weight);
    }
    normalise(&mut rule);
    Ok(rule)
}

/// Integrate `f` over `[a, b]` with an `n`-point Gauss–Legendre rule.
pub fn integrate<F>(f: F, a: f64, b: f64, n: usize) -> Result<f64, NumericsError>
where
    F: Fn(f64) -> f64,
{
    let rule = gauss_legendre(n)?;
    let width = b - a;
    Ok(width * rule.iter().map(|&(u, w)| w * f(a + width * u)).sum::<f64>())
}

fn normalise(rule: &mut QuadratureRule) {
    let total: f64 = rule.iter().map(|(_, w)| w).sum();
    if total > 0.0 {
        for (_, w) in rule.iter_mut() {
            *w /= total;
        }
    }
}
