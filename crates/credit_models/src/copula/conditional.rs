//! Factor nodes and conditional default probabilities.
//!
//! Every supported copula is expressed as a mixture: conditional on a
//! systemic state (a factor value, a mixing variable, or both) names
//! default independently. [`FactorQuadrature`] discretises that state into
//! weighted [`FactorNode`]s and maps unconditional default probabilities to
//! per-node conditional ones.
//!
//! | Family               | State                         | Nodes                                 |
//! |----------------------|-------------------------------|---------------------------------------|
//! | Gauss, ExtendedGauss | factors M ~ N(0, I)           | Gauss–Hermite (tensor product)        |
//! | StudentT             | M ~ N(0, 1), S ~ χ²ᵥ          | Hermite × chi-squared quantiles       |
//! | DoubleT              | M ~ unit-variance tᵥ          | Legendre in quantile space            |
//! | NIG                  | M = μ + βV + √V Z, V ~ IG     | Hermite × inverse Gaussian quantiles  |
//! | RandomFactorLoading  | M ~ N(0, 1)                   | Gauss–Hermite                         |
//! | Clayton              | V ~ Gamma(1/θ)                | Legendre in quantile space            |
//! | Gumbel               | V positive stable (index 1/θ) | 2-D Legendre through Kanter's formula |
//! | Frank                | V logarithmic series          | Legendre in quantile space            |
//! | Poisson              | common shock                  | two nodes built per date              |
//!
//! For DoubleT, NIG and RandomFactorLoading the latent-variable marginal
//! has no closed-form quantile; default thresholds are solved with Brent
//! against the same node set, so the node mixture reproduces each
//! unconditional probability to solver tolerance.

use std::f64::consts::PI;

use credit_core::math::distributions::{
    chi_squared_quantile, gamma_quantile, norm_cdf, norm_inv, StudentT,
};
use credit_core::math::quadrature::{gauss_hermite, gauss_legendre, integrate, QuadratureRule};
use credit_core::math::solvers::BrentSolver;
use tracing::debug;

use super::{Copula, CopulaFamily};
use crate::correlation::FactorLoadings;
use crate::error::BasketError;

/// Upper bound on tensor-product nodes for multi-factor Gaussian models.
const MAX_TENSOR_NODES: usize = 4096;

/// Inverse Gaussian mixing nodes for the NIG family.
const NIG_MIX_NODES: usize = 8;

/// Cap on logarithmic-series terms walked when placing Frank nodes.
const MAX_FRANK_TERMS: usize = 100_000;

/// Below this average correlation the Archimedean families are independent.
const INDEPENDENCE_THRESHOLD: f64 = 1e-10;

/// Largest average correlation accepted by the Archimedean mappings.
const MAX_ARCHIMEDEAN_CORRELATION: f64 = 0.99;

/// Smallest idiosyncratic scale; smaller values act as a step function.
const MIN_IDIOSYNCRATIC_SCALE: f64 = 1e-12;

/// One weighted systemic state.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorNode {
    /// Probability weight; weights sum to one.
    pub weight: f64,
    /// Factor values (empty for pure frailty families).
    pub factors: Vec<f64>,
    /// Mixing variable: χ² draw, frailty, or 1 when unused.
    pub mix: f64,
}

/// Conditional default probabilities on a node set.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditioned {
    /// Node weights.
    pub weights: Vec<f64>,
    /// First factor value of each node (0 when the family has none).
    pub factors: Vec<f64>,
    /// `probs[node][name]`.
    pub probs: Vec<Vec<f64>>,
}

impl Conditioned {
    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether there are no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Kernel {
    Gauss,
    StudentT(StudentT),
    DoubleT { idio: StudentT, idio_scale: f64 },
    Nig { inner: QuadratureRule, mu: f64, beta: f64 },
    Rfl { threshold: f64, shift: f64 },
    Clayton { theta: f64 },
    Gumbel { theta: f64 },
    Frank { theta: f64 },
    Poisson { rho: f64 },
    Independent,
}

/// Discretised systemic state for one copula.
///
/// # Example
///
/// ```
/// use credit_models::copula::{Copula, FactorQuadrature};
/// use credit_models::correlation::FactorLoadings;
///
/// let quad = FactorQuadrature::new(&Copula::gauss(), 30, 1, 0.25).unwrap();
/// let cond = quad
///     .condition(&[0.05, 0.10], &FactorLoadings::single(vec![0.5, 0.5]))
///     .unwrap();
///
/// let mean: f64 = cond.weights.iter().zip(&cond.probs).map(|(w, p)| w * p[0]).sum();
/// assert!((mean - 0.05).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct FactorQuadrature {
    family: CopulaFamily,
    n_factors: usize,
    nodes: Vec<FactorNode>,
    kernel: Kernel,
    solver: BrentSolver,
}

impl FactorQuadrature {
    /// Build the node set.
    ///
    /// `points` is the per-dimension node count from the quadrature sizer,
    /// `avg_corr` the average pairwise correlation used by the Archimedean
    /// and Poisson families.
    ///
    /// # Errors
    ///
    /// * `UnsupportedCombination` - Several factors for a family without
    ///   multi-factor support
    /// * `InvalidParameter` - Zero points for an integrating family
    pub fn new(
        copula: &Copula,
        points: usize,
        n_factors: usize,
        avg_corr: f64,
    ) -> Result<Self, BasketError> {
        let family = copula.family();
        let n_factors = n_factors.max(1);
        if n_factors > 1 && !family.supports_multi_factor() {
            return Err(BasketError::UnsupportedCombination(format!(
                "{family} copula supports a single factor, got {n_factors}"
            )));
        }
        if points == 0 && family != CopulaFamily::Poisson {
            return Err(BasketError::invalid("integration points", "must be positive"));
        }
        let rho = avg_corr.clamp(0.0, MAX_ARCHIMEDEAN_CORRELATION);

        let (nodes, kernel) = match family {
            CopulaFamily::Gauss | CopulaFamily::ExtendedGauss => {
                (gauss_nodes(points, n_factors)?, Kernel::Gauss)
            }
            CopulaFamily::StudentT => {
                let t = StudentT::new(copula.dof())?;
                let mut nodes = Vec::with_capacity(points * points);
                for &(m, wm) in &gauss_hermite(points)? {
                    for &(u, wu) in &gauss_legendre(points)? {
                        nodes.push(FactorNode {
                            weight: wm * wu,
                            factors: vec![m],
                            mix: chi_squared_quantile(copula.dof(), u)?,
                        });
                    }
                }
                (nodes, Kernel::StudentT(t))
            }
            CopulaFamily::DoubleT => {
                let factor = StudentT::new(copula.dof())?;
                let idio = StudentT::new(copula.idio_dof())?;
                let scale = factor.unit_variance_scale();
                let nodes = gauss_legendre(points)?
                    .into_iter()
                    .map(|(u, w)| FactorNode {
                        weight: w,
                        factors: vec![scale * factor.inverse_cdf(u)],
                        mix: 1.0,
                    })
                    .collect();
                let idio_scale = idio.unit_variance_scale();
                (nodes, Kernel::DoubleT { idio, idio_scale })
            }
            CopulaFamily::Nig => {
                let (alpha, beta) = copula.nig_params();
                let gamma = (alpha * alpha - beta * beta).sqrt();
                let delta = gamma.powi(3) / (alpha * alpha);
                let mu = -delta * beta / gamma;
                let inner = inverse_gaussian_nodes(delta / gamma, delta * delta)?;
                let mut nodes = Vec::with_capacity(points * inner.len());
                for &(z, wz) in &gauss_hermite(points)? {
                    for &(v, wv) in &inner {
                        nodes.push(FactorNode {
                            weight: wz * wv,
                            factors: vec![mu + beta * v + v.sqrt() * z],
                            mix: 1.0,
                        });
                    }
                }
                (nodes, Kernel::Nig { inner, mu, beta })
            }
            CopulaFamily::RandomFactorLoading => {
                let (threshold, shift) = copula.rfl_params();
                (gauss_nodes(points, 1)?, Kernel::Rfl { threshold, shift })
            }
            CopulaFamily::Clayton if rho > INDEPENDENCE_THRESHOLD => {
                let theta = clayton_theta(rho);
                let nodes = gauss_legendre(points)?
                    .into_iter()
                    .map(|(u, w)| {
                        Ok(FactorNode {
                            weight: w,
                            factors: Vec::new(),
                            mix: gamma_quantile(1.0 / theta, u)?,
                        })
                    })
                    .collect::<Result<Vec<_>, BasketError>>()?;
                (nodes, Kernel::Clayton { theta })
            }
            CopulaFamily::Gumbel if rho > INDEPENDENCE_THRESHOLD => {
                let theta = gumbel_theta(rho);
                (gumbel_nodes(points, 1.0 / theta)?, Kernel::Gumbel { theta })
            }
            CopulaFamily::Frank if rho > INDEPENDENCE_THRESHOLD => {
                let theta = frank_theta(rho)?;
                (frank_nodes(points, theta)?, Kernel::Frank { theta })
            }
            CopulaFamily::Clayton | CopulaFamily::Gumbel | CopulaFamily::Frank => (
                vec![FactorNode {
                    weight: 1.0,
                    factors: Vec::new(),
                    mix: 1.0,
                }],
                Kernel::Independent,
            ),
            CopulaFamily::Poisson => (Vec::new(), Kernel::Poisson { rho }),
        };

        debug!(
            %family,
            points,
            n_factors,
            nodes = nodes.len(),
            "factor quadrature built"
        );
        Ok(Self {
            family,
            n_factors,
            nodes,
            kernel,
            solver: BrentSolver::default(),
        })
    }

    /// Copula family.
    #[inline]
    pub fn family(&self) -> CopulaFamily {
        self.family
    }

    /// Number of systemic factors.
    #[inline]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Static node set (empty for the Poisson family, whose nodes depend on
    /// the default probabilities).
    #[inline]
    pub fn nodes(&self) -> &[FactorNode] {
        &self.nodes
    }

    /// Whether conditional probabilities depend on per-name loadings.
    #[inline]
    pub fn uses_loadings(&self) -> bool {
        matches!(
            self.kernel,
            Kernel::Gauss
                | Kernel::StudentT(_)
                | Kernel::DoubleT { .. }
                | Kernel::Nig { .. }
                | Kernel::Rfl { .. }
        )
    }

    /// Conditional default probabilities for each node and name.
    ///
    /// # Errors
    ///
    /// * `ArgumentShape` - Loadings for a different number of names or factors
    /// * `Solver` - Threshold search failed for a numeric-marginal family
    pub fn condition(
        &self,
        default_probs: &[f64],
        loadings: &FactorLoadings,
    ) -> Result<Conditioned, BasketError> {
        let n = default_probs.len();
        if self.uses_loadings() {
            if loadings.n_names() != n {
                return Err(BasketError::ArgumentShape {
                    what: "factor loadings",
                    expected: n,
                    actual: loadings.n_names(),
                });
            }
            if loadings.n_factors() != self.n_factors {
                return Err(BasketError::ArgumentShape {
                    what: "factor count",
                    expected: self.n_factors,
                    actual: loadings.n_factors(),
                });
            }
        }

        if let Kernel::Poisson { rho } = self.kernel {
            return Ok(poisson_condition(default_probs, rho));
        }

        let mut probs = vec![vec![0.0; n]; self.nodes.len()];
        match &self.kernel {
            Kernel::Gauss => {
                for (i, &p) in default_probs.iter().enumerate() {
                    let beta = loadings.row(i);
                    let sigma = idiosyncratic_scale(beta);
                    let c = norm_inv(p);
                    for (k, node) in self.nodes.iter().enumerate() {
                        let bm: f64 = beta.iter().zip(&node.factors).map(|(b, m)| b * m).sum();
                        probs[k][i] = gaussian_conditional(p, c, bm, sigma);
                    }
                }
            }
            Kernel::StudentT(t) => {
                let nu = t.nu();
                for (i, &p) in default_probs.iter().enumerate() {
                    let beta = loadings.row(i)[0];
                    let sigma = idiosyncratic_scale(&[beta]);
                    let c = t.inverse_cdf(p);
                    for (k, node) in self.nodes.iter().enumerate() {
                        let x = c * (node.mix / nu).sqrt();
                        probs[k][i] = gaussian_conditional(p, x, beta * node.factors[0], sigma);
                    }
                }
            }
            Kernel::Independent => {
                probs[0].copy_from_slice(default_probs);
            }
            Kernel::Clayton { theta } => {
                for (k, node) in self.nodes.iter().enumerate() {
                    for (i, &p) in default_probs.iter().enumerate() {
                        probs[k][i] = if p <= 0.0 {
                            0.0
                        } else {
                            (-node.mix * (p.powf(-theta) - 1.0)).exp()
                        };
                    }
                }
            }
            Kernel::Gumbel { theta } => {
                for (k, node) in self.nodes.iter().enumerate() {
                    for (i, &p) in default_probs.iter().enumerate() {
                        probs[k][i] = if p <= 0.0 {
                            0.0
                        } else {
                            (-node.mix * (-p.ln()).powf(*theta)).exp()
                        };
                    }
                }
            }
            Kernel::Frank { theta } => {
                let q = -(-theta).exp_m1();
                for (k, node) in self.nodes.iter().enumerate() {
                    for (i, &p) in default_probs.iter().enumerate() {
                        let base = -(-theta * p).exp_m1() / q;
                        probs[k][i] = base.clamp(0.0, 1.0).powf(node.mix);
                    }
                }
            }
            Kernel::DoubleT { .. } | Kernel::Nig { .. } | Kernel::Rfl { .. } => {
                for (i, &p) in default_probs.iter().enumerate() {
                    let beta = loadings.row(i)[0];
                    let sigma = idiosyncratic_scale(&[beta]).max(MIN_IDIOSYNCRATIC_SCALE);
                    if p <= 0.0 || p >= 1.0 {
                        let v = if p <= 0.0 { 0.0 } else { 1.0 };
                        probs.iter_mut().for_each(|row| row[i] = v);
                        continue;
                    }
                    let c = self.solve_threshold(p, beta, sigma)?;
                    for (k, node) in self.nodes.iter().enumerate() {
                        let shift = self.loading(beta, node) * node.factors[0];
                        probs[k][i] = self.idio_cdf((c - shift) / sigma);
                    }
                }
            }
            Kernel::Poisson { .. } => {}
        }

        Ok(Conditioned {
            weights: self.nodes.iter().map(|n| n.weight).collect(),
            factors: self
                .nodes
                .iter()
                .map(|n| n.factors.first().copied().unwrap_or(0.0))
                .collect(),
            probs,
        })
    }

    /// Effective loading on a node (random factor loading switches below
    /// its threshold).
    fn loading(&self, beta: f64, node: &FactorNode) -> f64 {
        match self.kernel {
            Kernel::Rfl { threshold, shift } if node.factors[0] <= threshold => {
                (beta + shift).min(1.0)
            }
            _ => beta,
        }
    }

    /// Idiosyncratic distribution function.
    fn idio_cdf(&self, x: f64) -> f64 {
        match &self.kernel {
            Kernel::DoubleT { idio, idio_scale } => idio.cdf(x / idio_scale),
            Kernel::Nig { inner, mu, beta } => inner
                .iter()
                .map(|&(v, w)| w * norm_cdf((x - mu - beta * v) / v.sqrt()))
                .sum(),
            _ => norm_cdf(x),
        }
    }

    /// Latent threshold c with Σ w · F_ε((c − a(m)·m)/σ) = p.
    fn solve_threshold(&self, p: f64, beta: f64, sigma: f64) -> Result<f64, BasketError> {
        let marginal = |c: f64| {
            self.nodes
                .iter()
                .map(|node| {
                    let shift = self.loading(beta, node) * node.factors[0];
                    node.weight * self.idio_cdf((c - shift) / sigma)
                })
                .sum::<f64>()
                - p
        };
        let guess = norm_inv(p);
        Ok(self.solver.find_root_expanding(marginal, guess - 1.0, guess + 1.0)?)
    }
}

/// Archimedean generator parameter θ for an average pairwise correlation
/// read as Kendall's τ.
///
/// `None` for non-Archimedean families and for correlations at which the
/// family degenerates to independence.
///
/// # Errors
///
/// `Solver` if the Frank inversion fails.
pub fn archimedean_theta(family: CopulaFamily, avg_corr: f64) -> Result<Option<f64>, BasketError> {
    let rho = avg_corr.clamp(0.0, MAX_ARCHIMEDEAN_CORRELATION);
    if rho <= INDEPENDENCE_THRESHOLD {
        return Ok(None);
    }
    match family {
        CopulaFamily::Clayton => Ok(Some(clayton_theta(rho))),
        CopulaFamily::Gumbel => Ok(Some(gumbel_theta(rho))),
        CopulaFamily::Frank => Ok(Some(frank_theta(rho)?)),
        _ => Ok(None),
    }
}

fn clayton_theta(tau: f64) -> f64 {
    2.0 * tau / (1.0 - tau)
}

fn gumbel_theta(tau: f64) -> f64 {
    1.0 / (1.0 - tau)
}

/// Recovery rate conditional on the first factor under recovery correlation c.
///
/// `R(m) = Φ(Φ⁻¹(R)·√(1 + c²) + c·m)`, whose mean over M ~ N(0, 1) is R.
#[inline]
pub fn conditional_recovery(recovery: f64, c: f64, m: f64) -> f64 {
    if recovery <= 0.0 || recovery >= 1.0 {
        return recovery.clamp(0.0, 1.0);
    }
    norm_cdf(norm_inv(recovery) * (1.0 + c * c).sqrt() + c * m)
}

fn idiosyncratic_scale(beta: &[f64]) -> f64 {
    (1.0 - beta.iter().map(|b| b * b).sum::<f64>()).max(0.0).sqrt()
}

fn gaussian_conditional(p: f64, c: f64, bm: f64, sigma: f64) -> f64 {
    if p <= 0.0 {
        0.0
    } else if p >= 1.0 {
        1.0
    } else if sigma < MIN_IDIOSYNCRATIC_SCALE {
        if c - bm >= 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        norm_cdf((c - bm) / sigma)
    }
}

fn gauss_nodes(points: usize, n_factors: usize) -> Result<Vec<FactorNode>, BasketError> {
    let per_dim = if n_factors == 1 {
        points
    } else {
        let cap = (MAX_TENSOR_NODES as f64).powf(1.0 / n_factors as f64).floor() as usize;
        points.min(cap.max(2))
    };
    let rule = gauss_hermite(per_dim)?;
    let mut nodes = vec![FactorNode {
        weight: 1.0,
        factors: Vec::with_capacity(n_factors),
        mix: 1.0,
    }];
    for _ in 0..n_factors {
        nodes = nodes
            .into_iter()
            .flat_map(|node| {
                rule.iter().map(move |&(m, w)| {
                    let mut factors = node.factors.clone();
                    factors.push(m);
                    FactorNode {
                        weight: node.weight * w,
                        factors,
                        mix: 1.0,
                    }
                })
            })
            .collect();
    }
    Ok(nodes)
}

/// Positive stable frailty nodes with index α via Kanter's representation.
fn gumbel_nodes(points: usize, alpha: f64) -> Result<Vec<FactorNode>, BasketError> {
    let k = (points as f64).sqrt().ceil().max(1.0) as usize;
    let rule = gauss_legendre(k)?;
    let mut nodes = Vec::with_capacity(k * k);
    for &(u1, w1) in &rule {
        let u = PI * u1;
        for &(u2, w2) in &rule {
            let e = -(-u2).ln_1p();
            let v = (alpha * u).sin() / u.sin().powf(1.0 / alpha)
                * ((((1.0 - alpha) * u).sin()) / e).powf((1.0 - alpha) / alpha);
            nodes.push(FactorNode {
                weight: w1 * w2,
                factors: Vec::new(),
                mix: v,
            });
        }
    }
    Ok(nodes)
}

/// Frank θ whose Kendall τ equals `tau`.
fn frank_theta(tau: f64) -> Result<f64, BasketError> {
    let kendall = |theta: f64| -> f64 {
        let debye = integrate(
            |t| if t < 1e-12 { 1.0 } else { t / t.exp_m1() },
            0.0,
            theta,
            64,
        )
        .unwrap_or(theta)
            / theta;
        1.0 - 4.0 / theta * (1.0 - debye)
    };
    let solver = BrentSolver::default();
    Ok(solver.find_root(|theta| kendall(theta) - tau, 1e-4, 500.0)?)
}

/// Logarithmic series frailty nodes placed at Legendre quantiles.
fn frank_nodes(points: usize, theta: f64) -> Result<Vec<FactorNode>, BasketError> {
    let q = -(-theta).exp_m1();
    let rule = gauss_legendre(points)?;
    let mut nodes = Vec::with_capacity(points);
    let mut k = 1usize;
    let mut term = q / theta;
    let mut cumulative = term;
    for (u, w) in rule {
        while cumulative < u && k < MAX_FRANK_TERMS {
            term *= q * k as f64 / (k + 1) as f64;
            k += 1;
            cumulative += term;
        }
        nodes.push(FactorNode {
            weight: w,
            factors: Vec::new(),
            mix: k as f64,
        });
    }
    Ok(nodes)
}

/// Inverse Gaussian (mean `mean`, shape `shape`) quantile nodes.
fn inverse_gaussian_nodes(mean: f64, shape: f64) -> Result<QuadratureRule, BasketError> {
    let cdf = |v: f64| -> f64 {
        if v <= 0.0 {
            return 0.0;
        }
        let r = (shape / v).sqrt();
        let first = norm_cdf(r * (v / mean - 1.0));
        let tail = norm_cdf(-r * (v / mean + 1.0));
        let second = if tail > 0.0 {
            (2.0 * shape / mean + tail.ln()).exp()
        } else {
            0.0
        };
        (first + second).min(1.0)
    };
    let solver = BrentSolver::default();
    gauss_legendre(NIG_MIX_NODES)?
        .into_iter()
        .map(|(u, w)| {
            let v = solver.find_root_expanding(|v| cdf(v) - u, mean * 1e-3, mean * 4.0)?;
            Ok((v.max(f64::MIN_POSITIVE), w))
        })
        .collect()
}

/// Two-node common shock: with probability 1 − S_c every name defaults,
/// otherwise name i defaults with 1 − S_i / S_c, where S_c = (max S_i)^ρ.
fn poisson_condition(default_probs: &[f64], rho: f64) -> Conditioned {
    let n = default_probs.len();
    let s_max = default_probs
        .iter()
        .map(|p| 1.0 - p)
        .fold(0.0_f64, f64::max);
    let s_common = s_max.powf(rho);
    let idio = default_probs
        .iter()
        .map(|p| {
            if s_common <= 0.0 {
                1.0
            } else {
                (1.0 - (1.0 - p) / s_common).clamp(0.0, 1.0)
            }
        })
        .collect();
    Conditioned {
        weights: vec![s_common, 1.0 - s_common],
        factors: vec![0.0, 0.0],
        probs: vec![idio, vec![1.0; n]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mean(cond: &Conditioned, name: usize) -> f64 {
        cond.weights.iter().zip(&cond.probs).map(|(w, p)| w * p[name]).sum()
    }

    fn variance(cond: &Conditioned, name: usize) -> f64 {
        let m = mean(cond, name);
        cond.weights
            .iter()
            .zip(&cond.probs)
            .map(|(w, p)| w * (p[name] - m).powi(2))
            .sum()
    }

    fn single(beta: f64, n: usize) -> FactorLoadings {
        FactorLoadings::single(vec![beta; n])
    }

    // ========================================
    // Marginal consistency
    // ========================================

    #[test]
    fn test_gauss_preserves_marginal() {
        let quad = FactorQuadrature::new(&Copula::gauss(), 40, 1, 0.3).unwrap();
        let cond = quad.condition(&[0.01, 0.2], &single(0.6, 2)).unwrap();
        assert_abs_diff_eq!(mean(&cond, 0), 0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(mean(&cond, 1), 0.2, epsilon = 1e-6);
        let weight_sum: f64 = cond.weights.iter().sum();
        assert_abs_diff_eq!(weight_sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_two_factor_gauss() {
        let quad = FactorQuadrature::new(&Copula::gauss(), 20, 2, 0.3).unwrap();
        assert_eq!(quad.nodes().len(), 400);
        let loadings = FactorLoadings::multi(2, vec![0.4, 0.3, 0.5, 0.0]);
        let cond = quad.condition(&[0.05, 0.05], &loadings).unwrap();
        assert_abs_diff_eq!(mean(&cond, 0), 0.05, epsilon = 1e-5);
        assert_abs_diff_eq!(mean(&cond, 1), 0.05, epsilon = 1e-5);
    }

    #[test]
    fn test_student_t_preserves_marginal() {
        let quad = FactorQuadrature::new(&Copula::student_t(5.0).unwrap(), 24, 1, 0.3).unwrap();
        let cond = quad.condition(&[0.05], &single(0.5, 1)).unwrap();
        assert_abs_diff_eq!(mean(&cond, 0), 0.05, epsilon = 5e-3);
    }

    #[test]
    fn test_numeric_marginal_families_are_exact() {
        let copulas = [
            Copula::double_t(4.0, 6.0).unwrap(),
            Copula::nig(1.2, -0.3).unwrap(),
            Copula::random_factor_loading(-1.5, 0.2).unwrap(),
        ];
        for copula in copulas {
            let quad = FactorQuadrature::new(&copula, 25, 1, 0.2).unwrap();
            let cond = quad.condition(&[0.03, 0.15], &single(0.45, 2)).unwrap();
            assert_abs_diff_eq!(mean(&cond, 0), 0.03, epsilon = 1e-8);
            assert_abs_diff_eq!(mean(&cond, 1), 0.15, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_archimedean_marginals() {
        for (family, points, tol) in [
            (CopulaFamily::Clayton, 200, 5e-3),
            (CopulaFamily::Gumbel, 100, 1e-2),
            (CopulaFamily::Frank, 100, 1e-2),
        ] {
            let quad = FactorQuadrature::new(&Copula::new(family), points, 1, 0.3).unwrap();
            let cond = quad.condition(&[0.1], &single(0.0, 1)).unwrap();
            assert_abs_diff_eq!(mean(&cond, 0), 0.1, epsilon = tol);
        }
    }

    #[test]
    fn test_archimedean_independence() {
        let quad = FactorQuadrature::new(&Copula::new(CopulaFamily::Clayton), 200, 1, 0.0).unwrap();
        assert_eq!(quad.nodes().len(), 1);
        let cond = quad.condition(&[0.2, 0.4], &single(0.0, 2)).unwrap();
        assert_eq!(cond.probs[0], vec![0.2, 0.4]);
    }

    #[test]
    fn test_poisson_two_nodes() {
        let quad = FactorQuadrature::new(&Copula::new(CopulaFamily::Poisson), 0, 1, 0.5).unwrap();
        let cond = quad.condition(&[0.1, 0.3], &single(0.0, 2)).unwrap();
        assert_eq!(cond.len(), 2);
        assert_abs_diff_eq!(mean(&cond, 0), 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(mean(&cond, 1), 0.3, epsilon = 1e-14);
        assert_eq!(cond.probs[1], vec![1.0, 1.0]);
    }

    // ========================================
    // Dependence direction
    // ========================================

    #[test]
    fn test_higher_correlation_disperses_conditionals() {
        let quad = FactorQuadrature::new(&Copula::gauss(), 30, 1, 0.0).unwrap();
        let low = quad.condition(&[0.05], &single(0.2, 1)).unwrap();
        let high = quad.condition(&[0.05], &single(0.8, 1)).unwrap();
        assert!(variance(&high, 0) > variance(&low, 0));

        let lo = FactorQuadrature::new(&Copula::new(CopulaFamily::Clayton), 200, 1, 0.1).unwrap();
        let hi = FactorQuadrature::new(&Copula::new(CopulaFamily::Clayton), 200, 1, 0.6).unwrap();
        let l = FactorLoadings::single(vec![0.0]);
        let (hi, lo) = (hi.condition(&[0.05], &l).unwrap(), lo.condition(&[0.05], &l).unwrap());
        assert!(variance(&hi, 0) > variance(&lo, 0));
    }

    #[test]
    fn test_perfect_correlation_step() {
        let quad =
            FactorQuadrature::new(&Copula::new(CopulaFamily::ExtendedGauss), 25, 1, 1.0).unwrap();
        let cond = quad.condition(&[0.3], &single(1.0, 1)).unwrap();
        assert!(cond.probs.iter().all(|p| p[0] == 0.0 || p[0] == 1.0));
    }

    // ========================================
    // Errors
    // ========================================

    #[test]
    fn test_multi_factor_unsupported() {
        assert!(matches!(
            FactorQuadrature::new(&Copula::student_t(4.0).unwrap(), 12, 2, 0.3),
            Err(BasketError::UnsupportedCombination(_))
        ));
    }

    #[test]
    fn test_loadings_shape() {
        let quad = FactorQuadrature::new(&Copula::gauss(), 10, 1, 0.3).unwrap();
        assert!(matches!(
            quad.condition(&[0.1, 0.1], &single(0.5, 3)),
            Err(BasketError::ArgumentShape { .. })
        ));
    }

    #[test]
    fn test_conditional_recovery_mean() {
        let rule = gauss_hermite(40).unwrap();
        let m: f64 = rule.iter().map(|&(x, w)| w * conditional_recovery(0.4, 0.5, x)).sum();
        assert_abs_diff_eq!(m, 0.4, epsilon = 1e-8);
        assert_eq!(conditional_recovery(0.0, 0.5, 1.0), 0.0);
    }
}
