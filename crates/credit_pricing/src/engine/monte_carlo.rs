//! Monte Carlo strategy.
//!
//! Each path draws one latent uniform per name whose joint law is the
//! copula; a name has defaulted by grid date `t` when its uniform is
//! below its default probability by `t`. Losses, amortization and default
//! counts are accumulated per path and date with weight `1 / paths`.
//!
//! # Latent variables
//!
//! | Family               | Construction                                      |
//! |----------------------|---------------------------------------------------|
//! | Gauss, ExtendedGauss | `Φ(X)`, `X` from factor loadings or Cholesky      |
//! | StudentT             | `t_ν(X · √(ν / S))`, `S ~ χ²_ν`                    |
//! | Clayton              | `(1 + E / V)^(−1/θ)`, `V ~ Gamma(1/θ)`             |
//! | Gumbel               | `exp(−(E / V)^(1/θ))`, `V` positive stable         |
//! | Frank                | `−ln(1 − (1 − e^(−θ)) e^(−E/V)) / θ`, `V` log-series |
//!
//! # Reproducibility
//!
//! Paths are split into chunks of [`CHUNK_SIZE`]; chunk `c` uses its own
//! generator seeded with [`chunk_seed`](crate::rng::chunk_seed)`(base, c)`
//! and partial results are merged in chunk order, so the result does not
//! depend on whether chunks run on the rayon pool.

use std::f64::consts::PI;

use credit_core::math::distributions::{norm_cdf, StudentT};
use credit_core::math::linalg::cholesky;
use credit_models::copula::{archimedean_theta, conditional_recovery, CopulaFamily};
use credit_models::correlation::{CorrelationModel, FactorLoadings};
use credit_models::{sizing, BasketError};
use rand_distr::{ChiSquared, Gamma};
use tracing::debug;

use super::{ComputeContext, Snapshot};
use crate::distribution::{CountDistribution, LossDistribution};
use crate::rng::{chunk_seed, resolve_seed, BasketRng};

/// Paths per generator chunk.
pub const CHUNK_SIZE: usize = 1_000;

/// Cap on logarithmic-series terms walked per Frank frailty draw.
const MAX_FRANK_TERMS: usize = 100_000;

/// Marker for a name that survives the whole grid.
const NO_DEFAULT: usize = usize::MAX;

/// Whether simulation supports the copula family.
pub fn supports(family: CopulaFamily) -> bool {
    matches!(
        family,
        CopulaFamily::Gauss
            | CopulaFamily::ExtendedGauss
            | CopulaFamily::StudentT
            | CopulaFamily::Clayton
            | CopulaFamily::Gumbel
            | CopulaFamily::Frank
    )
}

enum Dependence {
    Factor { loadings: FactorLoadings, idio: Vec<f64> },
    Cholesky { lower: Vec<f64> },
}

enum Latent {
    Gaussian(Dependence),
    StudentT {
        dependence: Dependence,
        t: StudentT,
        mixing: ChiSquared<f64>,
    },
    Clayton { theta: f64, frailty: Gamma<f64> },
    Gumbel { theta: f64 },
    Frank { theta: f64 },
    Independent,
}

/// Per-date inputs shared by every path.
struct Simulation {
    n: usize,
    paths: usize,
    grid_size: f64,
    track: bool,
    weights: Vec<f64>,
    /// `probs[d][i]` for grid dates after the start.
    probs: Vec<Vec<f64>>,
    recoveries: Vec<Vec<f64>>,
    refinanced: Vec<Vec<bool>>,
    recovery_correlation: Option<f64>,
    latent: Latent,
}

pub(crate) fn compute(ctx: &ComputeContext<'_>) -> Result<Vec<Snapshot>, BasketError> {
    let sim = Simulation::new(ctx)?;
    let base = resolve_seed(ctx.config.seed);
    let chunks = sim.paths.div_ceil(CHUNK_SIZE);
    debug!(
        family = %ctx.copula.family(),
        paths = sim.paths,
        chunks,
        seed = base,
        "Monte Carlo simulation"
    );

    #[cfg(feature = "parallel")]
    let partials: Vec<Vec<Snapshot>> = {
        use rayon::prelude::*;
        (0..chunks)
            .into_par_iter()
            .map(|c| sim.run_chunk(c, chunk_seed(base, c)))
            .collect::<Result<_, _>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let partials: Vec<Vec<Snapshot>> = (0..chunks)
        .map(|c| sim.run_chunk(c, chunk_seed(base, c)))
        .collect::<Result<_, _>>()?;

    let mut snapshots = Vec::with_capacity(ctx.grid.len());
    snapshots.push(Snapshot::initial(sim.grid_size, Some(sim.n), sim.track)?);
    let mut merged = sim.empty_snapshots()?;
    for partial in &partials {
        for (total, part) in merged.iter_mut().zip(partial) {
            total.loss.mix(&part.loss, 1.0);
            if let (Some(a), Some(b)) = (total.amortization.as_mut(), part.amortization.as_ref()) {
                a.mix(b, 1.0);
            }
            if let (Some(a), Some(b)) = (total.counts.as_mut(), part.counts.as_ref()) {
                a.mix(b, 1.0);
            }
        }
    }
    snapshots.extend(merged);
    Ok(snapshots)
}

/// Simulated default date indices, one row per path in path order.
///
/// Indices count grid dates after the start; survivors carry
/// [`NO_DEFAULT`]. Chunking and seeding follow [`compute`].
pub(crate) fn simulate_defaults(ctx: &ComputeContext<'_>) -> Result<Vec<Vec<usize>>, BasketError> {
    let sim = Simulation::new(ctx)?;
    let base = resolve_seed(ctx.config.seed);
    let chunks = sim.paths.div_ceil(CHUNK_SIZE);
    let run = |c: usize| {
        let mut rows = Vec::with_capacity(CHUNK_SIZE);
        sim.walk_chunk(c, chunk_seed(base, c), |index, _| rows.push(index.to_vec()));
        rows
    };

    #[cfg(feature = "parallel")]
    let per_chunk: Vec<Vec<Vec<usize>>> = {
        use rayon::prelude::*;
        (0..chunks).into_par_iter().map(run).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let per_chunk: Vec<Vec<Vec<usize>>> = (0..chunks).map(run).collect();

    Ok(per_chunk.into_iter().flatten().collect())
}

impl Simulation {
    fn new(ctx: &ComputeContext<'_>) -> Result<Self, BasketError> {
        let n = ctx.pool.count();
        let dates = &ctx.grid.dates()[1..];
        let family = ctx.copula.family();
        let recovery_correlation = ctx.copula.recovery_correlation();

        let mut probs = Vec::with_capacity(dates.len());
        let mut recoveries = Vec::with_capacity(dates.len());
        let mut refinanced = Vec::with_capacity(dates.len());
        for &date in dates {
            probs.push(ctx.default_probabilities(date)?);
            recoveries.push(ctx.pool.names().iter().map(|name| name.recovery_rate(date)).collect());
            refinanced.push(
                ctx.pool
                    .names()
                    .iter()
                    .map(|name| ComputeContext::refinanced(name, date))
                    .collect(),
            );
        }

        let avg_corr = ctx.correlation.average_correlation(n);
        let latent = match family {
            CopulaFamily::Gauss | CopulaFamily::ExtendedGauss => Latent::Gaussian(dependence(ctx)?),
            CopulaFamily::StudentT => Latent::StudentT {
                dependence: dependence(ctx)?,
                t: StudentT::new(ctx.copula.dof())?,
                mixing: ChiSquared::new(ctx.copula.dof()).map_err(|e| {
                    BasketError::InvalidParameter {
                        name: "degrees of freedom",
                        value: e.to_string(),
                    }
                })?,
            },
            CopulaFamily::Clayton | CopulaFamily::Gumbel | CopulaFamily::Frank => {
                match archimedean_theta(family, avg_corr)? {
                    None => Latent::Independent,
                    Some(theta) if family == CopulaFamily::Clayton => Latent::Clayton {
                        theta,
                        frailty: Gamma::new(1.0 / theta, 1.0).map_err(|e| {
                            BasketError::InvalidParameter {
                                name: "clayton theta",
                                value: e.to_string(),
                            }
                        })?,
                    },
                    Some(theta) if family == CopulaFamily::Gumbel => Latent::Gumbel { theta },
                    Some(theta) => Latent::Frank { theta },
                }
            }
            _ => {
                return Err(BasketError::UnsupportedCombination(format!(
                    "{family} copula in Monte Carlo simulation"
                )))
            }
        };
        if recovery_correlation.is_some() {
            let factor_driven = matches!(&latent, Latent::Gaussian(Dependence::Factor { .. }));
            if !factor_driven {
                return Err(BasketError::UnsupportedCombination(
                    "recovery correlation needs a factor-driven Gaussian simulation".to_string(),
                ));
            }
        }

        Ok(Self {
            n,
            paths: sizing::sample_size(ctx.config.sample_size),
            grid_size: ctx.config.grid_size,
            track: ctx.track_amortization(),
            weights: ctx.pool.weights(),
            probs,
            recoveries,
            refinanced,
            recovery_correlation,
            latent,
        })
    }

    fn empty_snapshots(&self) -> Result<Vec<Snapshot>, BasketError> {
        (0..self.probs.len())
            .map(|_| {
                Ok(Snapshot {
                    loss: LossDistribution::zeros(self.grid_size)?,
                    amortization: if self.track {
                        Some(LossDistribution::zeros(self.grid_size)?)
                    } else {
                        None
                    },
                    counts: Some(CountDistribution::zeros(self.n)),
                })
            })
            .collect()
    }

    /// Walk the paths of `chunk`, handing each path's default date indices
    /// and first factor value to `visit`.
    fn walk_chunk(&self, chunk: usize, seed: u64, mut visit: impl FnMut(&[usize], f64)) {
        let mut rng = BasketRng::from_seed(seed);
        let first = chunk * CHUNK_SIZE;
        let last = (first + CHUNK_SIZE).min(self.paths);

        let mut normals = vec![0.0; self.normals_per_path()];
        let mut uniforms = vec![0.0; self.n];
        let mut default_index = vec![NO_DEFAULT; self.n];

        for _ in first..last {
            let factor = self.draw_uniforms(&mut rng, &mut normals, &mut uniforms);
            for i in 0..self.n {
                default_index[i] = self
                    .probs
                    .iter()
                    .position(|p| uniforms[i] < p[i])
                    .unwrap_or(NO_DEFAULT);
            }
            visit(&default_index, factor);
        }
    }

    fn run_chunk(&self, chunk: usize, seed: u64) -> Result<Vec<Snapshot>, BasketError> {
        let mut out = self.empty_snapshots()?;
        let path_weight = 1.0 / self.paths as f64;
        self.walk_chunk(chunk, seed, |default_index, factor| {
            for (d, snapshot) in out.iter_mut().enumerate() {
                let mut loss = 0.0;
                let mut amortized = 0.0;
                let mut defaults = 0;
                for i in 0..self.n {
                    let w = self.weights[i];
                    let k = default_index[i];
                    if k <= d {
                        // recovery as of the default date
                        let r = match self.recovery_correlation {
                            Some(c) => conditional_recovery(self.recoveries[k][i], c, factor),
                            None => self.recoveries[k][i],
                        };
                        loss += w * (1.0 - r);
                        amortized += w * r;
                        defaults += 1;
                    } else if self.refinanced[d][i] {
                        amortized += w;
                    }
                }
                snapshot.loss.deposit(path_weight, loss);
                if let Some(a) = snapshot.amortization.as_mut() {
                    a.deposit(path_weight, amortized);
                }
                if let Some(c) = snapshot.counts.as_mut() {
                    c.deposit(path_weight, defaults);
                }
            }
        });
        Ok(out)
    }

    fn normals_per_path(&self) -> usize {
        match &self.latent {
            Latent::Gaussian(dep) | Latent::StudentT { dependence: dep, .. } => match dep {
                Dependence::Factor { loadings, .. } => loadings.n_factors() + self.n,
                Dependence::Cholesky { .. } => self.n,
            },
            _ => 0,
        }
    }

    /// Fill `uniforms` for one path; returns the first factor value.
    fn draw_uniforms(&self, rng: &mut BasketRng, normals: &mut [f64], uniforms: &mut [f64]) -> f64 {
        match &self.latent {
            Latent::Gaussian(dep) => {
                let factor = self.draw_gaussian(dep, rng, normals, uniforms);
                uniforms.iter_mut().for_each(|x| *x = norm_cdf(*x));
                factor
            }
            Latent::StudentT { dependence, t, mixing } => {
                let factor = self.draw_gaussian(dependence, rng, normals, uniforms);
                let scale = (t.nu() / rng.sample(mixing)).sqrt();
                uniforms.iter_mut().for_each(|x| *x = t.cdf(*x * scale));
                factor
            }
            Latent::Clayton { theta, frailty } => {
                let v = rng.sample(frailty);
                for u in uniforms.iter_mut() {
                    *u = (1.0 + rng.gen_exp() / v).powf(-1.0 / theta);
                }
                0.0
            }
            Latent::Gumbel { theta } => {
                let alpha = 1.0 / theta;
                let v = stable_frailty(rng, alpha);
                for u in uniforms.iter_mut() {
                    *u = (-(rng.gen_exp() / v).powf(alpha)).exp();
                }
                0.0
            }
            Latent::Frank { theta } => {
                let q = -(-theta).exp_m1();
                let v = log_series_frailty(rng, q, *theta);
                for u in uniforms.iter_mut() {
                    let s = rng.gen_exp() / v;
                    *u = -(-q * (-s).exp()).ln_1p() / theta;
                }
                0.0
            }
            Latent::Independent => {
                uniforms.iter_mut().for_each(|u| *u = rng.gen_uniform());
                0.0
            }
        }
    }

    /// Correlated standard normals written into `out`.
    fn draw_gaussian(
        &self,
        dep: &Dependence,
        rng: &mut BasketRng,
        normals: &mut [f64],
        out: &mut [f64],
    ) -> f64 {
        rng.fill_normal(normals);
        match dep {
            Dependence::Factor { loadings, idio } => {
                let k = loadings.n_factors();
                let (factors, eps) = normals.split_at(k);
                for (i, x) in out.iter_mut().enumerate() {
                    let systematic: f64 =
                        loadings.row(i).iter().zip(factors).map(|(b, m)| b * m).sum();
                    *x = systematic + idio[i] * eps[i];
                }
                factors.first().copied().unwrap_or(0.0)
            }
            Dependence::Cholesky { lower } => {
                let n = self.n;
                for (i, x) in out.iter_mut().enumerate() {
                    *x = (0..=i).map(|j| lower[i * n + j] * normals[j]).sum();
                }
                0.0
            }
        }
    }
}

fn dependence(ctx: &ComputeContext<'_>) -> Result<Dependence, BasketError> {
    let n = ctx.pool.count();
    match ctx.correlation {
        CorrelationModel::General { .. } => {
            let matrix = ctx.correlation.to_matrix(n)?;
            Ok(Dependence::Cholesky {
                lower: cholesky(&matrix, n)?,
            })
        }
        _ => {
            let loadings = ctx.loadings(ctx.grid.maturity())?;
            let idio = (0..n)
                .map(|i| {
                    let b2: f64 = loadings.row(i).iter().map(|b| b * b).sum();
                    (1.0 - b2).max(0.0).sqrt()
                })
                .collect();
            Ok(Dependence::Factor { loadings, idio })
        }
    }
}

/// Positive stable variate with index `alpha` (Kanter).
fn stable_frailty(rng: &mut BasketRng, alpha: f64) -> f64 {
    let u = PI * rng.gen_open_uniform();
    let e = rng.gen_exp();
    let head = (alpha * u).sin() / u.sin().powf(1.0 / alpha);
    head * (((1.0 - alpha) * u).sin() / e).powf((1.0 - alpha) / alpha)
}

/// Logarithmic series variate with parameter `q = 1 − e^(−θ)`.
fn log_series_frailty(rng: &mut BasketRng, q: f64, theta: f64) -> f64 {
    let u = rng.gen_uniform();
    let mut k = 1usize;
    let mut term = q / theta;
    let mut cumulative = term;
    while cumulative < u && k < MAX_FRANK_TERMS {
        term *= q * k as f64 / (k + 1) as f64;
        k += 1;
        cumulative += term;
    }
    k as f64
}
