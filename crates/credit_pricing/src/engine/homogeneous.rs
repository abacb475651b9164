//! Homogeneous-pool strategies.
//!
//! The pool is replaced by its averages: principal share, recovery, default
//! probability and factor loading. `Uniform` keeps the pool size and mixes
//! binomial default counts over factor nodes; `LargePool` takes the
//! infinite-granularity limit where the conditional loss is deterministic.

use credit_core::types::Date;
use credit_models::copula::{Conditioned, FactorQuadrature};
use credit_models::correlation::FactorLoadings;
use credit_models::BasketError;
use tracing::{debug, warn};

use super::{ComputeContext, Snapshot};
use crate::distribution::{CountDistribution, LossDistribution};

/// Relative spread above which a pool is reported as heterogeneous.
const HETEROGENEITY_TOLERANCE: f64 = 1e-6;

/// Pool averages at one date.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Averages {
    default_probability: f64,
    recovery: f64,
    loading: f64,
}

fn averages(ctx: &ComputeContext<'_>, date: Date) -> Result<Averages, BasketError> {
    let n = ctx.pool.count() as f64;
    let probs = ctx.default_probabilities(date)?;
    let loadings = ctx.loadings(date)?;
    let recovery = ctx
        .pool
        .weights()
        .iter()
        .zip(ctx.pool.names())
        .map(|(w, name)| w * name.recovery_rate(date))
        .sum();
    let loading = (0..ctx.pool.count()).map(|i| loadings.row(i)[0]).sum::<f64>() / n;
    Ok(Averages {
        default_probability: probs.iter().sum::<f64>() / n,
        recovery,
        loading,
    })
}

fn spread(values: impl Iterator<Item = f64>) -> f64 {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if hi <= 0.0 {
        0.0
    } else {
        (hi - lo) / hi
    }
}

fn check_homogeneity(ctx: &ComputeContext<'_>) -> Result<(), BasketError> {
    let date = ctx.grid.maturity();
    let probs = ctx.default_probabilities(date)?;
    let principal = spread(ctx.pool.names().iter().map(|n| n.scaled_principal()));
    let recovery = spread(ctx.pool.names().iter().map(|n| n.recovery_rate(date)));
    let default = spread(probs.into_iter());
    if [principal, recovery, default].iter().any(|&s| s > HETEROGENEITY_TOLERANCE) {
        warn!(
            principal_spread = principal,
            recovery_spread = recovery,
            default_spread = default,
            "heterogeneous pool priced with pool averages"
        );
    }
    Ok(())
}

fn condition(quad: &FactorQuadrature, avg: &Averages) -> Result<Conditioned, BasketError> {
    quad.condition(&[avg.default_probability], &FactorLoadings::single(vec![avg.loading]))
}

/// Homogeneous pool of the actual size.
pub(crate) fn compute_uniform(ctx: &ComputeContext<'_>) -> Result<Vec<Snapshot>, BasketError> {
    check_homogeneity(ctx)?;
    let quad = homogeneous_quadrature(ctx)?;
    let n = ctx.pool.count();
    let grid_size = ctx.config.grid_size;
    let track = ctx.track_amortization();

    let mut snapshots = Vec::with_capacity(ctx.grid.len());
    snapshots.push(Snapshot::initial(grid_size, Some(n), track)?);
    for &date in &ctx.grid.dates()[1..] {
        let avg = averages(ctx, date)?;
        let cond = condition(&quad, &avg)?;

        let mut counts = CountDistribution::zeros(n);
        for (&w, q) in cond.weights.iter().zip(&cond.probs) {
            let mut binomial = CountDistribution::new(n);
            for _ in 0..n {
                binomial.add_name(q[0]);
            }
            counts.mix(&binomial, w);
        }

        let mut loss = LossDistribution::zeros(grid_size)?;
        let mut amortization = if track {
            Some(LossDistribution::zeros(grid_size)?)
        } else {
            None
        };
        for (k, &p) in counts.probabilities().iter().enumerate() {
            let defaulted = k as f64 / n as f64;
            loss.deposit(p, defaulted * (1.0 - avg.recovery));
            if let Some(a) = amortization.as_mut() {
                a.deposit(p, defaulted * avg.recovery);
            }
        }
        snapshots.push(Snapshot {
            loss,
            amortization,
            counts: Some(counts),
        });
    }
    Ok(snapshots)
}

/// Infinitely granular homogeneous pool.
pub(crate) fn compute_large_pool(ctx: &ComputeContext<'_>) -> Result<Vec<Snapshot>, BasketError> {
    check_homogeneity(ctx)?;
    let quad = homogeneous_quadrature(ctx)?;
    let grid_size = ctx.config.grid_size;
    let track = ctx.track_amortization();

    let mut snapshots = Vec::with_capacity(ctx.grid.len());
    snapshots.push(Snapshot::initial(grid_size, None, track)?);
    for &date in &ctx.grid.dates()[1..] {
        let avg = averages(ctx, date)?;
        let cond = condition(&quad, &avg)?;

        let mut loss = LossDistribution::zeros(grid_size)?;
        let mut amortization = if track {
            Some(LossDistribution::zeros(grid_size)?)
        } else {
            None
        };
        for (&w, q) in cond.weights.iter().zip(&cond.probs) {
            loss.deposit(w, q[0] * (1.0 - avg.recovery));
            if let Some(a) = amortization.as_mut() {
                a.deposit(w, q[0] * avg.recovery);
            }
        }
        snapshots.push(Snapshot {
            loss,
            amortization,
            counts: None,
        });
    }
    Ok(snapshots)
}

fn homogeneous_quadrature(ctx: &ComputeContext<'_>) -> Result<FactorQuadrature, BasketError> {
    let quad = ctx.quadrature()?;
    debug!(
        family = %quad.family(),
        nodes = quad.nodes().len(),
        names = ctx.pool.count(),
        "homogeneous pool integration"
    );
    Ok(quad)
}
