//! Forward-loss strategy.
//!
//! Top-down model: the number of defaults N(t) is a pure-birth Markov
//! chain on `0..=n` with intensity
//!
//! ```text
//! λ_k(t) = s_k · (n − k) · h̄(t) · (1 + α · k / n)^β
//! ```
//!
//! where `h̄` is the pool-average hazard rate over the grid interval (or
//! over the whole horizon when `flat`). The state distribution is stepped
//! with implicit Euler, which keeps it non-negative and conserves mass.
//! The pool loss in state k is the caller's `state_losses[k]`.

use credit_core::types::{Date, DayCountConvention};
use credit_models::BasketError;
use tracing::debug;

use super::{ComputeContext, ForwardLossConfig, Snapshot};
use crate::distribution::{CountDistribution, LossDistribution};

/// Tolerance on the base-level probabilities summing to one.
const MASS_TOLERANCE: f64 = 1e-8;

/// Caller-supplied chain inputs for a pool of n names.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForwardLossInputs {
    state_losses: Vec<f64>,
    scaling_factors: Vec<f64>,
    base_levels: Vec<f64>,
}

impl ForwardLossInputs {
    /// Bundle chain inputs; shapes are checked against the pool when the
    /// engine is built.
    ///
    /// * `state_losses` - Pool loss fraction with k defaults, k = 0..=n
    /// * `scaling_factors` - Intensity scaling in state k, k = 0..n
    /// * `base_levels` - Initial state distribution, k = 0..=n
    pub fn new(state_losses: Vec<f64>, scaling_factors: Vec<f64>, base_levels: Vec<f64>) -> Self {
        Self {
            state_losses,
            scaling_factors,
            base_levels,
        }
    }

    /// Loss fraction per state.
    #[inline]
    pub fn state_losses(&self) -> &[f64] {
        &self.state_losses
    }

    /// Intensity scaling per state.
    #[inline]
    pub fn scaling_factors(&self) -> &[f64] {
        &self.scaling_factors
    }

    /// Initial state distribution.
    #[inline]
    pub fn base_levels(&self) -> &[f64] {
        &self.base_levels
    }

    /// Default inputs for `n` equal names with recovery `recovery`: state
    /// k loses `k (1 − recovery) / n`, unit scaling, start with no defaults.
    pub fn homogeneous(n: usize, recovery: f64) -> Self {
        let mut base_levels = vec![0.0; n + 1];
        base_levels[0] = 1.0;
        Self {
            state_losses: (0..=n).map(|k| k as f64 * (1.0 - recovery) / n.max(1) as f64).collect(),
            scaling_factors: vec![1.0; n],
            base_levels,
        }
    }

    /// Check the inputs against a pool of `n` names.
    ///
    /// # Errors
    ///
    /// * `ArgumentShape` - Any array of the wrong length
    /// * `InvalidParameter` - Losses outside [0, 1], negative scaling or
    ///   base levels not a probability distribution
    pub fn validate(&self, n: usize) -> Result<(), BasketError> {
        for (what, expected, actual) in [
            ("state losses", n + 1, self.state_losses.len()),
            ("scaling factors", n, self.scaling_factors.len()),
            ("base levels", n + 1, self.base_levels.len()),
        ] {
            if expected != actual {
                return Err(BasketError::ArgumentShape { what, expected, actual });
            }
        }
        if let Some(bad) = self.state_losses.iter().find(|l| !(0.0..=1.0).contains(*l)) {
            return Err(BasketError::InvalidParameter {
                name: "state loss",
                value: format!("{bad} outside [0, 1]"),
            });
        }
        if let Some(bad) = self.scaling_factors.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(BasketError::InvalidParameter {
                name: "scaling factor",
                value: format!("{bad} is negative or not finite"),
            });
        }
        let mass: f64 = self.base_levels.iter().sum();
        if self.base_levels.iter().any(|p| *p < 0.0) || (mass - 1.0).abs() > MASS_TOLERANCE {
            return Err(BasketError::InvalidParameter {
                name: "base levels",
                value: format!("must be non-negative and sum to 1, sum is {mass}"),
            });
        }
        Ok(())
    }
}

pub(crate) fn compute(
    ctx: &ComputeContext<'_>,
    inputs: &ForwardLossInputs,
) -> Result<Vec<Snapshot>, BasketError> {
    let n = ctx.pool.count();
    inputs.validate(n)?;
    let cfg = ctx.config.forward_loss;
    let grid_size = ctx.config.grid_size;
    let dates = ctx.grid.dates();
    debug!(
        names = n,
        alpha = cfg.alpha,
        beta = cfg.beta,
        flat = cfg.flat,
        substeps = cfg.substeps,
        "forward-loss chain"
    );

    let horizon_hazard = if cfg.flat {
        Some(average_hazard(ctx, ctx.grid.start(), ctx.grid.maturity())?)
    } else {
        None
    };

    let mut state = inputs.base_levels.clone();
    let mut snapshots = Vec::with_capacity(dates.len());
    snapshots.push(snapshot(&state, inputs, grid_size)?);
    for pair in dates.windows(2) {
        let (t0, t1) = (pair[0], pair[1]);
        let dt = DayCountConvention::ActualActual365.year_fraction_dates(t0, t1);
        let hazard = match horizon_hazard {
            Some(h) => h,
            None => average_hazard(ctx, t0, t1)?,
        };
        let intensities = intensities(inputs, &cfg, hazard, n);
        step_implicit(&mut state, &intensities, dt, cfg.substeps);
        snapshots.push(snapshot(&state, inputs, grid_size)?);
    }
    Ok(snapshots)
}

/// Pool-average hazard rate over `[t0, t1]`.
fn average_hazard(ctx: &ComputeContext<'_>, t0: Date, t1: Date) -> Result<f64, BasketError> {
    let dt = DayCountConvention::ActualActual365.year_fraction_dates(t0, t1);
    if dt <= 0.0 {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for name in ctx.pool.names() {
        let s0 = (1.0 - ctx.default_probability(name, t0)?).max(f64::MIN_POSITIVE);
        let s1 = (1.0 - ctx.default_probability(name, t1)?).max(f64::MIN_POSITIVE);
        total += -(s1 / s0).ln() / dt;
    }
    Ok(total / ctx.pool.count() as f64)
}

fn intensities(
    inputs: &ForwardLossInputs,
    cfg: &ForwardLossConfig,
    hazard: f64,
    n: usize,
) -> Vec<f64> {
    let nf = n as f64;
    let mut lambda: Vec<f64> = inputs
        .scaling_factors
        .iter()
        .enumerate()
        .map(|(k, s)| {
            let contagion = (1.0 + cfg.alpha * k as f64 / nf).max(0.0).powf(cfg.beta);
            s * (nf - k as f64) * hazard * contagion
        })
        .collect();
    // absorbing state
    lambda.push(0.0);
    lambda
}

/// Implicit Euler for `dπ_k = λ_{k−1} π_{k−1} − λ_k π_k`, solved by forward
/// substitution.
fn step_implicit(state: &mut [f64], lambda: &[f64], dt: f64, substeps: usize) {
    let h = dt / substeps as f64;
    for _ in 0..substeps {
        let mut inflow = 0.0;
        for (p, l) in state.iter_mut().zip(lambda) {
            *p = (*p + inflow) / (1.0 + l * h);
            inflow = l * h * *p;
        }
    }
}

fn snapshot(
    state: &[f64],
    inputs: &ForwardLossInputs,
    grid_size: f64,
) -> Result<Snapshot, BasketError> {
    let mut loss = LossDistribution::zeros(grid_size)?;
    for (p, l) in state.iter().zip(&inputs.state_losses) {
        loss.deposit(*p, *l);
    }
    Ok(Snapshot {
        loss,
        amortization: None,
        counts: Some(CountDistribution::from_probabilities(state.to_vec())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BasketConfig, BasketPricer, EngineKind};
    use approx::assert_abs_diff_eq;
    use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
    use credit_models::copula::Copula;
    use credit_models::correlation::CorrelationInput;
    use credit_models::pool::Pool;

    fn as_of() -> Date {
        Date::from_ymd(2024, 3, 20).unwrap()
    }

    fn maturity() -> Date {
        Date::from_ymd(2029, 3, 20).unwrap()
    }

    fn pool(n: usize) -> Pool {
        let curves: Vec<_> = (0..n)
            .map(|i| {
                Some(
                    SurvivalCurve::flat(format!("N{i}"), as_of(), 0.02)
                        .unwrap()
                        .with_recovery(RecoveryCurve::flat(as_of(), 0.4).unwrap()),
                )
            })
            .collect();
        Pool::from_curves(&curves, None).unwrap()
    }

    fn engine(
        inputs: ForwardLossInputs,
        cfg: ForwardLossConfig,
    ) -> Result<BasketPricer, BasketError> {
        let config = BasketConfig::builder().forward_loss(cfg).build().unwrap();
        BasketPricer::new(
            EngineKind::ForwardLoss(inputs),
            pool(4),
            Copula::gauss(),
            &CorrelationInput::Scalar(0.0),
            maturity(),
            config,
        )
    }

    // ========================================
    // Chain dynamics
    // ========================================

    #[test]
    fn test_implicit_step_conserves_mass() {
        let mut state = vec![0.7, 0.2, 0.1, 0.0];
        step_implicit(&mut state, &[3.0, 2.0, 1.0, 0.0], 0.5, 10);
        assert_abs_diff_eq!(state.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert!(state.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_independent_chain_close_to_binomial() {
        let mut e = engine(ForwardLossInputs::homogeneous(4, 0.4), ForwardLossConfig {
            substeps: 200,
            ..Default::default()
        })
        .unwrap();
        let pd = pool(1).names()[0].curve().default_probability(maturity()).unwrap();
        let counts = e.default_count_distribution(maturity()).unwrap();
        // without contagion names default independently at the pool hazard
        assert_abs_diff_eq!(counts[0], (1.0 - pd).powi(4), epsilon = 2e-3);
        assert_abs_diff_eq!(e.expected_loss(maturity()).unwrap(), 0.6 * pd, epsilon = 2e-3);
        assert_eq!(e.expected_amortization(maturity()).unwrap(), 0.0);
    }

    #[test]
    fn test_contagion_fattens_tail() {
        let inputs = ForwardLossInputs::homogeneous(4, 0.4);
        let mut plain = engine(inputs.clone(), ForwardLossConfig::default()).unwrap();
        let mut contagious = engine(inputs, ForwardLossConfig {
            alpha: 5.0,
            beta: 2.0,
            ..Default::default()
        })
        .unwrap();
        let a = plain.nth_to_default_probability(maturity(), 3).unwrap();
        let b = contagious.nth_to_default_probability(maturity(), 3).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_flat_hazard_equal_for_flat_curves() {
        let inputs = ForwardLossInputs::homogeneous(4, 0.4);
        let mut stepped = engine(inputs.clone(), ForwardLossConfig::default()).unwrap();
        let mut flat = engine(inputs, ForwardLossConfig {
            flat: true,
            ..Default::default()
        })
        .unwrap();
        assert_abs_diff_eq!(
            stepped.expected_loss(maturity()).unwrap(),
            flat.expected_loss(maturity()).unwrap(),
            epsilon = 1e-10
        );
    }

    // ========================================
    // Validation
    // ========================================

    #[test]
    fn test_shape_mismatch() {
        let bad = ForwardLossInputs::new(vec![0.0; 5], vec![1.0; 3], vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            engine(bad, ForwardLossConfig::default()),
            Err(BasketError::ArgumentShape {
                what: "scaling factors",
                expected: 4,
                actual: 3
            })
        ));
        let unnormalised = ForwardLossInputs::new(vec![0.0; 5], vec![1.0; 4], vec![0.5; 5]);
        assert!(matches!(
            engine(unnormalised, ForwardLossConfig::default()),
            Err(BasketError::InvalidParameter { .. })
        ));
    }
}
