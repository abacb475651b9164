//! Loss-distribution engines.
//!
//! This module provides:
//! - [`BasketPricer`]: Pool loss and amortization distributions on a time
//!   grid, computed lazily and cached until an input changes
//! - [`EngineKind`]: The computation strategy, fixed at construction
//! - [`BasketConfig`]: Grid, sampling and amortization settings
//!
//! # Strategies
//!
//! | Kind           | Method                                             |
//! |----------------|----------------------------------------------------|
//! | `Uniform`      | Binomial mixture over factor nodes                 |
//! | `LargePool`    | Deterministic conditional loss per factor node     |
//! | `SemiAnalytic` | Per-name convolution on a loss grid per node       |
//! | `MonteCarlo`   | Simulated default times, chunked and reproducible  |
//! | `ForwardLoss`  | Pure-birth chain on the default count              |

pub mod config;
pub mod forward_loss;
pub mod homogeneous;
pub mod monte_carlo;
pub mod semi_analytic;
pub mod state;

pub use config::{BasketConfig, BasketConfigBuilder, ForwardLossConfig};
pub use forward_loss::ForwardLossInputs;
pub use state::{Cache, CacheState};

use credit_core::market_data::curves::SurvivalCurve;
use credit_core::types::Date;
use credit_models::copula::{Copula, CopulaFamily, FactorQuadrature};
use credit_models::correlation::{
    resolve, CorrelationInput, CorrelationModel, EngineTarget, FactorLoadings, SharedCorrelation,
};
use credit_models::pool::{Name, Pool};
use credit_models::schedule::{TimeGrid, TimeGridBuilder};
use credit_models::{sizing, BasketError};
use tracing::debug;

use crate::distribution::{CountDistribution, LossDistribution};

/// Computation strategy of a [`BasketPricer`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineKind {
    /// Homogeneous pool, binomial mixture.
    Uniform,
    /// Homogeneous pool in the infinite-granularity limit.
    LargePool,
    /// Heterogeneous pool, per-name convolution over factor nodes.
    SemiAnalytic,
    /// Simulated default times.
    MonteCarlo,
    /// Pure-birth default-count chain.
    ForwardLoss(ForwardLossInputs),
}

impl EngineKind {
    /// Correlation target used when resolving input.
    pub fn target(&self) -> EngineTarget {
        match self {
            Self::Uniform | Self::LargePool => EngineTarget::Homogeneous,
            Self::SemiAnalytic | Self::ForwardLoss(_) => EngineTarget::SemiAnalytic,
            Self::MonteCarlo => EngineTarget::MonteCarlo,
        }
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "Uniform",
            Self::LargePool => "LargePool",
            Self::SemiAnalytic => "SemiAnalytic",
            Self::MonteCarlo => "MonteCarlo",
            Self::ForwardLoss(_) => "ForwardLoss",
        }
    }
}

/// Distributions at one grid date.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Pool loss fraction.
    pub loss: LossDistribution,
    /// Pool amortization fraction (`None` when not tracked).
    pub amortization: Option<LossDistribution>,
    /// Number of defaults (`None` for the large-pool limit).
    pub counts: Option<CountDistribution>,
}

impl Snapshot {
    /// No loss, no amortization, no defaults; `names` is `None` when the
    /// strategy carries no count distribution.
    pub(crate) fn initial(
        grid_size: f64,
        names: Option<usize>,
        track_amortization: bool,
    ) -> Result<Self, BasketError> {
        Ok(Self {
            loss: LossDistribution::new(grid_size)?,
            amortization: if track_amortization {
                Some(LossDistribution::new(grid_size)?)
            } else {
                None
            },
            counts: names.map(CountDistribution::new),
        })
    }
}

/// Inputs shared by every strategy for one computation.
pub(crate) struct ComputeContext<'a> {
    pub pool: &'a Pool,
    pub copula: &'a Copula,
    pub correlation: &'a CorrelationModel,
    pub grid: &'a TimeGrid,
    pub config: &'a BasketConfig,
}

impl ComputeContext<'_> {
    pub fn track_amortization(&self) -> bool {
        !self.config.no_amortization
    }

    /// Probability that `name` defaults between the portfolio start and
    /// `date`, frozen at its refinance date.
    pub fn default_probability(&self, name: &Name, date: Date) -> Result<f64, BasketError> {
        let start = self.grid.start();
        let horizon = match name.refinance_date() {
            Some(r) if r < date => r,
            _ => date,
        };
        if horizon <= start {
            return Ok(0.0);
        }
        let curve = name.curve();
        let p = curve.default_probability(horizon)?;
        if start > curve.as_of() {
            Ok((p - curve.default_probability(start)?).max(0.0))
        } else {
            Ok(p)
        }
    }

    /// Whether a surviving name has prepaid by `date`.
    pub fn refinanced(name: &Name, date: Date) -> bool {
        name.refinance_date().is_some_and(|r| r <= date)
    }

    pub fn default_probabilities(&self, date: Date) -> Result<Vec<f64>, BasketError> {
        self.pool
            .names()
            .iter()
            .map(|n| self.default_probability(n, date))
            .collect()
    }

    pub fn points(&self) -> usize {
        self.config
            .integration_points
            .filter(|p| *p > 0)
            .unwrap_or_else(|| sizing::points(self.copula.family(), self.pool.count()))
    }

    pub fn loadings(&self, date: Date) -> Result<FactorLoadings, BasketError> {
        self.correlation.loadings_at(date, self.pool.count())
    }

    pub fn quadrature(&self) -> Result<FactorQuadrature, BasketError> {
        let n = self.pool.count();
        FactorQuadrature::new(
            self.copula,
            self.points(),
            self.correlation.n_factors().max(1),
            self.correlation.average_correlation(n),
        )
    }
}

#[derive(Debug, Clone)]
struct Computed {
    grid: TimeGrid,
    snapshots: Vec<Snapshot>,
}

/// Pool loss-distribution engine.
///
/// Queries take `&mut self`: the first query after construction or after
/// any mutation recomputes every grid date; later queries read the cache.
/// A change of the shared correlation's version counter counts as a
/// mutation.
///
/// # Examples
///
/// ```rust
/// use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
/// use credit_core::types::Date;
/// use credit_models::copula::Copula;
/// use credit_models::correlation::CorrelationInput;
/// use credit_models::pool::Pool;
/// use credit_pricing::engine::{BasketConfig, BasketPricer, CacheState, EngineKind};
///
/// let as_of = Date::from_ymd(2024, 3, 20).unwrap();
/// let curves: Vec<_> = (0..5)
///     .map(|i| {
///         Some(
///             SurvivalCurve::flat(format!("N{i}"), as_of, 0.02)
///                 .unwrap()
///                 .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap()),
///         )
///     })
///     .collect();
/// let pool = Pool::from_curves(&curves, Some(&[1.0e7])).unwrap();
/// let maturity = Date::from_ymd(2029, 3, 20).unwrap();
///
/// let mut pricer = BasketPricer::new(
///     EngineKind::SemiAnalytic,
///     pool,
///     Copula::gauss(),
///     &CorrelationInput::Scalar(0.3),
///     maturity,
///     BasketConfig::default(),
/// )
/// .unwrap();
///
/// assert_eq!(pricer.state(), CacheState::Uninitialized);
/// let el = pricer.expected_loss(maturity).unwrap();
/// assert_eq!(pricer.state(), CacheState::Computed);
/// // 5y default probability ~9.5%, 60% loss given default
/// assert!((el - 0.6 * (1.0 - (-0.1f64).exp())).abs() < 1e-3);
/// ```
#[derive(Debug)]
pub struct BasketPricer {
    kind: EngineKind,
    pool: Pool,
    copula: Copula,
    correlation: SharedCorrelation,
    base: Option<SharedCorrelation>,
    seen_version: u64,
    maturity: Date,
    extra_dates: Vec<Date>,
    config: BasketConfig,
    cache: Cache<Computed>,
}

impl BasketPricer {
    /// Build an engine.
    ///
    /// A base correlation is kept aside (see [`BasketPricer::base_correlation`])
    /// and the engine starts on an all-zero factor placeholder until a
    /// concrete correlation is set.
    ///
    /// # Errors
    ///
    /// * `InvalidCorrelationInput`, `UnsupportedCombination`, `ArgumentShape` -
    ///   From correlation resolution and strategy checks
    /// * `Config` - Invalid configuration
    /// * `InvalidParameter` - Maturity not after the portfolio start
    pub fn new(
        kind: EngineKind,
        pool: Pool,
        copula: Copula,
        correlation: &CorrelationInput,
        maturity: Date,
        config: BasketConfig,
    ) -> Result<Self, BasketError> {
        config.validate()?;
        if let EngineKind::ForwardLoss(inputs) = &kind {
            inputs.validate(pool.count())?;
        }
        if pool.scaled_total() <= 0.0 {
            return Err(BasketError::InvalidParameter {
                name: "total principal",
                value: "must be positive".to_string(),
            });
        }

        let names = pool.name_ids();
        let resolution = resolve(correlation, &names, kind.target())?;
        let (handle, base) = if resolution.is_deferred() {
            let placeholder = CorrelationModel::zero_factor(names, 1);
            (SharedCorrelation::new(placeholder), Some(resolution.handle().clone()))
        } else {
            (resolution.handle().clone(), None)
        };

        let pricer = Self {
            seen_version: handle.version(),
            kind,
            pool,
            copula,
            correlation: handle,
            base,
            maturity,
            extra_dates: Vec::new(),
            config,
            cache: Cache::default(),
        };
        pricer.check_combination()?;
        pricer.time_grid()?;
        debug!(
            engine = pricer.kind.name(),
            names = pricer.pool.count(),
            copula = %pricer.copula.family(),
            correlation = pricer.correlation.read(CorrelationModel::kind),
            "basket engine constructed"
        );
        Ok(pricer)
    }

    fn check_combination(&self) -> Result<(), BasketError> {
        let family = self.copula.family();
        let unsupported = |why: String| Err(BasketError::UnsupportedCombination(why));
        let n_factors = self.correlation.read(CorrelationModel::n_factors);
        let recovery_correlation = self.copula.recovery_correlation().is_some();
        match &self.kind {
            EngineKind::Uniform | EngineKind::LargePool => {
                if n_factors > 1 {
                    return unsupported(format!(
                        "{} engine needs a single factor",
                        self.kind.name()
                    ));
                }
                if self.pool.has_refinance() {
                    return unsupported(format!(
                        "{} engine cannot model refinancing names",
                        self.kind.name()
                    ));
                }
                if recovery_correlation {
                    return unsupported(format!(
                        "{} engine cannot model recovery correlation",
                        self.kind.name()
                    ));
                }
            }
            EngineKind::SemiAnalytic => {
                if n_factors > 1 && !family.supports_multi_factor() {
                    return unsupported(format!("{family} copula with {n_factors} factors"));
                }
            }
            EngineKind::MonteCarlo => {
                if !monte_carlo::supports(family) {
                    return unsupported(format!("{family} copula in Monte Carlo simulation"));
                }
                if recovery_correlation {
                    if !matches!(family, CopulaFamily::Gauss | CopulaFamily::ExtendedGauss) {
                        return unsupported(format!(
                            "recovery correlation with simulated {family} copula"
                        ));
                    }
                    let general = self
                        .correlation
                        .read(|m| matches!(m, CorrelationModel::General { .. }));
                    if general {
                        return unsupported(
                            "recovery correlation needs a factor model, not a general matrix"
                                .to_string(),
                        );
                    }
                }
            }
            EngineKind::ForwardLoss(_) => return Ok(()),
        }
        if recovery_correlation && !family.is_normal_factor() {
            return unsupported(format!("recovery correlation with {family} copula"));
        }
        Ok(())
    }

    fn time_grid(&self) -> Result<TimeGrid, BasketError> {
        build_grid(&self.pool, &self.config, self.maturity, &self.extra_dates)
    }

    fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    fn ensure(&mut self) -> Result<&Computed, BasketError> {
        let version = self.correlation.version();
        if version != self.seen_version {
            self.seen_version = version;
            self.cache.invalidate();
        }
        if !self.cache.is_fresh() {
            self.check_combination()?;
        }
        let Self {
            kind,
            pool,
            copula,
            correlation,
            maturity,
            extra_dates,
            config,
            cache,
            ..
        } = self;
        cache.get_or_try_store(|| {
            let grid = build_grid(pool, config, *maturity, extra_dates)?;
            let model = correlation.snapshot();
            let ctx = ComputeContext {
                pool,
                copula,
                correlation: &model,
                grid: &grid,
                config,
            };
            debug!(
                engine = kind.name(),
                names = pool.count(),
                dates = grid.len(),
                "computing loss distributions"
            );
            let snapshots = match kind {
                EngineKind::Uniform => homogeneous::compute_uniform(&ctx)?,
                EngineKind::LargePool => homogeneous::compute_large_pool(&ctx)?,
                EngineKind::SemiAnalytic => semi_analytic::compute(&ctx)?,
                EngineKind::MonteCarlo => monte_carlo::compute(&ctx)?,
                EngineKind::ForwardLoss(inputs) => forward_loss::compute(&ctx, inputs)?,
            };
            Ok(Computed { grid, snapshots })
        })
    }

    fn interpolate(
        &mut self,
        date: Date,
        f: impl Fn(&Snapshot) -> f64,
    ) -> Result<f64, BasketError> {
        let computed = self.ensure()?;
        let b = computed.grid.bracket(date);
        let lo = f(&computed.snapshots[b.lower]);
        if b.upper == b.lower {
            return Ok(lo);
        }
        let hi = f(&computed.snapshots[b.upper]);
        Ok(lo + b.weight * (hi - lo))
    }

    // ========================================
    // Queries
    // ========================================

    /// Sum of included principals in input units.
    #[inline]
    pub fn total_principal(&self) -> f64 {
        self.pool.total_principal()
    }

    /// Number of included names.
    #[inline]
    pub fn count(&self) -> usize {
        self.pool.count()
    }

    /// Upper bound on the pool amortization fraction.
    #[inline]
    pub fn maximum_amortization_level(&self) -> f64 {
        self.pool.maximum_amortization_level()
    }

    /// Cache state.
    #[inline]
    pub fn state(&self) -> CacheState {
        if self.correlation.version() != self.seen_version && self.cache.is_fresh() {
            CacheState::Stale
        } else {
            self.cache.state()
        }
    }

    /// Computation strategy.
    #[inline]
    pub fn kind(&self) -> &EngineKind {
        &self.kind
    }

    /// The pool.
    #[inline]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Copula.
    #[inline]
    pub fn copula(&self) -> &Copula {
        &self.copula
    }

    /// Correlation handle driving the computation.
    #[inline]
    pub fn correlation(&self) -> &SharedCorrelation {
        &self.correlation
    }

    /// Base correlation awaiting tranche strikes, if one was supplied.
    #[inline]
    pub fn base_correlation(&self) -> Option<&SharedCorrelation> {
        self.base.as_ref()
    }

    /// Current configuration.
    #[inline]
    pub fn config(&self) -> &BasketConfig {
        &self.config
    }

    /// Final grid date.
    #[inline]
    pub fn maturity(&self) -> Date {
        self.maturity
    }

    /// Computation dates, starting at the portfolio start.
    pub fn grid_dates(&mut self) -> Result<Vec<Date>, BasketError> {
        Ok(self.ensure()?.grid.dates().to_vec())
    }

    /// Pool loss distribution at grid date `index`.
    pub fn loss_distribution(&mut self, index: usize) -> Result<LossDistribution, BasketError> {
        let computed = self.ensure()?;
        computed
            .snapshots
            .get(index)
            .map(|s| s.loss.clone())
            .ok_or(BasketError::ArgumentShape {
                what: "grid index",
                expected: computed.snapshots.len(),
                actual: index,
            })
    }

    /// Expected pool loss fraction by `date`.
    pub fn expected_loss(&mut self, date: Date) -> Result<f64, BasketError> {
        self.interpolate(date, |s| s.loss.mean())
    }

    /// Expected pool amortization fraction by `date`.
    pub fn expected_amortization(&mut self, date: Date) -> Result<f64, BasketError> {
        self.interpolate(date, |s| s.amortization.as_ref().map_or(0.0, LossDistribution::mean))
    }

    /// E[min(L, cap)] by `date`.
    pub fn expected_min_loss(&mut self, date: Date, cap: f64) -> Result<f64, BasketError> {
        self.interpolate(date, |s| s.loss.expected_min(cap))
    }

    /// E[min(A, cap)] by `date`.
    pub fn expected_min_amortization(&mut self, date: Date, cap: f64) -> Result<f64, BasketError> {
        self.interpolate(date, |s| s.amortization.as_ref().map_or(0.0, |a| a.expected_min(cap)))
    }

    /// Expected loss of `[attach, detach]` by `date`, as a fraction of its width.
    pub fn tranche_loss(
        &mut self,
        date: Date,
        attach: f64,
        detach: f64,
    ) -> Result<f64, BasketError> {
        check_slice(attach, detach)?;
        self.interpolate(date, |s| s.loss.tranche_loss(attach, detach))
    }

    /// Expected amortization of `[attach, detach]` by `date`, as a fraction of
    /// its width.
    pub fn tranche_amortization(
        &mut self,
        date: Date,
        attach: f64,
        detach: f64,
    ) -> Result<f64, BasketError> {
        check_slice(attach, detach)?;
        self.interpolate(date, |s| {
            s.amortization
                .as_ref()
                .map_or(0.0, |a| a.tranche_amortization(attach, detach))
        })
    }

    /// P(N(date) = k) for k = 0..=count.
    ///
    /// # Errors
    ///
    /// `UnsupportedCombination` for the large-pool strategy.
    pub fn default_count_distribution(&mut self, date: Date) -> Result<Vec<f64>, BasketError> {
        let name = self.kind.name();
        let computed = self.ensure()?;
        let b = computed.grid.bracket(date);
        let counts = |i: usize| {
            computed.snapshots[i].counts.as_ref().ok_or_else(|| {
                BasketError::UnsupportedCombination(format!(
                    "{name} engine has no default count distribution"
                ))
            })
        };
        let lo = counts(b.lower)?.probabilities();
        let hi = counts(b.upper)?.probabilities();
        Ok(lo.iter().zip(hi).map(|(l, h)| l + b.weight * (h - l)).collect())
    }

    /// P(N(date) ≥ n).
    pub fn nth_to_default_probability(&mut self, date: Date, n: usize) -> Result<f64, BasketError> {
        Ok(self.default_count_distribution(date)?.iter().skip(n).sum())
    }

    /// Grid and simulated default date indices per path (see
    /// [`monte_carlo::simulate_defaults`]); bypasses the cache.
    pub(crate) fn simulate_defaults(&mut self) -> Result<(TimeGrid, Vec<Vec<usize>>), BasketError> {
        if self.kind != EngineKind::MonteCarlo {
            return Err(BasketError::UnsupportedCombination(format!(
                "default paths from a {} engine",
                self.kind.name()
            )));
        }
        self.check_combination()?;
        let grid = self.time_grid()?;
        let model = self.correlation.snapshot();
        let ctx = ComputeContext {
            pool: &self.pool,
            copula: &self.copula,
            correlation: &model,
            grid: &grid,
            config: &self.config,
        };
        let paths = monte_carlo::simulate_defaults(&ctx)?;
        Ok((grid, paths))
    }

    // ========================================
    // Mutators
    // ========================================

    /// Date from which losses accumulate.
    pub fn set_portfolio_start(&mut self, date: Date) {
        self.config.portfolio_start = Some(date);
        self.invalidate();
    }

    /// Integration points per factor dimension (0 restores the sizer table).
    pub fn set_integration_points(&mut self, points: usize) -> Result<(), BasketError> {
        config::check_points(points)?;
        self.config.integration_points = Some(points);
        self.invalidate();
        Ok(())
    }

    /// Loss grid step.
    pub fn set_grid_size(&mut self, grid_size: f64) -> Result<(), BasketError> {
        config::check_grid_size(grid_size)?;
        self.config.grid_size = grid_size;
        self.invalidate();
        Ok(())
    }

    /// Monte Carlo seed.
    pub fn set_seed(&mut self, seed: i64) -> Result<(), BasketError> {
        config::check_seed(seed)?;
        self.config.seed = seed;
        self.invalidate();
        Ok(())
    }

    /// Monte Carlo sample size.
    pub fn set_sample_size(&mut self, n: usize) -> Result<(), BasketError> {
        config::check_sample_size(n)?;
        self.config.sample_size = Some(n);
        self.invalidate();
        Ok(())
    }

    /// Skip amortization tracking.
    pub fn set_no_amortization(&mut self, flag: bool) {
        if self.config.no_amortization != flag {
            self.config.no_amortization = flag;
            self.invalidate();
        }
    }

    /// Final grid date.
    pub fn set_maturity(&mut self, maturity: Date) {
        self.maturity = maturity;
        self.invalidate();
    }

    /// Extra computation dates (tranche maturities, payment dates).
    pub fn set_extra_dates(&mut self, dates: Vec<Date>) {
        self.extra_dates = dates;
        self.invalidate();
    }

    /// Swap in a correlation handle, sharing it with whoever else holds it.
    ///
    /// A base correlation handle replaces [`BasketPricer::base_correlation`]
    /// and leaves the concrete handle untouched.
    ///
    /// # Errors
    ///
    /// As for construction; the engine is unchanged on error.
    pub fn set_correlation(&mut self, handle: SharedCorrelation) -> Result<(), BasketError> {
        let names = self.pool.name_ids();
        let resolution = resolve(&CorrelationInput::Model(handle), &names, self.kind.target())?;
        if resolution.is_deferred() {
            self.base = Some(resolution.handle().clone());
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.correlation, resolution.handle().clone());
        if let Err(e) = self.check_combination() {
            self.correlation = previous;
            return Err(e);
        }
        self.seen_version = self.correlation.version();
        self.invalidate();
        Ok(())
    }

    /// Replace the copula.
    ///
    /// # Errors
    ///
    /// `UnsupportedCombination`; the engine is unchanged on error.
    pub fn set_copula(&mut self, copula: Copula) -> Result<(), BasketError> {
        let previous = std::mem::replace(&mut self.copula, copula);
        if let Err(e) = self.check_combination() {
            self.copula = previous;
            return Err(e);
        }
        self.invalidate();
        Ok(())
    }

    /// Replace the survival curve of the name at pool position `index`.
    pub fn set_curve(&mut self, index: usize, curve: SurvivalCurve) -> Result<(), BasketError> {
        self.pool.replace_curve(index, curve)?;
        self.invalidate();
        Ok(())
    }
}

fn build_grid(
    pool: &Pool,
    config: &BasketConfig,
    maturity: Date,
    extra: &[Date],
) -> Result<TimeGrid, BasketError> {
    TimeGridBuilder::new()
        .start(config.portfolio_start.unwrap_or_else(|| pool.as_of()))
        .maturity(maturity)
        .step(config.step)
        .dates(extra.iter().copied())
        .build()
}

fn check_slice(attach: f64, detach: f64) -> Result<(), BasketError> {
    if (0.0..1.0).contains(&attach) && attach < detach && detach <= 1.0 {
        Ok(())
    } else {
        Err(BasketError::InvalidParameter {
            name: "tranche bounds",
            value: format!("[{attach}, {detach}]"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use credit_core::market_data::curves::RecoveryCurve;
    use credit_models::correlation::BaseCorrelation;
    use credit_models::correlation::StrikeMethod;

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

    fn pricer(kind: EngineKind, rho: f64) -> BasketPricer {
        BasketPricer::new(
            kind,
            pool(10),
            Copula::gauss(),
            &CorrelationInput::Scalar(rho),
            maturity(),
            BasketConfig::default(),
        )
        .unwrap()
    }

    // ========================================
    // State machine
    // ========================================

    #[test]
    fn test_mutation_marks_stale() {
        let mut p = pricer(EngineKind::SemiAnalytic, 0.3);
        assert_eq!(p.state(), CacheState::Uninitialized);
        p.expected_loss(maturity()).unwrap();
        assert_eq!(p.state(), CacheState::Computed);

        p.set_grid_size(0.01).unwrap();
        assert_eq!(p.state(), CacheState::Stale);
        p.expected_loss(maturity()).unwrap();
        assert_eq!(p.state(), CacheState::Computed);

        assert!(p.set_grid_size(2.0).is_err());
        assert_eq!(p.state(), CacheState::Computed);
    }

    #[test]
    fn test_shared_correlation_version_detected() {
        let mut p = pricer(EngineKind::SemiAnalytic, 0.1);
        let low = p.tranche_loss(maturity(), 0.0, 0.03).unwrap();
        let names = p.pool().name_ids();
        p.correlation()
            .replace(CorrelationModel::single_factor(names, vec![0.9f64.sqrt(); 10]).unwrap());
        assert_eq!(p.state(), CacheState::Stale);
        let high = p.tranche_loss(maturity(), 0.0, 0.03).unwrap();
        assert!(high < low);
    }

    // ========================================
    // Strategy checks
    // ========================================

    #[test]
    fn test_unsupported_combinations() {
        let two_factor = CorrelationInput::Array(vec![0.3; 20]);
        assert!(matches!(
            BasketPricer::new(
                EngineKind::SemiAnalytic,
                pool(10),
                Copula::student_t(5.0).unwrap(),
                &two_factor,
                maturity(),
                BasketConfig::default(),
            ),
            Err(BasketError::UnsupportedCombination(_))
        ));
        assert!(matches!(
            BasketPricer::new(
                EngineKind::MonteCarlo,
                pool(10),
                Copula::new(CopulaFamily::Nig),
                &CorrelationInput::Scalar(0.3),
                maturity(),
                BasketConfig::default(),
            ),
            Err(BasketError::UnsupportedCombination(_))
        ));
        assert!(matches!(
            BasketPricer::new(
                EngineKind::SemiAnalytic,
                pool(10),
                Copula::new(CopulaFamily::Clayton).with_recovery_correlation(0.2).unwrap(),
                &CorrelationInput::Scalar(0.3),
                maturity(),
                BasketConfig::default(),
            ),
            Err(BasketError::UnsupportedCombination(_))
        ));
    }

    #[test]
    fn test_homogeneous_engines_refuse_recovery_correlation() {
        let copula = Copula::gauss().with_recovery_correlation(0.5).unwrap();
        for kind in [EngineKind::Uniform, EngineKind::LargePool] {
            assert!(matches!(
                BasketPricer::new(
                    kind.clone(),
                    pool(10),
                    copula.clone(),
                    &CorrelationInput::Scalar(0.3),
                    maturity(),
                    BasketConfig::default(),
                ),
                Err(BasketError::UnsupportedCombination(_))
            ));

            let mut p = pricer(kind, 0.3);
            assert!(p.set_copula(copula.clone()).is_err());
            assert!(p.copula().recovery_correlation().is_none());
        }
    }

    #[test]
    fn test_base_correlation_uses_placeholder() {
        let base =
            BaseCorrelation::new(vec![0.03, 0.07], vec![0.2, 0.3], StrikeMethod::Unscaled).unwrap();
        let p = BasketPricer::new(
            EngineKind::SemiAnalytic,
            pool(4),
            Copula::gauss(),
            &CorrelationInput::Base(base),
            maturity(),
            BasketConfig::default(),
        )
        .unwrap();
        assert!(p.base_correlation().is_some());
        let placeholder = CorrelationModel::zero_factor(p.pool().name_ids(), 1);
        assert_eq!(p.correlation().snapshot(), placeholder);
    }

    // ========================================
    // Queries
    // ========================================

    #[test]
    fn test_queries_before_start_and_interpolation() {
        let mut p = pricer(EngineKind::SemiAnalytic, 0.3);
        assert_eq!(p.expected_loss(Date::from_ymd(2020, 1, 1).unwrap()).unwrap(), 0.0);
        let dates = p.grid_dates().unwrap();
        assert_eq!(dates.len(), 21);
        let a = p.expected_loss(dates[4]).unwrap();
        let b = p.expected_loss(dates[5]).unwrap();
        let mid = dates[4].add_days((dates[5] - dates[4]) / 2).unwrap();
        let m = p.expected_loss(mid).unwrap();
        assert!(a <= m && m <= b);
    }

    #[test]
    fn test_amortization_from_recoveries() {
        let mut p = pricer(EngineKind::SemiAnalytic, 0.3);
        let el = p.expected_loss(maturity()).unwrap();
        let ea = p.expected_amortization(maturity()).unwrap();
        // recovered principal is 40/60 of lost principal
        assert_abs_diff_eq!(ea, el * 0.4 / 0.6, epsilon = 1e-9);

        p.set_no_amortization(true);
        assert_eq!(p.expected_amortization(maturity()).unwrap(), 0.0);
    }

    #[test]
    fn test_default_counts() {
        let mut p = pricer(EngineKind::SemiAnalytic, 0.0);
        let counts = p.default_count_distribution(maturity()).unwrap();
        assert_eq!(counts.len(), 11);
        assert_abs_diff_eq!(counts.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        let pd = p.pool().names()[0].curve().default_probability(maturity()).unwrap();
        assert_abs_diff_eq!(counts[0], (1.0 - pd).powi(10), epsilon = 1e-6);
        let first = p.nth_to_default_probability(maturity(), 1).unwrap();
        assert_abs_diff_eq!(first, 1.0 - counts[0], epsilon = 1e-12);

        let mut lp = pricer(EngineKind::LargePool, 0.3);
        assert!(matches!(
            lp.default_count_distribution(maturity()),
            Err(BasketError::UnsupportedCombination(_))
        ));
    }
}
