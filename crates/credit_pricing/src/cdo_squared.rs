//! CDO-squared: tranches of a portfolio of tranches.
//!
//! Every child CDO references a subset of one master pool of names through a
//! row of the principal matrix. Child tranche expected losses come from one
//! semi-analytic engine per child. The second-level loss needs the joint law
//! of child losses, so it is built from a master Monte Carlo simulation:
//! on each path the child pool losses `L_m` are sliced at the child
//! attach/detach points and aggregated with [`aggregate_losses`].
//!
//! # Subordination
//!
//! Without cross-subordination each child keeps its own subordination:
//!
//! ```text
//! X = Σₘ min(max(Lₘ − aₘTₘ, 0), (dₘ − aₘ)Tₘ)
//! ```
//!
//! With cross-subordination the children pool theirs:
//!
//! ```text
//! X = min(max(Σₘ Lₘ − Σₘ aₘTₘ, 0), Σₘ (dₘ − aₘ)Tₘ)
//! ```
//!
//! Both are normalised by `Σₘ (dₘ − aₘ)Tₘ`, the second-level notional.

use std::collections::HashMap;

use credit_core::market_data::curves::SurvivalCurve;
use credit_core::types::Date;
use credit_models::copula::Copula;
use credit_models::correlation::{CorrelationInput, CorrelationModel, SharedCorrelation};
use credit_models::pool::Pool;
use credit_models::schedule::TimeGrid;
use credit_models::tranche::TrancheSlice;
use credit_models::BasketError;
use tracing::debug;

use crate::distribution::LossDistribution;
use crate::engine::{BasketConfig, BasketPricer, Cache, CacheState, EngineKind};

/// Structure of a CDO-squared deal.
#[derive(Debug, Clone)]
pub struct CdoSquaredDeal {
    /// Master name curves; `None` entries are excluded everywhere.
    pub curves: Vec<Option<SurvivalCurve>>,
    /// One row per child, one column per master curve.
    pub principals: Vec<Vec<f64>>,
    /// Child attachment points.
    pub attachments: Vec<f64>,
    /// Child detachment points.
    pub detachments: Vec<f64>,
    /// Child maturities; children without one run to the deal maturity.
    pub maturities: Option<Vec<Date>>,
    /// Pool child subordination.
    pub cross_subordination: bool,
    /// Second-level tranche.
    pub tranche: TrancheSlice,
}

impl CdoSquaredDeal {
    fn validate(&self) -> Result<(), BasketError> {
        let children = self.attachments.len();
        if self.detachments.len() != children {
            return Err(BasketError::ArgumentShape {
                what: "detachments",
                expected: children,
                actual: self.detachments.len(),
            });
        }
        if self.principals.len() != children {
            return Err(BasketError::ArgumentShape {
                what: "principal rows",
                expected: children,
                actual: self.principals.len(),
            });
        }
        if let Some(row) = self.principals.iter().find(|row| row.len() != self.curves.len()) {
            return Err(BasketError::ArgumentShape {
                what: "principal columns",
                expected: self.curves.len(),
                actual: row.len(),
            });
        }
        if let Some(maturities) = &self.maturities {
            if maturities.len() != children {
                return Err(BasketError::ArgumentShape {
                    what: "child maturities",
                    expected: children,
                    actual: maturities.len(),
                });
            }
        }
        if children == 0 {
            return Err(BasketError::InvalidParameter {
                name: "children",
                value: "a CDO-squared needs at least one child".to_string(),
            });
        }
        Ok(())
    }
}

/// Aggregate second-level loss of one scenario.
///
/// `losses[m]` is the pool loss of child `m` and `totals[m]` its notional,
/// in the same units. Returns a fraction of `Σ (dₘ − aₘ)Tₘ`; zero when that
/// notional is zero.
///
/// # Examples
///
/// ```
/// use credit_pricing::cdo_squared::aggregate_losses;
///
/// let (a, d, t) = ([0.1, 0.1], [0.2, 0.2], [100.0, 100.0]);
/// // child 0 is wiped out, child 1 is untouched
/// let losses = [25.0, 5.0];
/// assert!((aggregate_losses(&losses, &a, &d, &t, false) - 0.5).abs() < 1e-12);
/// // pooled: 30 − 20 = 10 of a 20 notional
/// assert!((aggregate_losses(&losses, &a, &d, &t, true) - 0.5).abs() < 1e-12);
/// ```
pub fn aggregate_losses(
    losses: &[f64],
    attach: &[f64],
    detach: &[f64],
    totals: &[f64],
    cross_subordination: bool,
) -> f64 {
    let width: f64 = attach
        .iter()
        .zip(detach)
        .zip(totals)
        .map(|((a, d), t)| (d - a) * t)
        .sum();
    if width <= 0.0 {
        return 0.0;
    }
    let absorbed = if cross_subordination {
        let subordination: f64 = attach.iter().zip(totals).map(|(a, t)| a * t).sum();
        (losses.iter().sum::<f64>() - subordination).clamp(0.0, width)
    } else {
        losses
            .iter()
            .zip(attach.iter().zip(detach))
            .zip(totals)
            .map(|((l, (a, d)), t)| (l - a * t).clamp(0.0, (d - a) * t))
            .sum()
    };
    absorbed / width
}

#[derive(Debug)]
struct Child {
    engine: BasketPricer,
    attach: f64,
    detach: f64,
    total: f64,
    maturity: Option<Date>,
    /// Principal per master pool position, input units.
    principals: Vec<f64>,
}

#[derive(Debug, Clone)]
struct SecondLevel {
    grid: TimeGrid,
    distributions: Vec<LossDistribution>,
}

/// CDO-squared pricer.
///
/// Correlation input may be a scalar, a flat loading array, a factor model
/// over the master names or a base correlation; a base correlation is read
/// at the second-level detachment without strike scaling.
#[derive(Debug)]
pub struct CdoSquared {
    master: BasketPricer,
    children: Vec<Child>,
    cross_subordination: bool,
    tranche: TrancheSlice,
    grid_size: f64,
    cache: Cache<SecondLevel>,
}

impl CdoSquared {
    /// Build the child engines and the master simulation.
    ///
    /// # Errors
    ///
    /// * `ArgumentShape` - Deal arrays that do not line up
    /// * `UnsupportedCombination` - Copula not available in simulation, or a
    ///   correlation that cannot be restricted to the children
    /// * Any error from building the pools or engines
    pub fn new(
        deal: CdoSquaredDeal,
        copula: Copula,
        correlation: &CorrelationInput,
        maturity: Date,
        config: BasketConfig,
    ) -> Result<Self, BasketError> {
        deal.validate()?;
        let input = concrete_input(correlation, &deal.tranche);

        let master_pool = Pool::from_curves(&deal.curves, None)?;
        let position: HashMap<usize, usize> = master_pool
            .names()
            .iter()
            .enumerate()
            .map(|(k, name)| (name.source_index(), k))
            .collect();
        let mut master = BasketPricer::new(
            EngineKind::MonteCarlo,
            master_pool,
            copula.clone(),
            &input,
            maturity,
            config.clone(),
        )?;
        if let Some(maturities) = &deal.maturities {
            master.set_extra_dates(maturities.iter().copied().filter(|d| *d < maturity).collect());
        }
        let master_model = master.correlation().snapshot();

        let mut children = Vec::with_capacity(deal.attachments.len());
        for (m, row) in deal.principals.iter().enumerate() {
            let slice = TrancheSlice::new(deal.attachments[m], deal.detachments[m])?;
            let child_maturity = deal.maturities.as_ref().map(|ms| ms[m]);
            let pool = Pool::from_curves(&deal.curves, Some(row))?;
            let rows: Vec<usize> = pool
                .names()
                .iter()
                .filter_map(|name| position.get(&name.source_index()).copied())
                .collect();
            let child_input =
                restrict(&master_model, master.count(), &rows, pool.name_ids(), maturity)?;
            let total = pool.total_principal();
            let engine = BasketPricer::new(
                EngineKind::SemiAnalytic,
                pool,
                copula.clone(),
                &child_input,
                child_maturity.unwrap_or(maturity),
                config.clone(),
            )?;

            let mut principals = vec![0.0; position.len()];
            for (&source, &k) in &position {
                principals[k] = row[source];
            }
            children.push(Child {
                engine,
                attach: slice.attach(),
                detach: slice.detach(),
                total,
                maturity: child_maturity,
                principals,
            });
        }

        debug!(
            children = children.len(),
            names = master.count(),
            cross_subordination = deal.cross_subordination,
            "CDO-squared constructed"
        );
        Ok(Self {
            master,
            children,
            cross_subordination: deal.cross_subordination,
            tranche: deal.tranche,
            grid_size: config.grid_size(),
            cache: Cache::default(),
        })
    }

    /// Number of children.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Cache state of the second-level distribution.
    #[inline]
    pub fn state(&self) -> CacheState {
        self.cache.state()
    }

    /// Expected loss of child `m`'s tranche by `date`, as a fraction of its
    /// width, frozen after the child's maturity.
    pub fn child_expected_loss(&mut self, m: usize, date: Date) -> Result<f64, BasketError> {
        let count = self.children.len();
        let child = self.children.get_mut(m).ok_or(BasketError::ArgumentShape {
            what: "child index",
            expected: count,
            actual: m,
        })?;
        let date = child.maturity.map_or(date, |mat| date.min(mat));
        child.engine.tranche_loss(date, child.attach, child.detach)
    }

    /// Master simulation seed.
    pub fn set_seed(&mut self, seed: i64) -> Result<(), BasketError> {
        self.master.set_seed(seed)?;
        self.cache.invalidate();
        Ok(())
    }

    /// Master simulation paths.
    pub fn set_sample_size(&mut self, n: usize) -> Result<(), BasketError> {
        self.master.set_sample_size(n)?;
        self.cache.invalidate();
        Ok(())
    }

    /// Switch between separate and pooled child subordination.
    pub fn set_cross_subordination(&mut self, flag: bool) {
        if self.cross_subordination != flag {
            self.cross_subordination = flag;
            self.cache.invalidate();
        }
    }

    /// Expected second-level loss fraction by `date`.
    pub fn expected_pool_loss(&mut self, date: Date) -> Result<f64, BasketError> {
        self.interpolate(date, LossDistribution::mean)
    }

    /// Expected loss of the second-level tranche by `date`, as a fraction of
    /// its width.
    pub fn expected_loss(&mut self, date: Date) -> Result<f64, BasketError> {
        let (a, d) = (self.tranche.attach(), self.tranche.detach());
        self.interpolate(date, |dist| dist.tranche_loss(a, d))
    }

    /// Second-level loss distribution at grid date `index`.
    pub fn loss_distribution(&mut self, index: usize) -> Result<LossDistribution, BasketError> {
        let second = self.ensure()?;
        second.distributions.get(index).cloned().ok_or(BasketError::ArgumentShape {
            what: "grid index",
            expected: second.distributions.len(),
            actual: index,
        })
    }

    fn interpolate(
        &mut self,
        date: Date,
        f: impl Fn(&LossDistribution) -> f64,
    ) -> Result<f64, BasketError> {
        let second = self.ensure()?;
        let b = second.grid.bracket(date);
        let lo = f(&second.distributions[b.lower]);
        if b.upper == b.lower {
            return Ok(lo);
        }
        let hi = f(&second.distributions[b.upper]);
        Ok(lo + b.weight * (hi - lo))
    }

    fn ensure(&mut self) -> Result<&SecondLevel, BasketError> {
        let Self {
            master,
            children,
            cross_subordination,
            grid_size,
            cache,
            ..
        } = self;
        cache.get_or_try_store(|| simulate(master, children, *cross_subordination, *grid_size))
    }
}

/// Second-level distributions from the master default paths.
fn simulate(
    master: &mut BasketPricer,
    children: &[Child],
    cross_subordination: bool,
    grid_size: f64,
) -> Result<SecondLevel, BasketError> {
    let (grid, paths) = master.simulate_defaults()?;
    let dates = &grid.dates()[1..];
    // recovery of each name at each grid date, indexed [date][name]
    let recoveries: Vec<Vec<f64>> = dates
        .iter()
        .map(|&date| {
            master
                .pool()
                .names()
                .iter()
                .map(|name| name.recovery_rate(date))
                .collect()
        })
        .collect();
    // number of grid dates a child lives through
    let reach: Vec<usize> = children
        .iter()
        .map(|c| {
            c.maturity
                .map_or(dates.len(), |mat| dates.partition_point(|d| *d <= mat))
        })
        .collect();
    let attach: Vec<f64> = children.iter().map(|c| c.attach).collect();
    let detach: Vec<f64> = children.iter().map(|c| c.detach).collect();
    let totals: Vec<f64> = children.iter().map(|c| c.total).collect();
    debug!(paths = paths.len(), dates = dates.len(), "aggregating child losses");

    let mut by_date = vec![LossDistribution::zeros(grid_size)?; dates.len()];
    let weight = 1.0 / paths.len().max(1) as f64;
    let mut losses = vec![0.0; children.len()];
    for default_index in &paths {
        for (d, dist) in by_date.iter_mut().enumerate() {
            for (m, child) in children.iter().enumerate() {
                let horizon = (d + 1).min(reach[m]);
                losses[m] = default_index
                    .iter()
                    .enumerate()
                    .filter(|(_, &idx)| idx < horizon)
                    .map(|(k, &idx)| child.principals[k] * (1.0 - recoveries[idx][k]))
                    .sum();
            }
            let total = aggregate_losses(&losses, &attach, &detach, &totals, cross_subordination);
            dist.deposit(weight, total);
        }
    }

    let mut distributions = Vec::with_capacity(grid.len());
    distributions.push(LossDistribution::new(grid_size)?);
    distributions.extend(by_date);
    Ok(SecondLevel { grid, distributions })
}

/// Replace a base correlation by its value at the second-level detachment.
fn concrete_input(input: &CorrelationInput, tranche: &TrancheSlice) -> CorrelationInput {
    let at_detach = |model: &CorrelationModel| match model {
        CorrelationModel::Base(bc) => Some(bc.correlation_at(tranche.detach())),
        _ => None,
    };
    match input {
        CorrelationInput::Base(bc) => CorrelationInput::Scalar(bc.correlation_at(tranche.detach())),
        CorrelationInput::Model(handle) => match handle.read(at_detach) {
            Some(rho) => CorrelationInput::Scalar(rho),
            None => input.clone(),
        },
        other => other.clone(),
    }
}

/// Factor loadings of the master names at `rows`, as a correlation for a
/// child pool.
fn restrict(
    master: &CorrelationModel,
    master_count: usize,
    rows: &[usize],
    names: Vec<String>,
    date: Date,
) -> Result<CorrelationInput, BasketError> {
    if matches!(master, CorrelationModel::General { .. }) {
        return Err(BasketError::UnsupportedCombination(
            "general correlation matrix for CDO-squared children".to_string(),
        ));
    }
    let loadings = master.loadings_at(date, master_count)?;
    let selected = loadings.select(rows);
    let k = selected.n_factors();
    let flat: Vec<f64> = (0..selected.n_names()).flat_map(|i| selected.row(i).to_vec()).collect();
    let model = if k == 1 {
        CorrelationModel::single_factor(names, flat)?
    } else {
        CorrelationModel::multi_factor(names, k, flat)?
    };
    Ok(CorrelationInput::Model(SharedCorrelation::new(model)))
}
