//! Wiring of curves, correlation and copula into tranche pricers.
//!
//! [`BasketPricerFactory`] picks a computation strategy for the pool, sizes
//! its integration from the tranche detachments, and hands every tranche a
//! [`TrancheLossMapper`] on a shared [`PoolContext`]. Tranches that override
//! the copula's recovery correlation need a differently conditioned pool,
//! so they are grouped onto one context per override value.

use std::sync::Arc;

use credit_core::market_data::curves::{DiscountCurve, SurvivalCurve};
use credit_core::types::Date;
use credit_models::copula::{Copula, CopulaFamily};
use credit_models::correlation::{CorrelationInput, CorrelationModel, SharedCorrelation};
use credit_models::pool::Pool;
use credit_models::tranche::TrancheSlice;
use credit_models::{sizing, BasketError};
use tracing::{debug, info};

use crate::engine::config::MAX_INTEGRATION_POINTS;
use crate::engine::{BasketConfig, BasketPricer, EngineKind};
use crate::tranche::{PoolContext, TrancheLossMapper};

/// Relative tolerance under which name attributes count as identical.
const HOMOGENEITY_TOLERANCE: f64 = 1e-12;

/// Strategy for a pool and correlation input when none is forced.
///
/// A general pairwise matrix needs simulation. A pool of identical names on
/// a flat single factor is priced with the uniform binomial mixture unless
/// names refinance or recoveries are correlated. Everything else goes to the
/// semi-analytic strategy.
///
/// # Errors
///
/// Curve queries at `maturity`.
pub fn select_engine(
    pool: &Pool,
    copula: &Copula,
    correlation: &CorrelationInput,
    maturity: Date,
) -> Result<EngineKind, BasketError> {
    let general = match correlation {
        CorrelationInput::Model(handle) => {
            handle.read(|m| matches!(m, CorrelationModel::General { .. }))
        }
        _ => false,
    };
    if general {
        return Ok(EngineKind::MonteCarlo);
    }
    if copula.family() != CopulaFamily::Poisson
        && copula.recovery_correlation().is_none()
        && flat_single_factor(correlation)
        && !pool.has_refinance()
        && identical_names(pool, maturity)?
    {
        return Ok(EngineKind::Uniform);
    }
    Ok(EngineKind::SemiAnalytic)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= HOMOGENEITY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

fn all_close(values: &[f64]) -> bool {
    values.windows(2).all(|w| close(w[0], w[1]))
}

fn flat_single_factor(correlation: &CorrelationInput) -> bool {
    match correlation {
        CorrelationInput::Scalar(_) | CorrelationInput::Base(_) => true,
        CorrelationInput::Array(values) => all_close(values),
        CorrelationInput::Model(handle) => handle.read(|m| match m {
            CorrelationModel::Flat { .. } | CorrelationModel::Base(_) => true,
            CorrelationModel::SingleFactor { factors, .. } => all_close(factors),
            _ => false,
        }),
    }
}

fn identical_names(pool: &Pool, maturity: Date) -> Result<bool, BasketError> {
    let names = pool.names();
    let principals: Vec<f64> = names.iter().map(|n| n.scaled_principal()).collect();
    let recoveries: Vec<f64> = names.iter().map(|n| n.recovery_rate(maturity)).collect();
    let defaults = names
        .iter()
        .map(|n| n.curve().default_probability(maturity))
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(all_close(&principals) && all_close(&recoveries) && all_close(&defaults))
}

/// Builds pool engines and tranche mappers from raw deal inputs.
///
/// # Examples
///
/// ```rust
/// use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
/// use credit_core::types::Date;
/// use credit_models::copula::Copula;
/// use credit_models::correlation::CorrelationInput;
/// use credit_models::tranche::TrancheSlice;
/// use credit_pricing::factory::BasketPricerFactory;
///
/// let as_of = Date::from_ymd(2024, 3, 20).unwrap();
/// let maturity = Date::from_ymd(2029, 3, 20).unwrap();
/// let curves: Vec<_> = (0..5)
///     .map(|i| {
///         Some(
///             SurvivalCurve::flat(format!("N{i}"), as_of, 0.01 + 0.005 * i as f64)
///                 .unwrap()
///                 .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap()),
///         )
///     })
///     .collect();
///
/// let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Scalar(0.3));
/// let slices = [TrancheSlice::new(0.0, 0.03).unwrap(), TrancheSlice::new(0.03, 0.07).unwrap()];
/// let mut tranches = factory.build_tranches(&curves, None, &slices, maturity).unwrap();
///
/// let equity = tranches[0].expected_loss(maturity).unwrap();
/// let mezz = tranches[1].expected_loss(maturity).unwrap();
/// assert!(equity > mezz);
/// ```
#[derive(Debug, Clone)]
pub struct BasketPricerFactory {
    copula: Copula,
    correlation: CorrelationInput,
    config: BasketConfig,
    discount: Option<Arc<DiscountCurve>>,
    kind: Option<EngineKind>,
}

impl BasketPricerFactory {
    /// Factory with the default configuration and automatic strategy.
    pub fn new(copula: Copula, correlation: CorrelationInput) -> Self {
        Self {
            copula,
            correlation,
            config: BasketConfig::default(),
            discount: None,
            kind: None,
        }
    }

    /// Engine configuration.
    pub fn with_config(mut self, config: BasketConfig) -> Self {
        self.config = config;
        self
    }

    /// Discount curve for discounted base-correlation strikes.
    pub fn with_discount_curve(mut self, curve: DiscountCurve) -> Self {
        self.discount = Some(Arc::new(curve));
        self
    }

    /// Force a strategy instead of [`select_engine`].
    pub fn with_engine(mut self, kind: EngineKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Pool engine for `slices` (used for sizing and extra grid dates).
    ///
    /// Without explicit integration points the sizer table is raised by the
    /// detachment adjustment of the slices.
    ///
    /// # Errors
    ///
    /// Pool filtering, correlation resolution, strategy checks and
    /// configuration errors.
    pub fn build_engine(
        &self,
        curves: &[Option<SurvivalCurve>],
        principals: Option<&[f64]>,
        slices: &[TrancheSlice],
        maturity: Date,
    ) -> Result<BasketPricer, BasketError> {
        self.build_engine_with(
            self.copula.clone(),
            &self.correlation,
            curves,
            principals,
            slices,
            maturity,
        )
    }

    fn build_engine_with(
        &self,
        copula: Copula,
        correlation: &CorrelationInput,
        curves: &[Option<SurvivalCurve>],
        principals: Option<&[f64]>,
        slices: &[TrancheSlice],
        maturity: Date,
    ) -> Result<BasketPricer, BasketError> {
        let pool = Pool::from_curves(curves, principals)?;
        let maturity = slices
            .iter()
            .filter_map(TrancheSlice::maturity)
            .fold(maturity, Date::max);
        let kind = match &self.kind {
            Some(kind) => kind.clone(),
            None => select_engine(&pool, &copula, correlation, maturity)?,
        };

        let family = copula.family();
        let names = pool.count();
        let mut engine = BasketPricer::new(
            kind,
            pool,
            copula,
            correlation,
            maturity,
            self.config.clone(),
        )?;

        let extra: Vec<Date> = slices.iter().filter_map(TrancheSlice::maturity).collect();
        if !extra.is_empty() {
            engine.set_extra_dates(extra);
        }
        if self.config.integration_points().is_none() && family != CopulaFamily::Poisson {
            let detachments: Vec<f64> = slices.iter().map(TrancheSlice::detach).collect();
            let adjustment = sizing::detachment_adjustment(&detachments);
            if adjustment > 0 {
                let points =
                    (sizing::points(family, names) + adjustment).min(MAX_INTEGRATION_POINTS);
                engine.set_integration_points(points)?;
            }
        }
        debug!(
            engine = engine.kind().name(),
            names,
            points = ?engine.config().integration_points(),
            "pool engine built"
        );
        Ok(engine)
    }

    /// One mapper per slice, in input order.
    ///
    /// Slices sharing a recovery correlation override share one pool
    /// context; the no-amortization fast path is applied per context. All
    /// contexts read the same correlation handle.
    ///
    /// # Errors
    ///
    /// As for [`BasketPricerFactory::build_engine`], plus
    /// `UnsupportedCombination` when an override is applied to a copula
    /// that cannot carry it.
    pub fn build_tranches(
        &self,
        curves: &[Option<SurvivalCurve>],
        principals: Option<&[f64]>,
        slices: &[TrancheSlice],
        maturity: Date,
    ) -> Result<Vec<TrancheLossMapper>, BasketError> {
        let mut groups: Vec<(Option<f64>, Vec<usize>)> = Vec::new();
        for (i, slice) in slices.iter().enumerate() {
            let key = slice.recovery_correlation();
            let same = |k: &Option<f64>| k.map(f64::to_bits) == key.map(f64::to_bits);
            match groups.iter_mut().find(|(k, _)| same(k)) {
                Some((_, members)) => members.push(i),
                None => groups.push((key, vec![i])),
            }
        }

        // a bare base correlation becomes one handle for every group
        let correlation = match &self.correlation {
            CorrelationInput::Base(base) => CorrelationInput::Model(SharedCorrelation::new(
                CorrelationModel::Base(base.clone()),
            )),
            other => other.clone(),
        };

        let mut mappers: Vec<Option<TrancheLossMapper>> = (0..slices.len()).map(|_| None).collect();
        for (recovery_correlation, members) in &groups {
            let copula = match recovery_correlation {
                Some(c) => self.copula.clone().with_recovery_correlation(*c)?,
                None => self.copula.clone(),
            };
            let group: Vec<TrancheSlice> = members.iter().map(|&i| slices[i].clone()).collect();
            let engine =
                self.build_engine_with(copula, &correlation, curves, principals, &group, maturity)?;
            let context = PoolContext::new(engine, self.discount.clone());
            let skipped = context.apply_no_amortization(&group);
            info!(
                tranches = members.len(),
                recovery_correlation = ?recovery_correlation,
                no_amortization = skipped,
                "pool context ready"
            );
            for (&i, slice) in members.iter().zip(group) {
                mappers[i] = Some(TrancheLossMapper::new(Arc::clone(&context), slice));
            }
        }
        Ok(mappers.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_core::market_data::curves::RecoveryCurve;
    use credit_models::correlation::{BaseCorrelation, StrikeMethod};

    fn as_of() -> Date {
        Date::from_ymd(2024, 3, 20).unwrap()
    }

    fn maturity() -> Date {
        Date::from_ymd(2029, 3, 20).unwrap()
    }

    fn curves(hazards: &[f64]) -> Vec<Option<SurvivalCurve>> {
        hazards
            .iter()
            .enumerate()
            .map(|(i, &h)| {
                Some(
                    SurvivalCurve::flat(format!("N{i}"), as_of(), h)
                        .unwrap()
                        .with_recovery(RecoveryCurve::flat(as_of(), 0.4).unwrap()),
                )
            })
            .collect()
    }

    fn pool(hazards: &[f64]) -> Pool {
        Pool::from_curves(&curves(hazards), None).unwrap()
    }

    // ========================================
    // Strategy selection
    // ========================================

    #[test]
    fn test_identical_names_use_uniform() {
        let rho = CorrelationInput::Scalar(0.3);
        let kind = select_engine(&pool(&[0.02; 6]), &Copula::gauss(), &rho, maturity()).unwrap();
        assert_eq!(kind, EngineKind::Uniform);
    }

    #[test]
    fn test_heterogeneous_names_use_semi_analytic() {
        let kind = select_engine(
            &pool(&[0.01, 0.02, 0.03]),
            &Copula::gauss(),
            &CorrelationInput::Scalar(0.3),
            maturity(),
        )
        .unwrap();
        assert_eq!(kind, EngineKind::SemiAnalytic);

        let kind = select_engine(
            &pool(&[0.02; 3]),
            &Copula::gauss(),
            &CorrelationInput::Array(vec![0.3, 0.4, 0.5]),
            maturity(),
        )
        .unwrap();
        assert_eq!(kind, EngineKind::SemiAnalytic);
    }

    #[test]
    fn test_general_matrix_uses_monte_carlo() {
        let p = pool(&[0.02; 3]);
        let mut matrix = vec![0.2; 9];
        for i in 0..3 {
            matrix[i * 3 + i] = 1.0;
        }
        let general = CorrelationModel::general(p.name_ids(), matrix).unwrap();
        let input = CorrelationInput::Model(SharedCorrelation::new(general));
        let kind = select_engine(&p, &Copula::gauss(), &input, maturity()).unwrap();
        assert_eq!(kind, EngineKind::MonteCarlo);
    }

    #[test]
    fn test_recovery_correlation_leaves_uniform() {
        let hazards = [0.02; 10];
        let correlated = Copula::gauss().with_recovery_correlation(0.5).unwrap();
        let rho = CorrelationInput::Scalar(0.3);
        let kind = select_engine(&pool(&hazards), &correlated, &rho, maturity()).unwrap();
        assert_eq!(kind, EngineKind::SemiAnalytic);

        let mut engine = BasketPricerFactory::new(correlated.clone(), rho.clone())
            .build_engine(&curves(&hazards), None, &[], maturity())
            .unwrap();
        assert_eq!(engine.kind(), &EngineKind::SemiAnalytic);
        let mut plain = BasketPricerFactory::new(Copula::gauss(), rho.clone())
            .build_engine(&curves(&hazards), None, &[], maturity())
            .unwrap();
        assert_eq!(plain.kind(), &EngineKind::Uniform);

        let el = engine.expected_loss(maturity()).unwrap();
        let el_plain = plain.expected_loss(maturity()).unwrap();
        assert!((el - el_plain).abs() > 1e-4);

        let forced = BasketPricerFactory::new(correlated, rho)
            .with_engine(EngineKind::Uniform)
            .build_engine(&curves(&hazards), None, &[], maturity());
        assert!(matches!(forced, Err(BasketError::UnsupportedCombination(_))));
    }

    // ========================================
    // Sizing and grouping
    // ========================================

    #[test]
    fn test_detachment_adjustment_raises_points() {
        let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Scalar(0.3));
        // the thin slice just above 9% drives the adjustment: 30 - 0 - 1
        let slices = [
            TrancheSlice::new(0.0, 0.09).unwrap(),
            TrancheSlice::new(0.09, 0.1).unwrap(),
        ];
        let engine = factory
            .build_engine(&curves(&[0.01, 0.02, 0.03]), None, &slices, maturity())
            .unwrap();
        assert_eq!(sizing::detachment_adjustment(&[0.09, 0.1]), 29);
        let raised = sizing::points(CopulaFamily::Gauss, 3) + 29;
        assert_eq!(engine.config().integration_points(), Some(raised));

        // wide slices far from 9% keep the table value
        let senior = [TrancheSlice::new(0.3, 1.0).unwrap()];
        let engine = factory
            .build_engine(&curves(&[0.01, 0.02, 0.03]), None, &senior, maturity())
            .unwrap();
        assert_eq!(engine.config().integration_points(), None);
    }

    #[test]
    fn test_tranche_maturity_extends_engine() {
        let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Scalar(0.3));
        let late = Date::from_ymd(2031, 3, 20).unwrap();
        let slices = [TrancheSlice::new(0.0, 0.03).unwrap().with_maturity(late)];
        let engine = factory.build_engine(&curves(&[0.02; 4]), None, &slices, maturity()).unwrap();
        assert_eq!(engine.maturity(), late);
    }

    #[test]
    fn test_recovery_correlation_overrides_get_own_context() {
        let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Scalar(0.3));
        let slices = [
            TrancheSlice::new(0.0, 0.03).unwrap(),
            TrancheSlice::new(0.03, 0.07).unwrap().with_recovery_correlation(0.4).unwrap(),
            TrancheSlice::new(0.07, 0.1).unwrap(),
        ];
        let tranches = factory
            .build_tranches(&curves(&[0.01, 0.02, 0.03, 0.04]), None, &slices, maturity())
            .unwrap();
        assert_eq!(tranches.len(), 3);
        assert!(Arc::ptr_eq(tranches[0].context(), tranches[2].context()));
        assert!(!Arc::ptr_eq(tranches[0].context(), tranches[1].context()));
        assert_eq!(tranches[1].slice(), &slices[1]);
    }

    #[test]
    fn test_base_correlation_shared_across_contexts() {
        let base =
            BaseCorrelation::new(vec![0.03, 0.07], vec![0.2, 0.3], StrikeMethod::Unscaled).unwrap();
        let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Base(base));
        let slices = [
            TrancheSlice::new(0.0, 0.03).unwrap(),
            TrancheSlice::new(0.03, 0.07)
                .unwrap()
                .with_recovery_correlation(0.2)
                .unwrap(),
        ];
        let mut tranches = factory
            .build_tranches(&curves(&[0.01, 0.02, 0.03, 0.04]), None, &slices, maturity())
            .unwrap();
        assert!(!Arc::ptr_eq(tranches[0].context(), tranches[1].context()));

        let equity = tranches[0].expected_loss(maturity()).unwrap();
        let mezz = tranches[1].expected_loss(maturity()).unwrap();
        assert!(equity > mezz && mezz > 0.0);
        assert!(SharedCorrelation::ptr_eq(
            &tranches[0].correlation(),
            &tranches[1].correlation()
        ));

        // a refit through one tranche reaches the other context
        let steeper =
            BaseCorrelation::new(vec![0.03, 0.07], vec![0.5, 0.6], StrikeMethod::Unscaled).unwrap();
        tranches[0].correlation().replace(CorrelationModel::Base(steeper));
        let refit = tranches[1].expected_loss(maturity()).unwrap();
        assert!((refit - mezz).abs() > 1e-6);
    }

    #[test]
    fn test_non_amortizing_batch_skips_amortization() {
        let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Scalar(0.3));
        let slices = [
            TrancheSlice::new(0.0, 0.03).unwrap(),
            TrancheSlice::new(0.03, 0.07).unwrap(),
        ];
        let tranches = factory
            .build_tranches(&curves(&[0.02; 4]), None, &slices, maturity())
            .unwrap();
        assert!(tranches[0].context().read(|e| e.config().no_amortization()));
    }
}
