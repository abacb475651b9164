//! Tranche loss mapping over a shared pool engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use credit_core::market_data::curves::DiscountCurve;
use credit_core::types::Date;
use credit_models::correlation::{CorrelationModel, SharedCorrelation, StrikeMethod};
use credit_models::tranche::{minimum_amortization_level, TrancheSlice};
use credit_models::BasketError;
use tracing::debug;

use crate::engine::BasketPricer;

/// One pool engine shared by sibling tranches.
///
/// The context owns the engine behind a mutex and remembers the first base
/// correlation handle a tranche resolved, so that every later sibling
/// adopts the same instance.
#[derive(Debug)]
pub struct PoolContext {
    engine: Mutex<BasketPricer>,
    published: Mutex<Option<SharedCorrelation>>,
    generation: AtomicU64,
    discount: Option<Arc<DiscountCurve>>,
}

impl PoolContext {
    /// Wrap an engine; `discount` is needed only for discounted strike
    /// scaling.
    pub fn new(engine: BasketPricer, discount: Option<Arc<DiscountCurve>>) -> Arc<Self> {
        Arc::new(Self {
            engine: Mutex::new(engine),
            published: Mutex::new(None),
            generation: AtomicU64::new(0),
            discount,
        })
    }

    fn lock(&self) -> MutexGuard<'_, BasketPricer> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the engine without changing it.
    pub fn read<R>(&self, f: impl FnOnce(&mut BasketPricer) -> R) -> R {
        f(&mut self.lock())
    }

    /// Mutate the engine; cached tranche values are dropped.
    pub fn update<R>(&self, f: impl FnOnce(&mut BasketPricer) -> R) -> R {
        let out = f(&mut self.lock());
        self.generation.fetch_add(1, Ordering::AcqRel);
        out
    }

    /// Mutation counter of [`PoolContext::update`].
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Discount curve for strike scaling.
    #[inline]
    pub fn discount_curve(&self) -> Option<&Arc<DiscountCurve>> {
        self.discount.as_ref()
    }

    /// Base correlation handle published by the first tranche that
    /// resolved one.
    pub fn published(&self) -> Option<SharedCorrelation> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish_or_adopt(&self, handle: SharedCorrelation) -> SharedCorrelation {
        let mut slot = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert(handle).clone()
    }

    /// Skip amortization tracking when no tranche in `slices` can be
    /// reached by pool amortization.
    ///
    /// Returns whether the flag was set.
    pub fn apply_no_amortization(&self, slices: &[TrancheSlice]) -> bool {
        let floor = minimum_amortization_level(slices);
        self.update(|engine| {
            let skip = engine.maximum_amortization_level() <= floor;
            if skip {
                debug!(
                    max_amortization = engine.maximum_amortization_level(),
                    floor, "amortization tracking disabled"
                );
                engine.set_no_amortization(true);
            }
            skip
        })
    }
}

/// Strike bits, amortization side, base version, context generation, date.
type CacheKey = (u64, bool, u64, u64, Date);

/// Expected loss and amortization of one tranche slice.
///
/// # Examples
///
/// ```rust
/// use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
/// use credit_core::types::Date;
/// use credit_models::copula::Copula;
/// use credit_models::correlation::CorrelationInput;
/// use credit_models::pool::Pool;
/// use credit_models::tranche::TrancheSlice;
/// use credit_pricing::engine::{BasketConfig, BasketPricer, EngineKind};
/// use credit_pricing::tranche::{PoolContext, TrancheLossMapper};
///
/// let as_of = Date::from_ymd(2024, 3, 20).unwrap();
/// let maturity = Date::from_ymd(2029, 3, 20).unwrap();
/// let curves: Vec<_> = (0..5)
///     .map(|i| {
///         Some(
///             SurvivalCurve::flat(format!("N{i}"), as_of, 0.02)
///                 .unwrap()
///                 .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap()),
///         )
///     })
///     .collect();
/// let engine = BasketPricer::new(
///     EngineKind::SemiAnalytic,
///     Pool::from_curves(&curves, None).unwrap(),
///     Copula::gauss(),
///     &CorrelationInput::Scalar(0.3),
///     maturity,
///     BasketConfig::default(),
/// )
/// .unwrap();
///
/// let context = PoolContext::new(engine, None);
/// let mut mezz = TrancheLossMapper::new(context, TrancheSlice::new(0.03, 0.07).unwrap());
/// let el = mezz.expected_loss(maturity).unwrap();
/// assert!(el > 0.0 && el <= 1.0);
/// ```
#[derive(Debug)]
pub struct TrancheLossMapper {
    context: Arc<PoolContext>,
    slice: TrancheSlice,
    base: Option<SharedCorrelation>,
    adopted: bool,
    cache: HashMap<CacheKey, f64>,
}

impl TrancheLossMapper {
    /// Map `slice` against the pool engine in `context`.
    pub fn new(context: Arc<PoolContext>, slice: TrancheSlice) -> Self {
        let base = context.read(|engine| engine.base_correlation().cloned());
        Self {
            context,
            slice,
            base,
            adopted: false,
            cache: HashMap::new(),
        }
    }

    /// The slice.
    #[inline]
    pub fn slice(&self) -> &TrancheSlice {
        &self.slice
    }

    /// Shared pool context.
    #[inline]
    pub fn context(&self) -> &Arc<PoolContext> {
        &self.context
    }

    /// Correlation handle in use: the base correlation when there is one,
    /// otherwise the pool engine's handle.
    pub fn correlation(&self) -> SharedCorrelation {
        match &self.base {
            Some(base) => base.clone(),
            None => self.context.read(|engine| engine.correlation().clone()),
        }
    }

    /// Expected tranche loss by `date` as a fraction of the tranche width.
    pub fn expected_loss(&mut self, date: Date) -> Result<f64, BasketError> {
        let (a, d) = (self.slice.attach(), self.slice.detach());
        if self.base.is_none() {
            return self.context.read(|engine| engine.tranche_loss(date, a, d));
        }
        let upper = self.base_expected_min(date, d, false)?;
        let lower = self.base_expected_min(date, a, false)?;
        Ok((upper - lower) / (d - a))
    }

    /// Expected tranche amortization by `date` as a fraction of the
    /// tranche width; zero for slices that do not amortize.
    pub fn expected_amortization(&mut self, date: Date) -> Result<f64, BasketError> {
        if !self.slice.amortizes() {
            return Ok(0.0);
        }
        let (a, d) = (self.slice.attach(), self.slice.detach());
        if self.base.is_none() {
            return self.context.read(|engine| engine.tranche_amortization(date, a, d));
        }
        let upper = self.base_expected_min(date, a, true)?;
        let lower = self.base_expected_min(date, d, true)?;
        Ok((upper - lower) / (d - a))
    }

    fn adopt(&mut self) -> Option<SharedCorrelation> {
        if !self.adopted {
            if let Some(own) = self.base.take() {
                self.base = Some(self.context.publish_or_adopt(own));
            }
            self.adopted = true;
        }
        self.base.clone()
    }

    /// E[min(L, k)] (or E[min(A, 1 − k)]) at the base correlation for strike `k`.
    fn base_expected_min(
        &mut self,
        date: Date,
        strike: f64,
        amortization: bool,
    ) -> Result<f64, BasketError> {
        let Some(base) = self.adopt() else {
            return Err(BasketError::InvalidCorrelationInput("no base correlation".to_string()));
        };
        let key = (strike.to_bits(), amortization, base.version(), self.context.generation(), date);
        if let Some(v) = self.cache.get(&key) {
            return Ok(*v);
        }

        let slice_maturity = self.slice.maturity();
        let discount = self.context.discount_curve().cloned();
        let value = self.context.read(|engine| -> Result<f64, BasketError> {
            let (curve, method) = base.read(|m| match m {
                CorrelationModel::Base(bc) => Ok((bc.clone(), bc.method())),
                other => Err(BasketError::InvalidCorrelationInput(format!(
                    "{} correlation where a base correlation was expected",
                    other.kind()
                ))),
            })?;
            let maturity = slice_maturity.unwrap_or_else(|| engine.maturity());
            let scaled = if strike <= 0.0 {
                0.0
            } else {
                strike / strike_scale(engine, method, maturity, discount.as_deref())?
            };
            let rho = curve.correlation_at(scaled);
            let names = engine.pool().name_ids();
            let n = names.len();
            engine
                .correlation()
                .replace(CorrelationModel::single_factor(names, vec![rho.sqrt(); n])?);
            debug!(strike, scaled, rho, "base correlation resolved");
            if amortization {
                engine.expected_min_amortization(date, 1.0 - strike)
            } else {
                engine.expected_min_loss(date, strike)
            }
        })?;
        self.cache.insert(key, value);
        Ok(value)
    }
}

/// Denominator applied to a strike before the base correlation lookup.
fn strike_scale(
    engine: &mut BasketPricer,
    method: StrikeMethod,
    maturity: Date,
    discount: Option<&DiscountCurve>,
) -> Result<f64, BasketError> {
    let scale = match method {
        StrikeMethod::Unscaled => return Ok(1.0),
        StrikeMethod::ExpectedLoss => engine.expected_loss(maturity)?,
        StrikeMethod::DiscountedExpectedLoss => {
            let discount = discount.ok_or(BasketError::MissingDiscountCurve)?;
            let mut total = 0.0;
            let mut previous = 0.0;
            for date in engine.grid_dates()?.into_iter().filter(|d| *d <= maturity).skip(1) {
                let el = engine.expected_loss(date)?;
                total += discount.discount_factor(date)? * (el - previous);
                previous = el;
            }
            total
        }
    };
    if scale > 0.0 {
        Ok(scale)
    } else {
        Err(BasketError::InvalidParameter {
            name: "strike scale",
            value: format!("pool expected loss {scale} is not positive"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BasketConfig, EngineKind};
    use approx::assert_abs_diff_eq;
    use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
    use credit_models::copula::Copula;
    use credit_models::correlation::{BaseCorrelation, CorrelationInput};
    use credit_models::pool::Pool;

    fn as_of() -> Date {
        Date::from_ymd(2024, 3, 20).unwrap()
    }

    fn maturity() -> Date {
        Date::from_ymd(2029, 3, 20).unwrap()
    }

    fn engine(correlation: &CorrelationInput) -> BasketPricer {
        let curves: Vec<_> = (0..10)
            .map(|i| {
                Some(
                    SurvivalCurve::flat(format!("N{i}"), as_of(), 0.02)
                        .unwrap()
                        .with_recovery(RecoveryCurve::flat(as_of(), 0.4).unwrap()),
                )
            })
            .collect();
        BasketPricer::new(
            EngineKind::SemiAnalytic,
            Pool::from_curves(&curves, None).unwrap(),
            Copula::gauss(),
            correlation,
            maturity(),
            BasketConfig::default(),
        )
        .unwrap()
    }

    fn base(method: StrikeMethod) -> CorrelationInput {
        let strikes = vec![0.03, 0.07, 0.15];
        CorrelationInput::Base(BaseCorrelation::new(strikes, vec![0.2, 0.3, 0.4], method).unwrap())
    }

    // ========================================
    // Plain correlation
    // ========================================

    #[test]
    fn test_tranche_loss_bounded_and_non_decreasing() {
        let context = PoolContext::new(engine(&CorrelationInput::Scalar(0.3)), None);
        let mezz = TrancheSlice::new(0.03, 0.07).unwrap();
        let mut mapper = TrancheLossMapper::new(context.clone(), mezz);
        let dates = context.read(|e| e.grid_dates()).unwrap();
        let mut previous = 0.0;
        for date in dates {
            let el = mapper.expected_loss(date).unwrap();
            assert!(el >= previous - 1e-12 && el <= 1.0);
            previous = el;
        }
    }

    #[test]
    fn test_non_amortizing_slice() {
        let context = PoolContext::new(engine(&CorrelationInput::Scalar(0.3)), None);
        let slice = TrancheSlice::new(0.1, 1.0).unwrap();
        let mut plain = TrancheLossMapper::new(context.clone(), slice.clone());
        assert_eq!(plain.expected_amortization(maturity()).unwrap(), 0.0);
        let mut senior = TrancheLossMapper::new(context, slice.amortizing(true));
        assert!(senior.expected_amortization(maturity()).unwrap() > 0.0);
    }

    #[test]
    fn test_no_amortization_fast_path() {
        let context = PoolContext::new(engine(&CorrelationInput::Scalar(0.3)), None);
        // max amortization 0.4 reaches the 0.3-1.0 senior tranche
        let senior = TrancheSlice::new(0.3, 1.0).unwrap().amortizing(true);
        assert!(!context.apply_no_amortization(&[senior]));
        assert!(!context.read(|e| e.config().no_amortization()));
        // junior tranches start amortizing at 1 - detach = 0.9
        assert!(context.apply_no_amortization(&[
            TrancheSlice::new(0.0, 0.03).unwrap().amortizing(true),
            TrancheSlice::new(0.03, 0.1).unwrap().amortizing(true),
        ]));
        assert!(context.read(|e| e.config().no_amortization()));
    }

    // ========================================
    // Base correlation
    // ========================================

    #[test]
    fn test_unscaled_base_matches_flat_at_strike() {
        let context = PoolContext::new(engine(&base(StrikeMethod::Unscaled)), None);
        let mut equity = TrancheLossMapper::new(context, TrancheSlice::new(0.0, 0.07).unwrap());
        let base_el = equity.expected_loss(maturity()).unwrap();

        let flat = PoolContext::new(engine(&CorrelationInput::Scalar(0.3)), None);
        let mut reference = TrancheLossMapper::new(flat, TrancheSlice::new(0.0, 0.07).unwrap());
        assert_abs_diff_eq!(base_el, reference.expected_loss(maturity()).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_siblings_share_published_handle() {
        let context = PoolContext::new(engine(&base(StrikeMethod::ExpectedLoss)), None);
        let mut a = TrancheLossMapper::new(context.clone(), TrancheSlice::new(0.0, 0.03).unwrap());
        let mut b = TrancheLossMapper::new(context.clone(), TrancheSlice::new(0.03, 0.07).unwrap());
        a.expected_loss(maturity()).unwrap();
        b.expected_loss(maturity()).unwrap();
        assert!(SharedCorrelation::ptr_eq(&a.correlation(), &b.correlation()));
        assert!(SharedCorrelation::ptr_eq(&a.correlation(), &context.published().unwrap()));
    }

    #[test]
    fn test_base_refit_visible_to_siblings() {
        let context = PoolContext::new(engine(&base(StrikeMethod::Unscaled)), None);
        let mut a = TrancheLossMapper::new(context.clone(), TrancheSlice::new(0.0, 0.03).unwrap());
        let before = a.expected_loss(maturity()).unwrap();
        a.correlation()
            .update(|m| match m {
                CorrelationModel::Base(bc) => bc.set_correlations(vec![0.8, 0.8, 0.8]),
                _ => Ok(()),
            })
            .unwrap();
        let after = a.expected_loss(maturity()).unwrap();
        assert!(after < before);
    }

    #[test]
    fn test_discounted_scaling_requires_curve() {
        let context = PoolContext::new(engine(&base(StrikeMethod::DiscountedExpectedLoss)), None);
        let mut mapper = TrancheLossMapper::new(context, TrancheSlice::new(0.03, 0.07).unwrap());
        assert_eq!(mapper.expected_loss(maturity()), Err(BasketError::MissingDiscountCurve));

        let discounted = PoolContext::new(
            engine(&base(StrikeMethod::DiscountedExpectedLoss)),
            Some(Arc::new(DiscountCurve::flat(as_of(), 0.03))),
        );
        let mut mapper = TrancheLossMapper::new(discounted, TrancheSlice::new(0.03, 0.07).unwrap());
        let el = mapper.expected_loss(maturity()).unwrap();
        assert!(el > 0.0 && el < 1.0);
    }
}
