//! End-to-end pricing scenarios across engines, mappers and the factory.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
use credit_core::types::{Date, Tenor};
use credit_models::copula::Copula;
use credit_models::correlation::{
    BaseCorrelation, CorrelationInput, SharedCorrelation, StrikeMethod,
};
use credit_models::pool::Pool;
use credit_models::tranche::TrancheSlice;
use credit_pricing::engine::{BasketConfig, BasketPricer, CacheState, EngineKind, ForwardLossInputs};
use credit_pricing::factory::BasketPricerFactory;
use credit_pricing::tranche::{NthToDefault, PoolContext, TrancheLossMapper};

fn as_of() -> Date {
    Date::from_ymd(2024, 3, 20).unwrap()
}

fn maturity() -> Date {
    Date::from_ymd(2029, 3, 20).unwrap()
}

fn curves(n: usize) -> Vec<Option<SurvivalCurve>> {
    (0..n)
        .map(|i| {
            Some(
                SurvivalCurve::flat(format!("N{i}"), as_of(), 0.02)
                    .unwrap()
                    .with_recovery(RecoveryCurve::flat(as_of(), 0.4).unwrap()),
            )
        })
        .collect()
}

fn quarterly() -> BasketConfig {
    BasketConfig::builder().step(Tenor::quarterly()).build().unwrap()
}

fn engine(kind: EngineKind, rho: f64, config: BasketConfig) -> BasketPricer {
    BasketPricer::new(
        kind,
        Pool::from_curves(&curves(5), Some(&[1.0e7; 5])).unwrap(),
        Copula::gauss(),
        &CorrelationInput::Scalar(rho),
        maturity(),
        config,
    )
    .unwrap()
}

// ========================================
// Scenario A: mezzanine profile
// ========================================

#[test]
fn test_mezzanine_loss_profile() {
    let mut pricer = engine(EngineKind::SemiAnalytic, 0.3, quarterly());
    assert_abs_diff_eq!(pricer.total_principal(), 5.0e7, epsilon = 1e-6);
    assert_eq!(pricer.count(), 5);

    let dates = pricer.grid_dates().unwrap();
    assert_eq!(dates.len(), 21);
    let context = PoolContext::new(pricer, None);
    let mut mezz = TrancheLossMapper::new(context, TrancheSlice::new(0.03, 0.07).unwrap());

    let mut previous = 0.0;
    for date in dates {
        let el = mezz.expected_loss(date).unwrap();
        assert!(el >= previous - 1e-12, "{date}: {el} < {previous}");
        assert!(el <= 1.0);
        assert!(el * 0.04 <= 0.04);
        previous = el;
    }
    assert!(previous > 0.0);
}

// ========================================
// Scenario B: correlation moves risk out of equity
// ========================================

#[test]
fn test_equity_loss_lower_at_high_correlation() {
    let mut low = engine(EngineKind::SemiAnalytic, 0.0, quarterly());
    let mut high = engine(EngineKind::SemiAnalytic, 0.9, quarterly());
    let l = low.tranche_loss(maturity(), 0.0, 0.03).unwrap();
    let h = high.tranche_loss(maturity(), 0.0, 0.03).unwrap();
    assert!(h < l, "equity {h} at 0.9 vs {l} at 0");
}

// ========================================
// Scenario C: Monte Carlo seeds
// ========================================

#[test]
fn test_monte_carlo_seed_semantics() {
    let config = |seed| BasketConfig::builder().seed(seed).sample_size(3_000).build().unwrap();

    let mut a = engine(EngineKind::MonteCarlo, 0.3, config(42));
    let mut b = engine(EngineKind::MonteCarlo, 0.3, config(42));
    assert_eq!(
        a.tranche_loss(maturity(), 0.0, 0.1).unwrap(),
        b.tranche_loss(maturity(), 0.0, 0.1).unwrap()
    );

    let mut c = engine(EngineKind::MonteCarlo, 0.3, config(-1));
    let mut d = engine(EngineKind::MonteCarlo, 0.3, config(-1));
    assert_ne!(c.loss_distribution(20).unwrap(), d.loss_distribution(20).unwrap());
}

// ========================================
// Cache state machine
// ========================================

#[test]
fn test_state_machine_through_mutations() {
    let mut pricer = engine(EngineKind::SemiAnalytic, 0.3, quarterly());
    assert_eq!(pricer.state(), CacheState::Uninitialized);
    let before = pricer.expected_loss(maturity()).unwrap();
    assert_eq!(pricer.state(), CacheState::Computed);

    pricer.set_grid_size(0.01).unwrap();
    assert_eq!(pricer.state(), CacheState::Stale);
    let after = pricer.expected_loss(maturity()).unwrap();
    assert_eq!(pricer.state(), CacheState::Computed);
    // grid deposits preserve the mean
    assert_abs_diff_eq!(before, after, epsilon = 1e-12);

    pricer.set_portfolio_start(Date::from_ymd(2025, 3, 20).unwrap());
    assert_eq!(pricer.state(), CacheState::Stale);
    assert!(pricer.expected_loss(maturity()).unwrap() < after);
}

// ========================================
// Shared correlation and base correlation
// ========================================

#[test]
fn test_siblings_share_correlation_instance() {
    let strikes = vec![0.03, 0.07, 0.1];
    let base =
        BaseCorrelation::new(strikes, vec![0.15, 0.25, 0.35], StrikeMethod::ExpectedLoss).unwrap();
    let factory = BasketPricerFactory::new(Copula::gauss(), CorrelationInput::Base(base));
    let slices = [
        TrancheSlice::new(0.0, 0.03).unwrap(),
        TrancheSlice::new(0.03, 0.07).unwrap(),
        TrancheSlice::new(0.07, 0.1).unwrap(),
    ];
    let mut tranches = factory
        .build_tranches(&curves(5), Some(&[1.0e7]), &slices, maturity())
        .unwrap();
    for t in tranches.iter_mut() {
        let el = t.expected_loss(maturity()).unwrap();
        assert!((0.0..=1.0).contains(&el));
    }
    let first = tranches[0].correlation();
    assert!(tranches.iter().all(|t| SharedCorrelation::ptr_eq(&t.correlation(), &first)));
    assert!(Arc::ptr_eq(tranches[0].context(), tranches[2].context()));
}

#[test]
fn test_shared_handle_update_reaches_engine() {
    let handle = SharedCorrelation::new(
        credit_models::correlation::CorrelationModel::single_factor(
            Pool::from_curves(&curves(5), None).unwrap().name_ids(),
            vec![0.3_f64.sqrt(); 5],
        )
        .unwrap(),
    );
    let mut pricer = BasketPricer::new(
        EngineKind::SemiAnalytic,
        Pool::from_curves(&curves(5), None).unwrap(),
        Copula::gauss(),
        &CorrelationInput::Model(handle.clone()),
        maturity(),
        quarterly(),
    )
    .unwrap();
    let before = pricer.tranche_loss(maturity(), 0.0, 0.03).unwrap();
    handle.replace(
        credit_models::correlation::CorrelationModel::single_factor(
            pricer.pool().name_ids(),
            vec![0.9_f64.sqrt(); 5],
        )
        .unwrap(),
    );
    assert_eq!(pricer.state(), CacheState::Stale);
    assert!(pricer.tranche_loss(maturity(), 0.0, 0.03).unwrap() < before);
}

// ========================================
// Amortization fast path
// ========================================

#[test]
fn test_no_amortization_when_tranches_unreachable() {
    let context = PoolContext::new(engine(EngineKind::SemiAnalytic, 0.3, quarterly()), None);
    let slices = [
        TrancheSlice::new(0.0, 0.03).unwrap().amortizing(true),
        TrancheSlice::new(0.03, 0.07).unwrap().amortizing(true),
    ];
    // pool amortization tops out at the 40% recovery
    assert!(context.apply_no_amortization(&slices));
    let mut mezz = TrancheLossMapper::new(context.clone(), slices[1].clone());
    assert_eq!(mezz.expected_amortization(maturity()).unwrap(), 0.0);

    let senior = [TrancheSlice::new(0.1, 1.0).unwrap().amortizing(true)];
    let other = PoolContext::new(engine(EngineKind::SemiAnalytic, 0.3, quarterly()), None);
    assert!(!other.apply_no_amortization(&senior));
}

// ========================================
// Default counts
// ========================================

#[test]
fn test_nth_to_default_across_engines() {
    let semi = PoolContext::new(engine(EngineKind::SemiAnalytic, 0.3, quarterly()), None);
    let uniform = PoolContext::new(engine(EngineKind::Uniform, 0.3, quarterly()), None);
    for n in 1..=5 {
        let a = NthToDefault::new(semi.clone(), n).unwrap().probability(maturity()).unwrap();
        let b = NthToDefault::new(uniform.clone(), n).unwrap().probability(maturity()).unwrap();
        assert_abs_diff_eq!(a, b, epsilon = 1e-10);
    }
}

#[test]
fn test_forward_loss_independent_chain() {
    let inputs = ForwardLossInputs::homogeneous(5, 0.4);
    let mut chain = engine(EngineKind::ForwardLoss(inputs), 0.0, quarterly());
    let mut semi = engine(EngineKind::SemiAnalytic, 0.0, quarterly());
    let ftd_chain = chain.nth_to_default_probability(maturity(), 1).unwrap();
    let ftd_semi = semi.nth_to_default_probability(maturity(), 1).unwrap();
    assert!((ftd_chain - ftd_semi).abs() < 5e-3, "{ftd_chain} vs {ftd_semi}");
}
