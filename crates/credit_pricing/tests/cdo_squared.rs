//! CDO-squared aggregation over overlapping child pools.

use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
use credit_core::types::Date;
use credit_models::copula::Copula;
use credit_models::correlation::CorrelationInput;
use credit_models::tranche::TrancheSlice;
use credit_models::BasketError;
use credit_pricing::cdo_squared::{aggregate_losses, CdoSquared, CdoSquaredDeal};
use credit_pricing::engine::BasketConfig;
use proptest::prelude::*;

fn as_of() -> Date {
    Date::from_ymd(2024, 3, 20).unwrap()
}

fn maturity() -> Date {
    Date::from_ymd(2029, 3, 20).unwrap()
}

fn deal(hazard: f64, attach: f64, detach: f64) -> CdoSquaredDeal {
    let curves = (0..6)
        .map(|i| {
            Some(
                SurvivalCurve::flat(format!("N{i}"), as_of(), hazard)
                    .unwrap()
                    .with_recovery(RecoveryCurve::flat(as_of(), 0.4).unwrap()),
            )
        })
        .collect();
    CdoSquaredDeal {
        curves,
        principals: vec![
            vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        ],
        attachments: vec![attach; 3],
        detachments: vec![detach; 3],
        maturities: None,
        cross_subordination: false,
        tranche: TrancheSlice::new(0.0, 1.0).unwrap(),
    }
}

fn config() -> BasketConfig {
    BasketConfig::builder().seed(7).sample_size(3_000).build().unwrap()
}

#[test]
fn test_zero_path_gives_zero_second_level_loss() {
    // a child needs three of its four names to default to reach 40%
    let mut cdo2 = CdoSquared::new(
        deal(1e-7, 0.4, 0.6),
        Copula::gauss(),
        &CorrelationInput::Scalar(0.2),
        maturity(),
        config(),
    )
    .unwrap();
    for index in 0..=20 {
        let dist = cdo2.loss_distribution(index).unwrap();
        assert!((dist.probabilities()[0] - 1.0).abs() < 1e-12);
        assert!(dist.probabilities()[1..].iter().all(|p| *p == 0.0));
    }
    assert_eq!(cdo2.expected_loss(maturity()).unwrap(), 0.0);
}

#[test]
fn test_child_maturity_freezes_losses() {
    let early = Date::from_ymd(2025, 3, 20).unwrap();
    let mut short = deal(0.05, 0.0, 0.3);
    short.maturities = Some(vec![early; 3]);
    let rho = CorrelationInput::Scalar(0.3);
    let mut frozen = CdoSquared::new(short, Copula::gauss(), &rho, maturity(), config()).unwrap();
    let at_early = frozen.expected_pool_loss(early).unwrap();
    assert!(at_early > 0.0);
    assert_eq!(frozen.expected_pool_loss(maturity()).unwrap(), at_early);
    assert_eq!(
        frozen.child_expected_loss(0, maturity()).unwrap(),
        frozen.child_expected_loss(0, early).unwrap()
    );
}

#[test]
fn test_unsupported_copula_rejected() {
    let nig = Copula::nig(1.0, 0.0).unwrap();
    let rho = CorrelationInput::Scalar(0.3);
    assert!(matches!(
        CdoSquared::new(deal(0.02, 0.0, 0.3), nig, &rho, maturity(), config()),
        Err(BasketError::UnsupportedCombination(_))
    ));
}

proptest! {
    #[test]
    fn prop_aggregate_loss_is_a_fraction(
        losses in prop::collection::vec(0.0f64..200.0, 3),
        attach in 0.0f64..0.5,
        width in 0.01f64..0.5,
        cross in any::<bool>(),
    ) {
        let a = [attach; 3];
        let d = [attach + width; 3];
        let t = [100.0, 80.0, 120.0];
        let x = aggregate_losses(&losses, &a, &d, &t, cross);
        prop_assert!((0.0..=1.0).contains(&x));
    }
}
