//! Semi-analytic strategy.
//!
//! Conditional on a factor node names default independently, so the node
//! loss distribution is the convolution of one two-point variable per name.
//! Node distributions are mixed with the quadrature weights.

use credit_core::types::Date;
use credit_models::copula::{conditional_recovery, Conditioned};
use credit_models::BasketError;
use tracing::debug;

use super::{ComputeContext, Snapshot};
use crate::distribution::{CountDistribution, LossDistribution};

pub(crate) fn compute(ctx: &ComputeContext<'_>) -> Result<Vec<Snapshot>, BasketError> {
    let quad = ctx.quadrature()?;
    let n = ctx.pool.count();
    let grid_size = ctx.config.grid_size;
    let track = ctx.track_amortization();
    debug!(
        family = %quad.family(),
        nodes = quad.nodes().len(),
        factors = quad.n_factors(),
        "semi-analytic integration"
    );

    let mut snapshots = Vec::with_capacity(ctx.grid.len());
    snapshots.push(Snapshot::initial(grid_size, Some(n), track)?);
    for &date in &ctx.grid.dates()[1..] {
        let probs = ctx.default_probabilities(date)?;
        let loadings = ctx.loadings(date)?;
        let cond = quad.condition(&probs, &loadings)?;
        snapshots.push(mix_nodes(ctx, &cond, date)?);
    }
    Ok(snapshots)
}

/// Mixture over nodes of the per-node convolutions at `date`.
pub(crate) fn mix_nodes(
    ctx: &ComputeContext<'_>,
    cond: &Conditioned,
    date: Date,
) -> Result<Snapshot, BasketError> {
    let n = ctx.pool.count();
    let grid_size = ctx.config.grid_size;
    let track = ctx.track_amortization();
    let weights = ctx.pool.weights();
    let recoveries: Vec<f64> = ctx
        .pool
        .names()
        .iter()
        .map(|name| name.recovery_rate(date))
        .collect();
    let refinanced: Vec<bool> = ctx
        .pool
        .names()
        .iter()
        .map(|name| ComputeContext::refinanced(name, date))
        .collect();
    let recovery_correlation = ctx.copula.recovery_correlation();

    let mut loss = LossDistribution::zeros(grid_size)?;
    let mut amortization = if track {
        Some(LossDistribution::zeros(grid_size)?)
    } else {
        None
    };
    let mut counts = CountDistribution::zeros(n);

    for (k, (&node_weight, q_row)) in cond.weights.iter().zip(&cond.probs).enumerate() {
        if node_weight <= 0.0 {
            continue;
        }
        let mut node_loss = LossDistribution::new(grid_size)?;
        let mut node_amort = if track {
            Some(LossDistribution::new(grid_size)?)
        } else {
            None
        };
        let mut node_counts = CountDistribution::new(n);

        for i in 0..n {
            let q = q_row[i];
            let r = match recovery_correlation {
                Some(c) => conditional_recovery(recoveries[i], c, cond.factors[k]),
                None => recoveries[i],
            };
            node_loss.add_loss(q, weights[i] * (1.0 - r));
            node_counts.add_name(q);
            if let Some(amort) = node_amort.as_mut() {
                if refinanced[i] {
                    // survivors prepay their full principal
                    amort.add_outcomes(&[(q, weights[i] * r), (1.0 - q, weights[i])]);
                } else {
                    amort.add_loss(q, weights[i] * r);
                }
            }
        }

        loss.mix(&node_loss, node_weight);
        counts.mix(&node_counts, node_weight);
        if let (Some(total), Some(node)) = (amortization.as_mut(), node_amort.as_ref()) {
            total.mix(node, node_weight);
        }
    }

    Ok(Snapshot {
        loss,
        amortization,
        counts: Some(counts),
    })
}

#[cfg(test)]
mod tests {
    use crate::engine::{BasketConfig, BasketPricer, EngineKind};
    use approx::assert_abs_diff_eq;
    use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
    use credit_core::types::Date;
    use credit_models::copula::{Copula, CopulaFamily};
    use credit_models::correlation::{CorrelationInput, CorrelationModel, SharedCorrelation};
    use credit_models::pool::Pool;

    fn as_of() -> Date {
        Date::from_ymd(2024, 3, 20).unwrap()
    }

    fn maturity() -> Date {
        Date::from_ymd(2029, 3, 20).unwrap()
    }

    fn curve(i: usize, hazard: f64, recovery: f64) -> SurvivalCurve {
        SurvivalCurve::flat(format!("N{i}"), as_of(), hazard)
            .unwrap()
            .with_recovery(RecoveryCurve::flat(as_of(), recovery).unwrap())
    }

    fn engine(curves: Vec<SurvivalCurve>, copula: Copula, rho: f64) -> BasketPricer {
        let curves: Vec<_> = curves.into_iter().map(Some).collect();
        BasketPricer::new(
            EngineKind::SemiAnalytic,
            Pool::from_curves(&curves, None).unwrap(),
            copula,
            &CorrelationInput::Scalar(rho),
            maturity(),
            BasketConfig::default(),
        )
        .unwrap()
    }

    fn pool_expected_loss(curves: &[SurvivalCurve]) -> f64 {
        curves
            .iter()
            .map(|c| {
                let r = c.recovery_curve().unwrap().recovery_rate(maturity());
                (1.0 - r) * c.default_probability(maturity()).unwrap()
            })
            .sum::<f64>()
            / curves.len() as f64
    }

    // ========================================
    // Expected loss is correlation-free
    // ========================================

    #[test]
    fn test_expected_loss_matches_marginals() {
        let curves: Vec<_> = (0..6)
            .map(|i| curve(i, 0.01 + 0.005 * i as f64, 0.3 + 0.05 * i as f64))
            .collect();
        let expected = pool_expected_loss(&curves);
        for rho in [0.0, 0.3, 0.8] {
            let mut e = engine(curves.clone(), Copula::gauss(), rho);
            assert_abs_diff_eq!(e.expected_loss(maturity()).unwrap(), expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_archimedean_expected_loss() {
        let curves: Vec<_> = (0..4).map(|i| curve(i, 0.02, 0.4)).collect();
        let expected = pool_expected_loss(&curves);
        let mut e = engine(curves, Copula::new(CopulaFamily::Clayton), 0.3);
        assert_abs_diff_eq!(e.expected_loss(maturity()).unwrap(), expected, epsilon = 3e-3);
    }

    #[test]
    fn test_equity_loss_falls_with_correlation() {
        let curves: Vec<_> = (0..10).map(|i| curve(i, 0.02, 0.4)).collect();
        let mut low = engine(curves.clone(), Copula::gauss(), 0.0);
        let mut high = engine(curves, Copula::gauss(), 0.9);
        let l = low.tranche_loss(maturity(), 0.0, 0.03).unwrap();
        let h = high.tranche_loss(maturity(), 0.0, 0.03).unwrap();
        assert!(h < l, "equity loss {h} at high correlation vs {l}");
        let sl = low.tranche_loss(maturity(), 0.3, 1.0).unwrap();
        let sh = high.tranche_loss(maturity(), 0.3, 1.0).unwrap();
        assert!(sh > sl);
    }

    // ========================================
    // Refinancing and recovery correlation
    // ========================================

    #[test]
    fn test_refinanced_name_prepays() {
        let refi = Date::from_ymd(2026, 3, 20).unwrap();
        let curves = vec![curve(0, 0.03, 0.4).with_refinance(refi), curve(1, 0.03, 0.4)];
        let mut e = engine(curves.clone(), Copula::gauss(), 0.2);

        // name 0 stops defaulting at the refinance date
        let p0 = curves[0].default_probability(refi).unwrap();
        let p1 = curves[1].default_probability(maturity()).unwrap();
        let el = e.expected_loss(maturity()).unwrap();
        assert_abs_diff_eq!(el, 0.5 * 0.6 * (p0 + p1), epsilon = 1e-6);

        // survivors of name 0 amortize their full principal
        let ea = e.expected_amortization(maturity()).unwrap();
        assert_abs_diff_eq!(ea, 0.5 * (0.4 * p0 + (1.0 - p0)) + 0.5 * 0.4 * p1, epsilon = 1e-6);
    }

    #[test]
    fn test_recovery_correlation_raises_expected_loss() {
        let curves: Vec<_> = (0..5).map(|i| curve(i, 0.02, 0.4)).collect();
        let mut plain = engine(curves.clone(), Copula::gauss(), 0.3);
        let copula = Copula::gauss().with_recovery_correlation(0.5).unwrap();
        let mut correlated = engine(curves, copula, 0.3);
        let el_plain = plain.expected_loss(maturity()).unwrap();
        let el_corr = correlated.expected_loss(maturity()).unwrap();
        // recoveries are low in the states where defaults cluster
        assert!(el_corr > el_plain);
    }

    // ========================================
    // Term-structured correlation
    // ========================================

    #[test]
    fn test_term_structure_buckets() {
        let curves: Vec<_> = (0..5).map(|i| curve(i, 0.02, 0.4)).collect();
        let names: Vec<String> = (0..5).map(|i| format!("N{i}")).collect();
        let mid = Date::from_ymd(2026, 3, 20).unwrap();
        let model = CorrelationModel::term_structure(
            vec![mid, maturity()],
            vec![
                CorrelationModel::single_factor(names.clone(), vec![0.0; 5]).unwrap(),
                CorrelationModel::single_factor(names, vec![0.9; 5]).unwrap(),
            ],
        )
        .unwrap();
        let mut e = engine(curves.clone(), Copula::gauss(), 0.0);
        e.set_correlation(SharedCorrelation::new(model)).unwrap();
        let mut flat = engine(curves, Copula::gauss(), 0.0);

        // identical up to the first bucket end
        let early = Date::from_ymd(2025, 3, 20).unwrap();
        assert_abs_diff_eq!(
            e.tranche_loss(early, 0.0, 0.1).unwrap(),
            flat.tranche_loss(early, 0.0, 0.1).unwrap(),
            epsilon = 1e-12
        );
        let stepped = e.tranche_loss(maturity(), 0.0, 0.1).unwrap();
        assert!(stepped < flat.tranche_loss(maturity(), 0.0, 0.1).unwrap());
    }
}
