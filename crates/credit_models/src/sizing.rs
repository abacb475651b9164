//! Quadrature and sample-size defaults.
//!
//! Point counts are lookup tables, not searches. Downstream prices are
//! sensitive to off-by-one counts, so the constants and the tranche-shape
//! formula are kept exactly as tabulated and pinned by tests.

use tracing::warn;

use crate::copula::CopulaFamily;
use crate::error::BasketError;

/// Clayton points.
pub const CLAYTON_POINTS: usize = 200;
/// Gumbel and Frank points.
pub const GUMBEL_FRANK_POINTS: usize = 100;
/// Poisson needs no integration.
pub const POISSON_POINTS: usize = 0;
/// Gauss, ExtendedGauss, NIG and random factor loading points.
pub const NORMAL_FAMILY_POINTS: usize = 25;
/// Double-t points.
pub const DOUBLE_T_POINTS: usize = 15;
/// Student-t points (per dimension of its two-dimensional grid).
pub const STUDENT_T_POINTS: usize = 12;

/// Pool size from which the base count grows.
pub const POOL_SIZE_THRESHOLD: usize = 40;
/// Names per extra point above the threshold.
pub const POOL_SIZE_STEP: usize = 10;

/// Minimum points for first-order sensitivities.
pub const SAFE_POINTS_FIRST_ORDER: usize = 30;
/// Minimum points for gamma.
pub const SAFE_POINTS_GAMMA: usize = 50;

/// Monte Carlo paths when none are configured.
pub const DEFAULT_SAMPLE_SIZE: usize = 5000;

/// Attachment at which the tranche-shape adjustment peaks.
const ADJUSTMENT_CENTRE: f64 = 0.09;

/// Order of the sensitivity being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreekOrder {
    /// Delta, theta and other first-order measures.
    FirstOrder,
    /// Second-order measures.
    Gamma,
}

/// Base integration points for a family and pool size.
///
/// # Example
///
/// ```
/// use credit_models::copula::CopulaFamily;
/// use credit_models::sizing::points;
///
/// assert_eq!(points(CopulaFamily::Gauss, 39), 25);
/// assert_eq!(points(CopulaFamily::Gauss, 50), 26);
/// assert_eq!(points(CopulaFamily::Clayton, 500), 200);
/// ```
pub fn points(family: CopulaFamily, pool_size: usize) -> usize {
    let base = match family {
        CopulaFamily::Clayton => return CLAYTON_POINTS,
        CopulaFamily::Gumbel | CopulaFamily::Frank => return GUMBEL_FRANK_POINTS,
        CopulaFamily::Poisson => return POISSON_POINTS,
        CopulaFamily::Gauss
        | CopulaFamily::ExtendedGauss
        | CopulaFamily::Nig
        | CopulaFamily::RandomFactorLoading => NORMAL_FAMILY_POINTS,
        CopulaFamily::DoubleT => DOUBLE_T_POINTS,
        CopulaFamily::StudentT => STUDENT_T_POINTS,
    };
    if pool_size >= POOL_SIZE_THRESHOLD {
        base + (pool_size - POOL_SIZE_THRESHOLD) / POOL_SIZE_STEP
    } else {
        base
    }
}

/// [`points`] for a textual family tag.
///
/// # Errors
///
/// `UnknownCopulaType` for an unrecognised tag.
pub fn points_for_tag(tag: &str, pool_size: usize) -> Result<usize, BasketError> {
    Ok(points(tag.parse()?, pool_size))
}

/// Extra points for a tranche shape.
///
/// `max(0, trunc(30 − 500·|attach − 0.09| − 100·(detach − attach)))`
pub fn tranche_adjustment(attach: f64, detach: f64) -> usize {
    let raw = 30.0 - 500.0 * (attach - ADJUSTMENT_CENTRE).abs() - 100.0 * (detach - attach);
    if raw.is_finite() && raw > 0.0 {
        raw.trunc() as usize
    } else {
        0
    }
}

/// Largest [`tranche_adjustment`] over consecutive detachment levels.
///
/// Each level is paired with its predecessor (0 for the first). Levels are
/// used in the order given.
pub fn detachment_adjustment(detachments: &[f64]) -> usize {
    if detachments.windows(2).any(|w| w[1] < w[0]) {
        warn!(?detachments, "detachment levels are not sorted");
    }
    let mut previous = 0.0;
    let mut best = 0;
    for &d in detachments {
        best = best.max(tranche_adjustment(previous, d));
        previous = d;
    }
    best
}

/// Raise a point count to the floor needed for stable sensitivities.
///
/// Extreme-tail families (Archimedean and Poisson) are returned unchanged.
pub fn safe_points(family: CopulaFamily, points: usize, order: GreekOrder) -> usize {
    if family.is_extreme_tail() {
        return points;
    }
    let floor = match order {
        GreekOrder::FirstOrder => SAFE_POINTS_FIRST_ORDER,
        GreekOrder::Gamma => SAFE_POINTS_GAMMA,
    };
    points.max(floor)
}

/// Monte Carlo sample size, defaulting to [`DEFAULT_SAMPLE_SIZE`].
#[inline]
pub fn sample_size(requested: Option<usize>) -> usize {
    match requested {
        Some(n) if n > 0 => n,
        _ => DEFAULT_SAMPLE_SIZE,
    }
}

/// Base points plus the tranche-shape adjustment.
///
/// Poisson stays at zero.
pub fn recommended_points(
    family: CopulaFamily,
    pool_size: usize,
    attach: f64,
    detach: f64,
) -> usize {
    match family {
        CopulaFamily::Poisson => POISSON_POINTS,
        _ => points(family, pool_size) + tranche_adjustment(attach, detach),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ========================================
    // Base table
    // ========================================

    #[test]
    fn test_table_values() {
        assert_eq!(points(CopulaFamily::Gauss, 39), 25);
        assert_eq!(points(CopulaFamily::Gauss, 40), 25);
        assert_eq!(points(CopulaFamily::Gauss, 50), 26);
        assert_eq!(points(CopulaFamily::ExtendedGauss, 125), 33);
        assert_eq!(points(CopulaFamily::Nig, 10), 25);
        assert_eq!(points(CopulaFamily::RandomFactorLoading, 60), 27);
        assert_eq!(points(CopulaFamily::DoubleT, 39), 15);
        assert_eq!(points(CopulaFamily::DoubleT, 70), 18);
        assert_eq!(points(CopulaFamily::StudentT, 39), 12);
        assert_eq!(points(CopulaFamily::StudentT, 50), 13);
    }

    #[test]
    fn test_extreme_tail_ignore_pool_size() {
        for n in [1, 39, 40, 125, 1000] {
            assert_eq!(points(CopulaFamily::Clayton, n), 200);
            assert_eq!(points(CopulaFamily::Gumbel, n), 100);
            assert_eq!(points(CopulaFamily::Frank, n), 100);
            assert_eq!(points(CopulaFamily::Poisson, n), 0);
        }
    }

    #[test]
    fn test_points_for_tag() {
        assert_eq!(points_for_tag("StudentT", 50).unwrap(), 13);
        assert!(matches!(
            points_for_tag("Marshall-Olkin", 10),
            Err(BasketError::UnknownCopulaType(_))
        ));
    }

    // ========================================
    // Adjustments
    // ========================================

    #[test]
    fn test_tranche_adjustment() {
        assert_eq!(tranche_adjustment(0.09, 0.09), 30);
        assert_eq!(tranche_adjustment(0.09, 0.12), 27);
        assert_eq!(tranche_adjustment(0.03, 0.07), 0);
        assert_eq!(tranche_adjustment(0.085, 0.125), 23);
        assert_eq!(tranche_adjustment(0.0, 1.0), 0);
    }

    #[test]
    fn test_detachment_adjustment_pairs_levels() {
        // (0, 0.03) -> 0, (0.03, 0.085) -> 0, (0.085, 0.125) -> 23
        assert_eq!(detachment_adjustment(&[0.03, 0.085, 0.125]), 23);
        assert_eq!(detachment_adjustment(&[]), 0);
        // processed as given: (0.105, 0.095) has negative width
        assert_eq!(detachment_adjustment(&[0.105, 0.095]), 23);
    }

    #[test]
    fn test_safe_points() {
        assert_eq!(safe_points(CopulaFamily::Gauss, 25, GreekOrder::FirstOrder), 30);
        assert_eq!(safe_points(CopulaFamily::Gauss, 25, GreekOrder::Gamma), 50);
        assert_eq!(safe_points(CopulaFamily::Gauss, 60, GreekOrder::Gamma), 60);
        assert_eq!(safe_points(CopulaFamily::Clayton, 200, GreekOrder::Gamma), 200);
        assert_eq!(safe_points(CopulaFamily::Poisson, 0, GreekOrder::FirstOrder), 0);
    }

    #[test]
    fn test_sample_size_and_recommendation() {
        assert_eq!(sample_size(None), 5000);
        assert_eq!(sample_size(Some(0)), 5000);
        assert_eq!(sample_size(Some(20_000)), 20_000);
        assert_eq!(recommended_points(CopulaFamily::Gauss, 125, 0.09, 0.12), 33 + 27);
        assert_eq!(recommended_points(CopulaFamily::Poisson, 125, 0.09, 0.12), 0);
    }

    proptest! {
        #[test]
        fn prop_adjustment_bounded(a in -1.0f64..2.0, w in 0.0f64..2.0) {
            let adj = tranche_adjustment(a, a + w);
            prop_assert!(adj <= 30);
        }

        #[test]
        fn prop_points_monotone_in_pool_size(n in 0usize..2000) {
            for family in CopulaFamily::ALL {
                prop_assert!(points(family, n + 1) >= points(family, n));
            }
        }
    }
}
