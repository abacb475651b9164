//! Points command implementation
//!
//! Prints the factor integration points the sizer recommends for a copula
//! family and pool size.

use credit_models::copula::CopulaFamily;
use credit_models::sizing::{self, GreekOrder};
use tracing::info;

use crate::{CliError, Result};

/// Sizer output for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsAdvice {
    /// Table value for the family and pool size
    pub base: usize,
    /// Base plus the tranche-shape adjustment, when a slice was given
    pub recommended: Option<usize>,
    /// Floor for first-order sensitivities
    pub first_order: usize,
    /// Floor for gamma
    pub gamma: usize,
}

/// Compute the advice without printing it.
pub fn advise(
    family: &str,
    pool_size: usize,
    attach: Option<f64>,
    detach: Option<f64>,
) -> Result<PointsAdvice> {
    let family: CopulaFamily = family.parse()?;
    let base = sizing::points(family, pool_size);
    let recommended = match (attach, detach) {
        (Some(a), Some(d)) if 0.0 <= a && a < d && d <= 1.0 => {
            Some(sizing::recommended_points(family, pool_size, a, d))
        }
        (None, None) => None,
        _ => {
            return Err(CliError::InvalidArgument(
                "attach and detach must be given together with 0 <= attach < detach <= 1"
                    .to_string(),
            ))
        }
    };
    let chosen = recommended.unwrap_or(base);
    Ok(PointsAdvice {
        base,
        recommended,
        first_order: sizing::safe_points(family, chosen, GreekOrder::FirstOrder),
        gamma: sizing::safe_points(family, chosen, GreekOrder::Gamma),
    })
}

/// Run the points command
pub fn run(family: &str, pool_size: usize, attach: Option<f64>, detach: Option<f64>) -> Result<()> {
    info!("Sizing {} copula for {} names", family, pool_size);
    let advice = advise(family, pool_size, attach, detach)?;

    println!("base points:        {}", advice.base);
    if let Some(points) = advice.recommended {
        println!("tranche adjusted:   {}", points);
    }
    println!("first-order floor:  {}", advice.first_order);
    println!("gamma floor:        {}", advice.gamma);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauss_mezzanine() {
        let advice = advise("gauss", 125, Some(0.03), Some(0.07)).unwrap();
        assert_eq!(advice.base, 33);
        // 30 - 500 * 0.06 - 100 * 0.04 truncates to zero
        assert_eq!(advice.recommended, Some(33));
        assert_eq!(advice.first_order, 33);
        assert_eq!(advice.gamma, 50);
    }

    #[test]
    fn test_extreme_tail_keeps_table_value() {
        let advice = advise("clayton", 10, None, None).unwrap();
        assert_eq!(advice.base, 200);
        assert_eq!(advice.recommended, None);
        assert_eq!(advice.gamma, 200);
    }

    #[test]
    fn test_rejects_half_slice() {
        assert!(matches!(
            advise("gauss", 10, Some(0.03), None),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(advise("banana", 10, None, None), Err(CliError::Basket(_))));
    }
}
