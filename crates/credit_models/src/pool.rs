//! Reference pool construction.
//!
//! [`Pool::from_curves`] filters raw per-name inputs into the ordered set of
//! names a basket engine integrates over. Excluded names are removed from
//! the pool entirely, so every downstream array is indexed by pool position
//! rather than by input position.

use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
use credit_core::types::Date;
use tracing::debug;

use crate::error::BasketError;

/// Principal assigned to each name when no principals are supplied.
pub const DEFAULT_PRINCIPAL: f64 = 1_000_000.0;

/// Internal scaling applied to principals for numerical conditioning.
pub const PRINCIPAL_SCALE: f64 = 10.0;

/// One included reference name.
#[derive(Debug, Clone)]
pub struct Name {
    curve: SurvivalCurve,
    recovery: RecoveryCurve,
    principal: f64,
    source_index: usize,
}

impl Name {
    /// Survival curve.
    #[inline]
    pub fn curve(&self) -> &SurvivalCurve {
        &self.curve
    }

    /// Recovery curve taken from the survival curve's calibrator.
    #[inline]
    pub fn recovery_curve(&self) -> &RecoveryCurve {
        &self.recovery
    }

    /// Scaled principal.
    #[inline]
    pub fn scaled_principal(&self) -> f64 {
        self.principal
    }

    /// Principal in input units.
    #[inline]
    pub fn principal(&self) -> f64 {
        self.principal / PRINCIPAL_SCALE
    }

    /// Position of this name in the caller's input arrays.
    #[inline]
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    /// Refinance date, if any.
    #[inline]
    pub fn refinance_date(&self) -> Option<Date> {
        self.curve.refinance_date()
    }

    /// Recovery rate on `date`.
    #[inline]
    pub fn recovery_rate(&self, date: Date) -> f64 {
        self.recovery.recovery_rate(date)
    }
}

/// Filtered, scaled set of names a basket engine works on.
///
/// # Example
///
/// ```
/// use credit_core::market_data::curves::{RecoveryCurve, SurvivalCurve};
/// use credit_core::types::Date;
/// use credit_models::pool::Pool;
///
/// let as_of = Date::from_ymd(2024, 1, 1).unwrap();
/// let curve = |name: &str| {
///     SurvivalCurve::flat(name, as_of, 0.02)
///         .unwrap()
///         .with_recovery(RecoveryCurve::flat(as_of, 0.4).unwrap())
/// };
///
/// let curves = vec![Some(curve("A")), None, Some(curve("C")), Some(curve("D"))];
/// let pool = Pool::from_curves(&curves, Some(&[1.0e7, 1.0e7, 0.0, 2.0e7])).unwrap();
///
/// // B has no curve and C has zero principal
/// assert_eq!(pool.count(), 2);
/// assert_eq!(pool.total_principal(), 3.0e7);
/// ```
#[derive(Debug, Clone)]
pub struct Pool {
    names: Vec<Name>,
    total: f64,
}

impl Pool {
    /// Build a pool from optional curves and an optional principal array.
    ///
    /// A name is excluded iff its curve is `None`, or the principal array
    /// has more than one entry and that entry is exactly zero. Included
    /// names receive [`DEFAULT_PRINCIPAL`] when `principals` is `None` or
    /// empty, the single scalar when it has one entry, and their own
    /// entry otherwise.
    ///
    /// # Errors
    ///
    /// * `BasketError::ArgumentShape` - Per-name principals of the wrong length
    /// * `BasketError::InvalidParameter` - Negative or non-finite principal
    /// * `BasketError::MissingRecoveryData` - Included curve without recovery curve
    /// * `BasketError::EmptyPool` - Nothing survived filtering
    pub fn from_curves(
        curves: &[Option<SurvivalCurve>],
        principals: Option<&[f64]>,
    ) -> Result<Self, BasketError> {
        let principals = principals.unwrap_or(&[]);
        if principals.len() > 1 && principals.len() != curves.len() {
            return Err(BasketError::ArgumentShape {
                what: "principals",
                expected: curves.len(),
                actual: principals.len(),
            });
        }
        if let Some(&bad) = principals.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(BasketError::invalid(
                "principal",
                format!("{bad} is negative or not finite"),
            ));
        }

        let mut names = Vec::with_capacity(curves.len());
        let mut total = 0.0;
        for (i, curve) in curves.iter().enumerate() {
            let Some(curve) = curve else { continue };
            let principal = match principals.len() {
                0 => DEFAULT_PRINCIPAL,
                1 => principals[0],
                _ if principals[i] == 0.0 => continue,
                _ => principals[i],
            };
            let recovery = curve
                .recovery_curve()
                .cloned()
                .ok_or_else(|| BasketError::MissingRecoveryData {
                    curve: curve.name().to_string(),
                })?;
            let scaled = principal * PRINCIPAL_SCALE;
            total += scaled;
            names.push(Name {
                curve: curve.clone(),
                recovery,
                principal: scaled,
                source_index: i,
            });
        }

        if names.is_empty() {
            return Err(BasketError::EmptyPool);
        }
        debug!(
            included = names.len(),
            supplied = curves.len(),
            "reference pool filtered"
        );
        Ok(Self { names, total })
    }

    /// Replace the survival curve of the name at pool position `index`.
    ///
    /// # Errors
    ///
    /// * `BasketError::ArgumentShape` - `index` outside the pool
    /// * `BasketError::MissingRecoveryData` - New curve without recovery curve
    pub fn replace_curve(&mut self, index: usize, curve: SurvivalCurve) -> Result<(), BasketError> {
        let count = self.names.len();
        let name = self.names.get_mut(index).ok_or(BasketError::ArgumentShape {
            what: "pool index",
            expected: count,
            actual: index,
        })?;
        name.recovery = curve
            .recovery_curve()
            .cloned()
            .ok_or_else(|| BasketError::MissingRecoveryData {
                curve: curve.name().to_string(),
            })?;
        name.curve = curve;
        Ok(())
    }

    /// Included names in input order.
    #[inline]
    pub fn names(&self) -> &[Name] {
        &self.names
    }

    /// Number of included names.
    #[inline]
    pub fn count(&self) -> usize {
        self.names.len()
    }

    /// Sum of included principals in input units.
    #[inline]
    pub fn total_principal(&self) -> f64 {
        self.total / PRINCIPAL_SCALE
    }

    /// Sum of scaled principals.
    #[inline]
    pub fn scaled_total(&self) -> f64 {
        self.total
    }

    /// Principal weight of each name (sums to one).
    pub fn weights(&self) -> Vec<f64> {
        self.names.iter().map(|n| n.principal / self.total).collect()
    }

    /// Curve names in pool order.
    pub fn name_ids(&self) -> Vec<String> {
        self.names.iter().map(|n| n.curve.name().to_string()).collect()
    }

    /// Earliest as-of date across the curves.
    pub fn as_of(&self) -> Date {
        self.names
            .iter()
            .map(|n| n.curve.as_of())
            .min()
            .unwrap_or_else(|| self.names[0].curve.as_of())
    }

    /// Whether any name carries a refinance date.
    pub fn has_refinance(&self) -> bool {
        self.names.iter().any(|n| n.refinance_date().is_some())
    }

    /// Upper bound on the pool fraction that can amortize.
    ///
    /// A name with a refinance date can prepay its full principal; any
    /// other name amortizes at most its largest recovery rate.
    pub fn maximum_amortization_level(&self) -> f64 {
        let amortizable: f64 = self
            .names
            .iter()
            .map(|n| {
                let share = if n.refinance_date().is_some() {
                    1.0
                } else {
                    n.recovery.max_rate()
                };
                n.principal * share
            })
            .sum();
        amortizable / self.total
    }
}
