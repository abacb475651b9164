//! Correlation structures for credit baskets.
//!
//! This module provides:
//! - [`CorrelationModel`]: Closed set of dependence structures
//! - [`FactorLoadings`]: Per-name factor loadings as consumed by factor copulas
//! - [`BaseCorrelation`]: Strike-indexed correlation curve ([`base`])
//! - [`SharedCorrelation`]: Shared, versioned handle ([`shared`])
//! - [`resolve`]: Conversion of loose inputs into canonical models ([`resolve`](mod@resolve))

pub mod base;
pub mod resolve;
pub mod shared;

pub use base::{BaseCorrelation, StrikeMethod};
pub use resolve::{resolve, CorrelationInput, EngineTarget, Resolution};
pub use shared::SharedCorrelation;

use credit_core::types::Date;

use crate::error::BasketError;

/// Loadings of each name on the systemic factors, row-major by name.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorLoadings {
    n_factors: usize,
    loadings: Vec<f64>,
}

impl FactorLoadings {
    /// One loading per name on a single factor.
    pub fn single(loadings: Vec<f64>) -> Self {
        Self {
            n_factors: 1,
            loadings,
        }
    }

    /// `n_names × n_factors` loadings.
    pub fn multi(n_factors: usize, loadings: Vec<f64>) -> Self {
        Self {
            n_factors,
            loadings,
        }
    }

    /// Number of systemic factors.
    #[inline]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Number of names.
    #[inline]
    pub fn n_names(&self) -> usize {
        if self.n_factors == 0 {
            0
        } else {
            self.loadings.len() / self.n_factors
        }
    }

    /// Loadings of name `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.loadings[i * self.n_factors..(i + 1) * self.n_factors]
    }

    /// Average systemic variance Σₖ βᵢₖ² over names.
    pub fn average_correlation(&self) -> f64 {
        let n = self.n_names();
        if n == 0 {
            return 0.0;
        }
        let total: f64 = (0..n)
            .map(|i| self.row(i).iter().map(|b| b * b).sum::<f64>())
            .sum();
        total / n as f64
    }

    /// Loadings restricted to the given name positions.
    pub fn select(&self, indices: &[usize]) -> Self {
        let loadings = indices
            .iter()
            .flat_map(|&i| self.row(i).iter().copied())
            .collect();
        Self::multi(self.n_factors, loadings)
    }
}

/// Dependence structure between the names of a pool.
///
/// Variants that carry `names` have one entry (or one row and column) per
/// pool name, in pool order.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationModel {
    /// Same pairwise correlation ρ for every pair.
    Flat {
        /// Pairwise correlation in [0, 1]
        rho: f64,
    },
    /// One loading βᵢ per name on a single factor.
    SingleFactor {
        /// Name identifiers
        names: Vec<String>,
        /// Factor loadings
        factors: Vec<f64>,
    },
    /// Loadings βᵢₖ on several factors, row-major by name.
    MultiFactor {
        /// Name identifiers
        names: Vec<String>,
        /// Number of factors
        n_factors: usize,
        /// Loadings
        loadings: Vec<f64>,
    },
    /// Full pairwise correlation matrix, row-major.
    General {
        /// Name identifiers
        names: Vec<String>,
        /// Correlation matrix
        matrix: Vec<f64>,
    },
    /// Factor models bucketed by date; bucket `i` covers dates up to `dates[i]`.
    TermStructure {
        /// Bucket end dates, strictly increasing
        dates: Vec<Date>,
        /// One factor model per bucket
        models: Vec<CorrelationModel>,
    },
    /// Strike-indexed correlation, resolved per tranche.
    Base(BaseCorrelation),
}

fn check_loading(b: f64) -> Result<(), BasketError> {
    if b.is_finite() && b.abs() <= 1.0 {
        Ok(())
    } else {
        Err(BasketError::invalid("factor loading", format!("{b} outside [-1, 1]")))
    }
}

impl CorrelationModel {
    /// Flat correlation ρ.
    ///
    /// # Errors
    ///
    /// `InvalidCorrelationInput` when ρ is outside [0, 1].
    pub fn flat(rho: f64) -> Result<Self, BasketError> {
        if !(0.0..=1.0).contains(&rho) {
            return Err(BasketError::InvalidCorrelationInput(format!(
                "correlation {rho} outside [0, 1]"
            )));
        }
        Ok(Self::Flat { rho })
    }

    /// Single-factor model.
    pub fn single_factor(names: Vec<String>, factors: Vec<f64>) -> Result<Self, BasketError> {
        if names.len() != factors.len() {
            return Err(BasketError::ArgumentShape {
                what: "factor loadings",
                expected: names.len(),
                actual: factors.len(),
            });
        }
        factors.iter().try_for_each(|&b| check_loading(b))?;
        Ok(Self::SingleFactor { names, factors })
    }

    /// Multi-factor model with name-major loadings.
    pub fn multi_factor(
        names: Vec<String>,
        n_factors: usize,
        loadings: Vec<f64>,
    ) -> Result<Self, BasketError> {
        if n_factors == 0 || loadings.len() != names.len() * n_factors {
            return Err(BasketError::ArgumentShape {
                what: "factor loadings",
                expected: names.len() * n_factors.max(1),
                actual: loadings.len(),
            });
        }
        for row in loadings.chunks(n_factors) {
            row.iter().try_for_each(|&b| check_loading(b))?;
            let var: f64 = row.iter().map(|b| b * b).sum();
            if var > 1.0 + 1e-12 {
                return Err(BasketError::invalid(
                    "factor loading",
                    format!("systemic variance {var} exceeds one"),
                ));
            }
        }
        Ok(Self::MultiFactor {
            names,
            n_factors,
            loadings,
        })
    }

    /// General pairwise model; the matrix must be symmetric with unit diagonal.
    pub fn general(names: Vec<String>, matrix: Vec<f64>) -> Result<Self, BasketError> {
        let n = names.len();
        if matrix.len() != n * n {
            return Err(BasketError::ArgumentShape {
                what: "correlation matrix",
                expected: n * n,
                actual: matrix.len(),
            });
        }
        for i in 0..n {
            if (matrix[i * n + i] - 1.0).abs() > 1e-12 {
                return Err(BasketError::invalid("correlation matrix", "diagonal must be one"));
            }
            for j in 0..i {
                let rho = matrix[i * n + j];
                if (rho - matrix[j * n + i]).abs() > 1e-12 || rho.abs() > 1.0 {
                    return Err(BasketError::invalid(
                        "correlation matrix",
                        format!("entry ({i}, {j}) is not a symmetric correlation"),
                    ));
                }
            }
        }
        Ok(Self::General { names, matrix })
    }

    /// Term structure of factor models.
    pub fn term_structure(
        dates: Vec<Date>,
        models: Vec<CorrelationModel>,
    ) -> Result<Self, BasketError> {
        if dates.is_empty() || dates.len() != models.len() {
            return Err(BasketError::ArgumentShape {
                what: "term structure models",
                expected: dates.len().max(1),
                actual: models.len(),
            });
        }
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BasketError::invalid("term structure dates", "must be strictly increasing"));
        }
        let bucketable = |m: &&Self| {
            matches!(
                m,
                Self::Flat { .. } | Self::SingleFactor { .. } | Self::MultiFactor { .. }
            )
        };
        if let Some(bad) = models.iter().find(|m| !bucketable(m)) {
            return Err(BasketError::InvalidCorrelationInput(format!(
                "{} cannot be a term structure bucket",
                bad.kind()
            )));
        }
        Ok(Self::TermStructure { dates, models })
    }

    /// All-zero factor correlation keyed by `names`.
    ///
    /// Placeholder structure for engines that need a factor model while the
    /// real correlation is still a base correlation awaiting a strike.
    pub fn zero_factor(names: Vec<String>, n_factors: usize) -> Self {
        let n_factors = n_factors.max(1);
        if n_factors == 1 {
            let factors = vec![0.0; names.len()];
            Self::SingleFactor { names, factors }
        } else {
            let loadings = vec![0.0; names.len() * n_factors];
            Self::MultiFactor {
                names,
                n_factors,
                loadings,
            }
        }
    }

    /// Variant name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Flat { .. } => "Flat",
            Self::SingleFactor { .. } => "SingleFactor",
            Self::MultiFactor { .. } => "MultiFactor",
            Self::General { .. } => "General",
            Self::TermStructure { .. } => "TermStructure",
            Self::Base(_) => "BaseCorrelation",
        }
    }

    /// Whether this is a base correlation.
    #[inline]
    pub fn is_base(&self) -> bool {
        matches!(self, Self::Base(_))
    }

    /// Name identifiers, for variants keyed by name.
    pub fn names(&self) -> Option<&[String]> {
        match self {
            Self::SingleFactor { names, .. }
            | Self::MultiFactor { names, .. }
            | Self::General { names, .. } => Some(names),
            _ => None,
        }
    }

    /// Number of systemic factors (zero for non-factor variants).
    pub fn n_factors(&self) -> usize {
        match self {
            Self::Flat { .. } | Self::SingleFactor { .. } => 1,
            Self::MultiFactor { n_factors, .. } => *n_factors,
            Self::TermStructure { models, .. } => {
                models.iter().map(Self::n_factors).max().unwrap_or(1)
            }
            Self::General { .. } | Self::Base(_) => 0,
        }
    }

    /// Factor loadings for `n_names` names applying on `date`.
    ///
    /// # Errors
    ///
    /// * `UnsupportedCombination` - General or base correlation
    /// * `ArgumentShape` - Model keyed by a different number of names
    pub fn loadings_at(&self, date: Date, n_names: usize) -> Result<FactorLoadings, BasketError> {
        match self {
            Self::TermStructure { dates, models } => {
                models[bucket_index(dates, date)].factor_loadings(n_names)
            }
            _ => self.factor_loadings(n_names),
        }
    }

    fn factor_loadings(&self, n_names: usize) -> Result<FactorLoadings, BasketError> {
        match self {
            Self::Flat { rho } => Ok(FactorLoadings::single(vec![rho.sqrt(); n_names])),
            Self::SingleFactor { factors, .. } => {
                check_len("factor loadings", n_names, factors.len())?;
                Ok(FactorLoadings::single(factors.clone()))
            }
            Self::MultiFactor {
                n_factors,
                loadings,
                ..
            } => {
                check_len("factor loadings", n_names * n_factors, loadings.len())?;
                Ok(FactorLoadings::multi(*n_factors, loadings.clone()))
            }
            _ => Err(BasketError::UnsupportedCombination(format!(
                "{} correlation has no factor loadings",
                self.kind()
            ))),
        }
    }

    /// Pairwise correlation matrix for `n_names` names.
    ///
    /// # Errors
    ///
    /// `UnsupportedCombination` for term structure and base correlation.
    pub fn to_matrix(&self, n_names: usize) -> Result<Vec<f64>, BasketError> {
        match self {
            Self::General { matrix, .. } => {
                check_len("correlation matrix", n_names * n_names, matrix.len())?;
                Ok(matrix.clone())
            }
            Self::TermStructure { .. } | Self::Base(_) => Err(BasketError::UnsupportedCombination(
                format!("{} correlation cannot be expressed as a matrix", self.kind()),
            )),
            _ => {
                let l = self.factor_loadings(n_names)?;
                let mut matrix = vec![0.0; n_names * n_names];
                for i in 0..n_names {
                    for j in 0..n_names {
                        matrix[i * n_names + j] = if i == j {
                            1.0
                        } else {
                            l.row(i).iter().zip(l.row(j)).map(|(a, b)| a * b).sum()
                        };
                    }
                }
                Ok(matrix)
            }
        }
    }

    /// Average pairwise correlation.
    pub fn average_correlation(&self, n_names: usize) -> f64 {
        match self {
            Self::Flat { rho } => *rho,
            Self::General { matrix, .. } => {
                if n_names < 2 {
                    return 0.0;
                }
                let mut sum = 0.0;
                for i in 0..n_names {
                    for j in 0..n_names {
                        if i != j {
                            sum += matrix[i * n_names + j];
                        }
                    }
                }
                sum / (n_names * (n_names - 1)) as f64
            }
            Self::TermStructure { models, .. } => models[0].average_correlation(n_names),
            Self::Base(base) => {
                let rhos = base.correlations();
                rhos.iter().sum::<f64>() / rhos.len() as f64
            }
            _ => self
                .factor_loadings(n_names)
                .map(|l| l.average_correlation())
                .unwrap_or(0.0),
        }
    }
}

/// Index of the term-structure bucket that applies on `date`.
pub(crate) fn bucket_index(dates: &[Date], date: Date) -> usize {
    dates.partition_point(|&d| d < date).min(dates.len() - 1)
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), BasketError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BasketError::ArgumentShape {
            what,
            expected,
            actual,
        })
    }
}
