//! Conversion of caller correlation input into a canonical model.
//!
//! The decision table, checked in order:
//!
//! | Input                                    | Result                                   |
//! |------------------------------------------|------------------------------------------|
//! | base correlation (bare or in a handle)   | `Deferred`, resolved later per tranche   |
//! | scalar ρ in [0, 1]                       | `SingleFactor` with βᵢ = √ρ              |
//! | array, length a multiple of pool size    | `MultiFactor`, `len / n` factors         |
//! | handle already canonical for the target  | the same handle                          |
//! | handle convertible for the target        | a new handle with the converted model    |
//! | anything else                            | an error                                 |
//!
//! Errors are `InvalidCorrelationInput` for malformed scalars and arrays and
//! `UnsupportedCombination` for models the target cannot consume.

use tracing::debug;

use super::{BaseCorrelation, CorrelationModel, SharedCorrelation};
use crate::error::BasketError;

/// Loosely typed correlation argument.
#[derive(Debug, Clone)]
pub enum CorrelationInput {
    /// Uniform pairwise correlation.
    Scalar(f64),
    /// Flat array of factor loadings, name-major.
    Array(Vec<f64>),
    /// Existing correlation object.
    Model(SharedCorrelation),
    /// Bare base correlation curve.
    Base(BaseCorrelation),
}

impl From<f64> for CorrelationInput {
    fn from(rho: f64) -> Self {
        Self::Scalar(rho)
    }
}

impl From<SharedCorrelation> for CorrelationInput {
    fn from(handle: SharedCorrelation) -> Self {
        Self::Model(handle)
    }
}

/// Engine family a correlation is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineTarget {
    /// Uniform / large-pool engines: single factor only.
    Homogeneous,
    /// Quadrature over factor nodes: single, multi or term-structured factors.
    SemiAnalytic,
    /// Simulation: single, multi or general pairwise.
    MonteCarlo,
}

impl EngineTarget {
    fn accepts(&self, model: &CorrelationModel) -> bool {
        use CorrelationModel as M;
        match self {
            Self::Homogeneous => matches!(model, M::SingleFactor { .. }),
            Self::SemiAnalytic => matches!(
                model,
                M::SingleFactor { .. } | M::MultiFactor { .. } | M::TermStructure { .. }
            ),
            Self::MonteCarlo => matches!(
                model,
                M::SingleFactor { .. } | M::MultiFactor { .. } | M::General { .. }
            ),
        }
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A concrete model usable by the target engine.
    Resolved(SharedCorrelation),
    /// A base correlation awaiting tranche strikes.
    Deferred(SharedCorrelation),
}

impl Resolution {
    /// The handle carried by either outcome.
    #[inline]
    pub fn handle(&self) -> &SharedCorrelation {
        match self {
            Self::Resolved(h) | Self::Deferred(h) => h,
        }
    }

    /// Whether resolution was deferred.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

/// Resolve `input` for a pool whose names are `names`, targeting `target`.
///
/// # Errors
///
/// * `InvalidCorrelationInput` - Scalar outside [0, 1], empty array, or an
///   array whose length is not a multiple of the pool size
/// * `UnsupportedCombination` - Model the target engine cannot consume
/// * `ArgumentShape` - Model keyed by a different number of names
///
/// # Example
///
/// ```
/// use credit_models::correlation::{resolve, CorrelationInput, CorrelationModel, EngineTarget};
///
/// let names = vec!["A".to_string(), "B".to_string()];
/// let r = resolve(&CorrelationInput::Scalar(0.25), &names, EngineTarget::SemiAnalytic).unwrap();
/// assert_eq!(
///     r.handle().snapshot(),
///     CorrelationModel::single_factor(names.clone(), vec![0.5, 0.5]).unwrap()
/// );
/// ```
pub fn resolve(
    input: &CorrelationInput,
    names: &[String],
    target: EngineTarget,
) -> Result<Resolution, BasketError> {
    let n = names.len();
    match input {
        CorrelationInput::Base(base) => Ok(Resolution::Deferred(SharedCorrelation::new(
            CorrelationModel::Base(base.clone()),
        ))),
        CorrelationInput::Model(handle) if handle.is_base() => {
            Ok(Resolution::Deferred(handle.clone()))
        }
        CorrelationInput::Scalar(rho) => {
            let model = CorrelationModel::flat(*rho)?;
            let converted = convert(&model, names, target)?.unwrap_or(model);
            Ok(Resolution::Resolved(SharedCorrelation::new(converted)))
        }
        CorrelationInput::Array(values) => {
            if n == 0 || values.is_empty() || values.len() % n != 0 {
                return Err(BasketError::InvalidCorrelationInput(format!(
                    "array of length {} is not a multiple of pool size {n}",
                    values.len()
                )));
            }
            let factors = values.len() / n;
            let model = CorrelationModel::multi_factor(names.to_vec(), factors, values.clone())?;
            let converted = convert(&model, names, target)?.unwrap_or(model);
            Ok(Resolution::Resolved(SharedCorrelation::new(converted)))
        }
        CorrelationInput::Model(handle) => {
            let converted = handle.read(|model| convert(model, names, target))?;
            match converted {
                None => Ok(Resolution::Resolved(handle.clone())),
                Some(model) => {
                    debug!(to = model.kind(), ?target, "correlation converted for engine");
                    Ok(Resolution::Resolved(SharedCorrelation::new(model)))
                }
            }
        }
    }
}

/// Convert `model` for `target`; `None` when it is already canonical.
fn convert(
    model: &CorrelationModel,
    names: &[String],
    target: EngineTarget,
) -> Result<Option<CorrelationModel>, BasketError> {
    check_names(model, names.len())?;
    if target.accepts(model) {
        return Ok(None);
    }
    let unsupported = || {
        BasketError::UnsupportedCombination(format!(
            "{} correlation cannot drive a {target:?} engine",
            model.kind()
        ))
    };
    match model {
        CorrelationModel::Flat { rho } => Ok(Some(CorrelationModel::single_factor(
            names.to_vec(),
            vec![rho.sqrt(); names.len()],
        )?)),
        CorrelationModel::MultiFactor {
            n_factors: 1,
            loadings,
            ..
        } => Ok(Some(CorrelationModel::single_factor(names.to_vec(), loadings.clone())?)),
        _ => Err(unsupported()),
    }
}

fn check_names(model: &CorrelationModel, n: usize) -> Result<(), BasketError> {
    if let Some(keyed) = model.names() {
        if keyed.len() != n {
            return Err(BasketError::ArgumentShape {
                what: "correlation names",
                expected: n,
                actual: keyed.len(),
            });
        }
    }
    if let CorrelationModel::TermStructure { models, .. } = model {
        models.iter().try_for_each(|m| check_names(m, n))?;
    }
    Ok(())
}
