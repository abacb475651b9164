//! Shared correlation handle.
//!
//! Sibling tranches on one pool observe a single correlation object. The
//! handle is cheap to clone; clones refer to the same model and every
//! mutation bumps a version counter that engines compare on each query to
//! detect staleness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::CorrelationModel;

#[derive(Debug)]
struct Inner {
    model: RwLock<CorrelationModel>,
    version: AtomicU64,
}

/// Reference-counted, versioned correlation model.
///
/// # Example
///
/// ```
/// use credit_models::correlation::{CorrelationModel, SharedCorrelation};
///
/// let a = SharedCorrelation::new(CorrelationModel::flat(0.3).unwrap());
/// let b = a.clone();
/// b.replace(CorrelationModel::flat(0.5).unwrap());
///
/// assert!(SharedCorrelation::ptr_eq(&a, &b));
/// assert_eq!(a.snapshot(), CorrelationModel::flat(0.5).unwrap());
/// assert_eq!(a.version(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SharedCorrelation {
    inner: Arc<Inner>,
}

impl SharedCorrelation {
    /// Wrap a model in a fresh handle.
    pub fn new(model: CorrelationModel) -> Self {
        Self {
            inner: Arc::new(Inner {
                model: RwLock::new(model),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Copy of the current model.
    pub fn snapshot(&self) -> CorrelationModel {
        self.read(|m| m.clone())
    }

    /// Run `f` against the current model.
    pub fn read<R>(&self, f: impl FnOnce(&CorrelationModel) -> R) -> R {
        let guard = self.inner.model.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Mutate the model in place; all handles observe the change.
    pub fn update<R>(&self, f: impl FnOnce(&mut CorrelationModel) -> R) -> R {
        let mut guard = self.inner.model.write().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut guard);
        self.inner.version.fetch_add(1, Ordering::AcqRel);
        out
    }

    /// Replace the model.
    pub fn replace(&self, model: CorrelationModel) {
        self.update(|m| *m = model);
    }

    /// Mutation counter.
    #[inline]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Whether the current model is a base correlation.
    pub fn is_base(&self) -> bool {
        self.read(CorrelationModel::is_base)
    }

    /// Whether two handles refer to the same model.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}
