//! Tranche-level views of a pool engine.
//!
//! - [`TrancheLossMapper`]: expected loss and amortization of an
//!   attach/detach slice, with base-correlation strike resolution
//! - [`NthToDefault`]: probability that at least n names have defaulted
//!
//! Sibling tranches on one pool share a [`PoolContext`], which owns the
//! engine and the first published base-correlation handle.

pub mod mapper;
pub mod ntd;

pub use mapper::{PoolContext, TrancheLossMapper};
pub use ntd::NthToDefault;
