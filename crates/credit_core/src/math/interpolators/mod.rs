//! Interpolation methods.
//!
//! - [`LinearInterpolator`]: Piecewise linear interpolation between data points
//! - [`Interpolator`]: Common 1D interface (`interpolate`, `domain`)

mod linear;
mod traits;

pub use linear::LinearInterpolator;
pub use traits::Interpolator;
