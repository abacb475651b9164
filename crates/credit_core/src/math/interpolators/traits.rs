//! Interpolator trait.

use crate::types::InterpolationError;
use num_traits::Float;

/// One-dimensional interpolation over a fixed data set.
pub trait Interpolator<T: Float> {
    /// Interpolated value at `x`.
    ///
    /// # Errors
    ///
    /// `InterpolationError::OutOfBounds` when `x` lies outside [`Self::domain`].
    fn interpolate(&self, x: T) -> Result<T, InterpolationError>;

    /// The closed interval `(x_min, x_max)` covered by the data.
    fn domain(&self) -> (T, T);
}
