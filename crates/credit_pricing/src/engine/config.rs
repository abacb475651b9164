//! Basket engine configuration.
//!
//! [`BasketConfig`] is immutable once built; engines copy it and expose
//! individual setters that re-validate and mark their cache stale.

use credit_core::types::time::{Date, Tenor};
use credit_models::ConfigError;

/// Default loss grid step.
pub const DEFAULT_GRID_SIZE: f64 = 0.005;

/// Largest Monte Carlo sample size accepted.
pub const MAX_SAMPLE_SIZE: usize = 10_000_000;

/// Largest integration point count accepted.
pub const MAX_INTEGRATION_POINTS: usize = 1_000;

/// Forward-loss chain parameters.
///
/// The default-count intensity in state k of n is
/// `scaling_k · (n − k) · h̄(t) · (1 + alpha · k / n)^beta`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ForwardLossConfig {
    /// Contagion strength.
    pub alpha: f64,
    /// Contagion exponent.
    pub beta: f64,
    /// Use the horizon-average hazard on every step.
    pub flat: bool,
    /// Implicit Euler substeps per grid interval.
    pub substeps: usize,
}

impl Default for ForwardLossConfig {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            beta: 1.0,
            flat: false,
            substeps: 10,
        }
    }
}

/// Basket engine configuration.
///
/// # Examples
///
/// ```rust
/// use credit_pricing::engine::BasketConfig;
///
/// let config = BasketConfig::builder()
///     .grid_size(0.01)
///     .sample_size(20_000)
///     .seed(42)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.grid_size(), 0.01);
/// assert_eq!(config.sample_size(), Some(20_000));
/// assert_eq!(config.seed(), 42);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BasketConfig {
    pub(crate) grid_size: f64,
    pub(crate) step: Tenor,
    pub(crate) integration_points: Option<usize>,
    pub(crate) sample_size: Option<usize>,
    pub(crate) seed: i64,
    pub(crate) no_amortization: bool,
    pub(crate) portfolio_start: Option<Date>,
    pub(crate) forward_loss: ForwardLossConfig,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            step: Tenor::quarterly(),
            integration_points: None,
            sample_size: None,
            seed: 0,
            no_amortization: false,
            portfolio_start: None,
            forward_loss: ForwardLossConfig::default(),
        }
    }
}

impl BasketConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> BasketConfigBuilder {
        BasketConfigBuilder::default()
    }

    /// Loss grid step.
    #[inline]
    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    /// Time grid step.
    #[inline]
    pub fn step(&self) -> Tenor {
        self.step
    }

    /// Integration points override (sizer table when `None`).
    #[inline]
    pub fn integration_points(&self) -> Option<usize> {
        self.integration_points
    }

    /// Monte Carlo sample size override.
    #[inline]
    pub fn sample_size(&self) -> Option<usize> {
        self.sample_size
    }

    /// Monte Carlo seed: 0 default, −1 nondeterministic.
    #[inline]
    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Skip amortization tracking.
    #[inline]
    pub fn no_amortization(&self) -> bool {
        self.no_amortization
    }

    /// Date from which losses accumulate.
    #[inline]
    pub fn portfolio_start(&self) -> Option<Date> {
        self.portfolio_start
    }

    /// Forward-loss chain parameters.
    #[inline]
    pub fn forward_loss(&self) -> &ForwardLossConfig {
        &self.forward_loss
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `grid_size` is not in (0, 1]
    /// - `sample_size` is 0 or above [`MAX_SAMPLE_SIZE`]
    /// - `integration_points` exceeds [`MAX_INTEGRATION_POINTS`]
    /// - `seed` is below −1
    /// - `step` does not move forward
    /// - forward-loss substeps are zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_grid_size(self.grid_size)?;
        if let Some(n) = self.sample_size {
            check_sample_size(n)?;
        }
        if let Some(p) = self.integration_points {
            check_points(p)?;
        }
        check_seed(self.seed)?;
        if !self.step.is_positive() {
            return Err(ConfigError::InvalidParameter {
                name: "step",
                value: self.step.to_string(),
            });
        }
        if self.forward_loss.substeps == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "substeps",
                value: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn check_grid_size(g: f64) -> Result<(), ConfigError> {
    if g > 0.0 && g <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidGridSize(g))
    }
}

pub(crate) fn check_sample_size(n: usize) -> Result<(), ConfigError> {
    if n == 0 || n > MAX_SAMPLE_SIZE {
        Err(ConfigError::InvalidSampleSize(n))
    } else {
        Ok(())
    }
}

pub(crate) fn check_points(p: usize) -> Result<(), ConfigError> {
    if p > MAX_INTEGRATION_POINTS {
        Err(ConfigError::InvalidParameter {
            name: "integration_points",
            value: format!("{p} exceeds {MAX_INTEGRATION_POINTS}"),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn check_seed(seed: i64) -> Result<(), ConfigError> {
    if seed < -1 {
        Err(ConfigError::InvalidParameter {
            name: "seed",
            value: format!("{seed} below -1"),
        })
    } else {
        Ok(())
    }
}

/// Builder for [`BasketConfig`].
#[derive(Clone, Debug, Default)]
pub struct BasketConfigBuilder {
    config: BasketConfig,
}

impl BasketConfigBuilder {
    /// Loss grid step in (0, 1].
    #[inline]
    pub fn grid_size(mut self, grid_size: f64) -> Self {
        self.config.grid_size = grid_size;
        self
    }

    /// Time grid step.
    #[inline]
    pub fn step(mut self, step: Tenor) -> Self {
        self.config.step = step;
        self
    }

    /// Integration points per factor dimension.
    #[inline]
    pub fn integration_points(mut self, points: usize) -> Self {
        self.config.integration_points = Some(points);
        self
    }

    /// Monte Carlo sample size.
    #[inline]
    pub fn sample_size(mut self, n: usize) -> Self {
        self.config.sample_size = Some(n);
        self
    }

    /// Monte Carlo seed.
    #[inline]
    pub fn seed(mut self, seed: i64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Skip amortization tracking.
    #[inline]
    pub fn no_amortization(mut self, flag: bool) -> Self {
        self.config.no_amortization = flag;
        self
    }

    /// Date from which losses accumulate.
    #[inline]
    pub fn portfolio_start(mut self, date: Date) -> Self {
        self.config.portfolio_start = Some(date);
        self
    }

    /// Forward-loss chain parameters.
    #[inline]
    pub fn forward_loss(mut self, forward_loss: ForwardLossConfig) -> Self {
        self.config.forward_loss = forward_loss;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// As [`BasketConfig::validate`].
    pub fn build(self) -> Result<BasketConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_core::types::time::TimeUnit;

    #[test]
    fn test_defaults() {
        let config = BasketConfig::builder().build().unwrap();
        assert_eq!(config.grid_size(), DEFAULT_GRID_SIZE);
        assert_eq!(config.step(), Tenor::quarterly());
        assert_eq!(config.seed(), 0);
        assert!(!config.no_amortization());
        assert_eq!(config.forward_loss(), &ForwardLossConfig::default());
        assert_eq!(config.forward_loss().substeps, 10);
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            BasketConfig::builder().grid_size(0.0).build(),
            Err(ConfigError::InvalidGridSize(0.0))
        );
        assert_eq!(
            BasketConfig::builder().sample_size(0).build(),
            Err(ConfigError::InvalidSampleSize(0))
        );
        assert!(BasketConfig::builder().seed(-2).build().is_err());
        assert!(BasketConfig::builder().seed(-1).build().is_ok());
        assert!(BasketConfig::builder()
            .step(Tenor::new(-1, TimeUnit::Months))
            .build()
            .is_err());
        assert!(BasketConfig::builder()
            .forward_loss(ForwardLossConfig {
                substeps: 0,
                ..Default::default()
            })
            .build()
            .is_err());
        assert!(BasketConfig::builder().integration_points(5000).build().is_err());
    }
}
