//! Nth-to-default basket view.

use std::sync::Arc;

use credit_core::types::Date;
use credit_models::BasketError;

use super::PoolContext;

/// Triggered when the `n`-th name of the pool defaults.
#[derive(Debug, Clone)]
pub struct NthToDefault {
    context: Arc<PoolContext>,
    n: usize,
}

impl NthToDefault {
    /// `n`-th to default on the pool of `context` (1 for first-to-default).
    ///
    /// # Errors
    ///
    /// `InvalidParameter` unless `1 ≤ n ≤ count()`.
    pub fn new(context: Arc<PoolContext>, n: usize) -> Result<Self, BasketError> {
        let count = context.read(|engine| engine.count());
        if n == 0 || n > count {
            return Err(BasketError::InvalidParameter {
                name: "default order",
                value: format!("{n} outside 1..={count}"),
            });
        }
        Ok(Self { context, n })
    }

    /// Default order.
    #[inline]
    pub fn order(&self) -> usize {
        self.n
    }

    /// P(N(date) ≥ n).
    pub fn probability(&self, date: Date) -> Result<f64, BasketError> {
        self.context
            .read(|engine| engine.nth_to_default_probability(date, self.n))
    }

    /// Trigger probability times the pool's principal-weighted loss given
    /// default at `date`.
    pub fn expected_loss(&self, date: Date) -> Result<f64, BasketError> {
        let p = self.probability(date)?;
        let lgd = self.context.read(|engine| {
            let pool = engine.pool();
            pool.weights()
                .iter()
                .zip(pool.names())
                .map(|(w, name)| w * (1.0 - name.recovery_rate(date)))
                .sum::<f64>()
        });
        Ok(p * lgd)
    }
}
