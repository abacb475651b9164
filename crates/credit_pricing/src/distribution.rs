//! Discretised loss and default-count distributions.
//!
//! [`LossDistribution`] holds probabilities on the loss levels
//! `0, h, 2h, …, 1` of a fixed grid step `h`. A loss that falls between two
//! levels is split across them in proportion to its distance, so the mean
//! of the distribution is preserved exactly. Tranche expectations are then
//! linear functionals of the probabilities.

use credit_models::ConfigError;

/// Probability distribution of a loss fraction on a uniform grid.
///
/// # Examples
///
/// ```
/// use credit_pricing::distribution::LossDistribution;
///
/// let mut dist = LossDistribution::new(0.01).unwrap();
/// dist.add_loss(0.5, 0.3);
/// dist.add_loss(0.5, 0.3);
///
/// assert!((dist.mean() - 0.3).abs() < 1e-12);
/// assert!((dist.expected_min(0.3) - 0.225).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LossDistribution {
    step: f64,
    probs: Vec<f64>,
}

impl LossDistribution {
    /// Point mass at zero loss.
    ///
    /// The step is adjusted to the nearest `1/m` so that level `m` is
    /// exactly 1.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidGridSize` unless `0 < step <= 1`.
    pub fn new(step: f64) -> Result<Self, ConfigError> {
        let mut dist = Self::zeros(step)?;
        dist.probs[0] = 1.0;
        Ok(dist)
    }

    /// All-zero accumulator on the same grid as [`LossDistribution::new`].
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidGridSize` unless `0 < step <= 1`.
    pub fn zeros(step: f64) -> Result<Self, ConfigError> {
        if !(step > 0.0 && step <= 1.0) {
            return Err(ConfigError::InvalidGridSize(step));
        }
        let levels = (1.0 / step).round().max(1.0) as usize;
        Ok(Self {
            step: 1.0 / levels as f64,
            probs: vec![0.0; levels + 1],
        })
    }

    /// Empty accumulator on this distribution's grid.
    pub fn zeros_like(&self) -> Self {
        Self {
            step: self.step,
            probs: vec![0.0; self.probs.len()],
        }
    }

    /// Grid step.
    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Probabilities by level.
    #[inline]
    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    /// Total probability mass.
    pub fn total_mass(&self) -> f64 {
        self.probs.iter().sum()
    }

    /// Add `prob` at loss `loss`, split between the neighbouring levels.
    pub fn deposit(&mut self, prob: f64, loss: f64) {
        let (j, frac) = self.locate(loss);
        let top = self.probs.len() - 1;
        self.probs[j.min(top)] += prob * (1.0 - frac);
        if frac > 0.0 {
            self.probs[(j + 1).min(top)] += prob * frac;
        }
    }

    /// Convolve with an independent loss of `loss` occurring with
    /// probability `prob`.
    pub fn add_loss(&mut self, prob: f64, loss: f64) {
        if prob <= 0.0 || loss <= 0.0 {
            return;
        }
        let prob = prob.min(1.0);
        let (j, frac) = self.locate(loss);
        let top = self.probs.len() - 1;
        // Sources are visited top-down so every target (at or above its
        // source) has already been consumed as a source.
        for k in (0..=top).rev() {
            let v = self.probs[k];
            if v == 0.0 {
                continue;
            }
            self.probs[k] = (1.0 - prob) * v;
            self.probs[(k + j).min(top)] += prob * (1.0 - frac) * v;
            if frac > 0.0 {
                self.probs[(k + j + 1).min(top)] += prob * frac * v;
            }
        }
    }

    /// Convolve with an independent variable taking `amount` with the paired
    /// probability, and zero with the remaining probability.
    pub fn add_outcomes(&mut self, outcomes: &[(f64, f64)]) {
        let stay: f64 = 1.0 - outcomes.iter().map(|(p, _)| p.max(0.0)).sum::<f64>();
        let mut next = self.zeros_like();
        for (k, &v) in self.probs.iter().enumerate() {
            if v == 0.0 {
                continue;
            }
            next.probs[k] += stay.max(0.0) * v;
            let base = k as f64 * self.step;
            for &(p, amount) in outcomes {
                if p > 0.0 {
                    next.deposit(p * v, base + amount);
                }
            }
        }
        self.probs = next.probs;
    }

    /// Accumulate `weight · other`.
    ///
    /// Both distributions must share a grid.
    pub fn mix(&mut self, other: &Self, weight: f64) {
        for (a, b) in self.probs.iter_mut().zip(&other.probs) {
            *a += weight * b;
        }
    }

    /// E[L].
    pub fn mean(&self) -> f64 {
        self.probs
            .iter()
            .enumerate()
            .map(|(k, p)| p * k as f64 * self.step)
            .sum()
    }

    /// E[min(L, cap)].
    pub fn expected_min(&self, cap: f64) -> f64 {
        if cap <= 0.0 {
            return 0.0;
        }
        self.probs
            .iter()
            .enumerate()
            .map(|(k, p)| p * (k as f64 * self.step).min(cap))
            .sum()
    }

    /// Expected loss of `[attach, detach]` as a fraction of its width.
    pub fn tranche_loss(&self, attach: f64, detach: f64) -> f64 {
        (self.expected_min(detach) - self.expected_min(attach)) / (detach - attach)
    }

    /// Expected amortization of `[attach, detach]` as a fraction of its
    /// width, with this distribution read as pool amortization eating the
    /// capital structure from the top.
    pub fn tranche_amortization(&self, attach: f64, detach: f64) -> f64 {
        (self.expected_min(1.0 - attach) - self.expected_min(1.0 - detach)) / (detach - attach)
    }

    fn locate(&self, loss: f64) -> (usize, f64) {
        let x = (loss.max(0.0) / self.step).min((self.probs.len() - 1) as f64);
        let j = x.floor();
        (j as usize, x - j)
    }
}

/// Distribution of the number of defaults among `n` names.
///
/// # Examples
///
/// ```
/// use credit_pricing::distribution::CountDistribution;
///
/// let mut counts = CountDistribution::new(2);
/// counts.add_name(0.5);
/// counts.add_name(0.5);
/// assert_eq!(counts.probabilities(), &[0.25, 0.5, 0.25]);
/// assert_eq!(counts.at_least(1), 0.75);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CountDistribution {
    probs: Vec<f64>,
}

impl CountDistribution {
    /// No defaults among `n` names.
    pub fn new(n: usize) -> Self {
        let mut probs = vec![0.0; n + 1];
        probs[0] = 1.0;
        Self { probs }
    }

    /// All-zero accumulator for `n` names.
    pub fn zeros(n: usize) -> Self {
        Self {
            probs: vec![0.0; n + 1],
        }
    }

    /// Wrap explicit probabilities for counts `0..len`.
    pub fn from_probabilities(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Add an independent name defaulting with probability `p`.
    pub fn add_name(&mut self, p: f64) {
        let p = p.clamp(0.0, 1.0);
        let top = self.probs.len() - 1;
        for k in (0..=top).rev() {
            let v = self.probs[k];
            self.probs[k] = (1.0 - p) * v;
            if k < top {
                self.probs[k + 1] += p * v;
            } else {
                self.probs[k] += p * v;
            }
        }
    }

    /// Add `prob` at exactly `count` defaults.
    pub fn deposit(&mut self, prob: f64, count: usize) {
        let top = self.probs.len() - 1;
        self.probs[count.min(top)] += prob;
    }

    /// Accumulate `weight · other`.
    pub fn mix(&mut self, other: &Self, weight: f64) {
        for (a, b) in self.probs.iter_mut().zip(&other.probs) {
            *a += weight * b;
        }
    }

    /// P(N = k) for k = 0..=n.
    #[inline]
    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    /// P(N ≥ k).
    pub fn at_least(&self, k: usize) -> f64 {
        self.probs.iter().skip(k).sum()
    }

    /// Consume into the probability vector.
    pub fn into_vec(self) -> Vec<f64> {
        self.probs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    // ========================================
    // LossDistribution
    // ========================================

    #[test]
    fn test_grid_validation() {
        assert!(LossDistribution::new(0.0).is_err());
        assert!(LossDistribution::new(-0.1).is_err());
        assert!(LossDistribution::new(f64::NAN).is_err());
        let d = LossDistribution::new(0.005).unwrap();
        assert_eq!(d.probabilities().len(), 201);
        assert_abs_diff_eq!(d.step(), 0.005, epsilon = 1e-15);
    }

    #[test]
    fn test_split_preserves_mean() {
        let mut d = LossDistribution::new(0.01).unwrap();
        d.add_loss(0.2, 0.0125);
        d.add_loss(0.3, 0.047);
        assert_abs_diff_eq!(d.mean(), 0.2 * 0.0125 + 0.3 * 0.047, epsilon = 1e-14);
        assert_abs_diff_eq!(d.total_mass(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_losses_cap_at_one() {
        let mut d = LossDistribution::new(0.1).unwrap();
        d.add_loss(1.0, 0.7);
        d.add_loss(1.0, 0.7);
        assert_abs_diff_eq!(d.probabilities()[10], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_tranche_functionals() {
        let mut d = LossDistribution::zeros(0.01).unwrap();
        d.deposit(0.5, 0.0);
        d.deposit(0.5, 0.05);
        // half the time the 3-7% tranche is half eaten
        assert_abs_diff_eq!(d.tranche_loss(0.03, 0.07), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(d.tranche_loss(0.0, 0.03), 0.5, epsilon = 1e-12);
        // amortization 5% hits the top 5% of the structure
        assert_abs_diff_eq!(d.tranche_amortization(0.95, 1.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d.tranche_amortization(0.0, 0.9), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_outcomes_match_single_loss() {
        let mut a = LossDistribution::new(0.01).unwrap();
        let mut b = a.clone();
        a.add_loss(0.3, 0.042);
        b.add_outcomes(&[(0.3, 0.042)]);
        for (x, y) in a.probabilities().iter().zip(b.probabilities()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-15);
        }

        let mut c = LossDistribution::new(0.01).unwrap();
        c.add_outcomes(&[(0.25, 0.04), (0.75, 0.1)]);
        assert_abs_diff_eq!(c.mean(), 0.25 * 0.04 + 0.75 * 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(c.probabilities()[0], 0.0, epsilon = 1e-15);
    }

    // ========================================
    // CountDistribution
    // ========================================

    #[test]
    fn test_counts_binomial() {
        let mut c = CountDistribution::new(3);
        for _ in 0..3 {
            c.add_name(0.1);
        }
        assert_abs_diff_eq!(c.probabilities()[0], 0.729, epsilon = 1e-14);
        assert_abs_diff_eq!(c.probabilities()[3], 0.001, epsilon = 1e-14);
        assert_abs_diff_eq!(c.at_least(1), 0.271, epsilon = 1e-14);
    }

    proptest! {
        #[test]
        fn prop_mass_conserved(
            losses in proptest::collection::vec((0.0f64..1.0, 0.0f64..0.3), 1..20),
            step in 0.001f64..0.2,
        ) {
            let mut d = LossDistribution::new(step).unwrap();
            let mut mean = 0.0;
            for (p, l) in &losses {
                d.add_loss(*p, *l);
                mean += p * l;
            }
            prop_assert!((d.total_mass() - 1.0).abs() < 1e-10);
            prop_assert!(d.probabilities().iter().all(|p| *p >= -1e-15));
            // capped at 100% loss, so the mean can only fall short
            prop_assert!(d.mean() <= mean + 1e-10);
        }
    }
}
