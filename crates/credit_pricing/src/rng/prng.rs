//! Pseudo-random number generator wrapper for default-time simulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1, StandardNormal};

/// Seeded generator for Monte Carlo paths.
///
/// # Examples
///
/// ```rust
/// use credit_pricing::rng::BasketRng;
///
/// let mut rng = BasketRng::from_seed(42);
/// let u = rng.gen_uniform();
/// assert!((0.0..1.0).contains(&u));
///
/// let mut buffer = vec![0.0; 16];
/// rng.fill_normal(&mut buffer);
/// ```
pub struct BasketRng {
    inner: StdRng,
    seed: u64,
}

impl BasketRng {
    /// Generator initialised with `seed`; equal seeds give equal streams.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Uniform in the open interval (0, 1).
    #[inline]
    pub fn gen_open_uniform(&mut self) -> f64 {
        loop {
            let u: f64 = self.inner.gen();
            if u > 0.0 {
                return u;
            }
        }
    }

    /// Standard normal variate (Ziggurat via `rand_distr::StandardNormal`).
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }

    /// Unit-mean exponential variate.
    #[inline]
    pub fn gen_exp(&mut self) -> f64 {
        Exp1.sample(&mut self.inner)
    }

    /// Draw from any `f64` distribution.
    #[inline]
    pub fn sample<D: Distribution<f64>>(&mut self, dist: &D) -> f64 {
        dist.sample(&mut self.inner)
    }

    /// Fill `buffer` with standard normal variates.
    #[inline]
    pub fn fill_normal(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = StandardNormal.sample(&mut self.inner);
        }
    }
}
