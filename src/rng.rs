//! # RandomNumberGenerator
//!
//! The `RandomNumberGenerator` struct provides the random draws the optimizer
//! needs: uniform scalars, uniform points inside a box and standard-normal
//! vectors. Every optimization run owns its own generator, so two concurrent
//! runs never share random state.
//!
//! ## Example
//!
//! ```rust
//! use evostrat::rng::RandomNumberGenerator;
//!
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let z = rng.standard_normal_vector(5);
//! assert_eq!(z.len(), 5);
//!
//! let point = rng.uniform_vector(3, -5.0, 5.0);
//! assert!(point.iter().all(|x| (-5.0..5.0).contains(x)));
//! ```

use nalgebra::DVector;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// A wrapper around the `rand` crate's `StdRng` that provides the draws used
/// by samplers, mutation operators and the restart scheduler.
#[derive(Clone, Debug)]
pub struct RandomNumberGenerator {
    pub rng: StdRng,
}

impl RandomNumberGenerator {
    /// Creates a new `RandomNumberGenerator` instance seeded from the system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a new `RandomNumberGenerator` instance with a specific seed.
    ///
    /// This is useful for reproducible tests and benchmarks.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws a single value from U(0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Draws a single value from N(0, 1).
    pub fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Draws an integer from the half-open range `[from, to)`.
    pub fn integer(&mut self, from: u32, to: u32) -> u32 {
        self.rng.gen_range(from..to)
    }

    /// Generates a vector of `n` independent standard-normal draws.
    pub fn standard_normal_vector(&mut self, n: usize) -> DVector<f64> {
        DVector::from_iterator(n, (0..n).map(|_| self.rng.sample::<f64, _>(StandardNormal)))
    }

    /// Generates a point drawn uniformly from the box `[from, to)^n`.
    ///
    /// # Parameters
    ///
    /// - `n`: The dimensionality of the point.
    /// - `from`: The lower bound of every coordinate (inclusive).
    /// - `to`: The upper bound of every coordinate (exclusive).
    pub fn uniform_vector(&mut self, n: usize, from: f64, to: f64) -> DVector<f64> {
        DVector::from_iterator(n, (0..n).map(|_| self.rng.gen_range(from..to)))
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}
