//! Quasi-random samplers.
//!
//! Both samplers walk a low-discrepancy sequence in `[0, 1)^n` and map every
//! coordinate through the inverse standard-normal CDF, producing vectors that
//! behave like N(0, I) draws but cover the space more evenly.

use std::fmt;

use nalgebra::DVector;
use statrs::distribution::{ContinuousCDF, Normal};

use super::Sampler;
use crate::{
    error::{OptimizerError, Result, ResultExt},
    rng::RandomNumberGenerator,
};

/// Keeps probabilities away from 0 and 1, where the inverse CDF is infinite.
const PROBABILITY_MARGIN: f64 = 1e-12;

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).context("Failed to build the standard normal distribution")
}

fn to_gaussian(normal: &Normal, p: f64) -> f64 {
    normal.inverse_cdf(p.clamp(PROBABILITY_MARGIN, 1.0 - PROBABILITY_MARGIN))
}

/// Quasi-Gaussian sampler backed by a (scrambled) Sobol sequence.
///
/// Sequence index 1 yields the zero vector in the unscrambled sequence, so the
/// index never drops below 2.
#[derive(Debug, Clone)]
pub struct QuasiSobolSampler {
    n: usize,
    index: u32,
    seed: u32,
    normal: Normal,
}

impl QuasiSobolSampler {
    /// Index at which the sequence starts at the earliest.
    pub const MIN_INDEX: u32 = 2;

    /// Creates a sampler starting at a random index in `[2, n^2)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `n` exceeds the number of dimensions
    /// supported by the Sobol backend.
    pub fn new(n: usize, rng: &mut RandomNumberGenerator) -> Result<Self> {
        let upper = n
            .saturating_mul(n)
            .clamp(Self::MIN_INDEX as usize + 1, u32::MAX as usize) as u32;
        let index = rng.integer(Self::MIN_INDEX, upper);
        let seed = rng.integer(0, u32::MAX);
        Self::with_start_index(n, index, seed)
    }

    /// Creates a sampler starting at a fixed index.
    ///
    /// Indices below 2 are moved up to 2.
    pub fn with_start_index(n: usize, index: u32, seed: u32) -> Result<Self> {
        if n == 0 {
            return Err(OptimizerError::Configuration(
                "Sobol sampler needs at least one dimension".to_string(),
            ));
        }
        if n > sobol_burley::NUM_DIMENSIONS as usize {
            return Err(OptimizerError::Configuration(format!(
                "Sobol sampler supports at most {} dimensions, got {}",
                sobol_burley::NUM_DIMENSIONS,
                n
            )));
        }

        Ok(Self {
            n,
            index: index.max(Self::MIN_INDEX),
            seed,
            normal: standard_normal()?,
        })
    }

    /// Index of the next point of the sequence.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Sampler for QuasiSobolSampler {
    fn dimension(&self) -> usize {
        self.n
    }

    fn next(&mut self, _rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        let index = self.index;
        let seed = self.seed;
        let normal = &self.normal;
        let vec = DVector::from_iterator(
            self.n,
            (0..self.n as u32)
                .map(|dim| to_gaussian(normal, sobol_burley::sample(index, dim, seed) as f64)),
        );

        self.index = self.index.wrapping_add(1).max(Self::MIN_INDEX);
        Ok(vec)
    }
}

/// Quasi-Gaussian sampler backed by a Halton sequence, one prime base per
/// dimension.
///
/// The backend is only compiled with the `halton` feature. Without it,
/// [`QuasiHaltonSampler::new`] fails with a configuration error.
pub struct QuasiHaltonSampler {
    n: usize,
    #[cfg(feature = "halton")]
    sequences: Vec<halton::Sequence>,
    normal: Normal,
}

impl fmt::Debug for QuasiHaltonSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuasiHaltonSampler")
            .field("n", &self.n)
            .field("normal", &self.normal)
            .finish_non_exhaustive()
    }
}

impl QuasiHaltonSampler {
    /// Returns true if the Halton backend was compiled in.
    pub const fn available() -> bool {
        cfg!(feature = "halton")
    }

    /// Creates a Halton sampler for `n` dimensions.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the backend is unavailable or if `n`
    /// needs a prime base larger than the backend accepts.
    #[cfg(feature = "halton")]
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(OptimizerError::Configuration(
                "Halton sampler needs at least one dimension".to_string(),
            ));
        }
        let bases = first_primes(n);
        if bases.len() < n || bases.iter().any(|&b| b > u8::MAX as u32) {
            return Err(OptimizerError::Configuration(format!(
                "Halton sampler supports at most {} dimensions, got {}",
                first_primes(usize::MAX).len(),
                n
            )));
        }

        Ok(Self {
            n,
            sequences: bases
                .into_iter()
                .map(|b| halton::Sequence::new(b as u8))
                .collect(),
            normal: standard_normal()?,
        })
    }

    /// Creates a Halton sampler for `n` dimensions.
    ///
    /// # Errors
    ///
    /// Always fails: the crate was built without the `halton` feature.
    #[cfg(not(feature = "halton"))]
    pub fn new(n: usize) -> Result<Self> {
        Err(OptimizerError::Configuration(format!(
            "Halton sampler for {} dimensions requested, but the `halton` feature is not enabled",
            n
        )))
    }
}

impl Sampler for QuasiHaltonSampler {
    fn dimension(&self) -> usize {
        self.n
    }

    #[cfg(feature = "halton")]
    fn next(&mut self, _rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        let mut vec = DVector::zeros(self.n);
        for (slot, sequence) in vec.iter_mut().zip(self.sequences.iter_mut()) {
            let p = sequence.next().ok_or_else(|| {
                OptimizerError::Sampling("Halton sequence exhausted".to_string())
            })?;
            *slot = to_gaussian(&self.normal, p);
        }
        Ok(vec)
    }

    #[cfg(not(feature = "halton"))]
    fn next(&mut self, _rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        Err(OptimizerError::Sampling(format!(
            "Halton backend unavailable for {} dimensions",
            self.n
        )))
    }
}

/// Primes up to 251 (the largest base the Halton backend accepts), at most `count` of them.
#[cfg(feature = "halton")]
fn first_primes(count: usize) -> Vec<u32> {
    (2u32..=u8::MAX as u32)
        .filter(|&c| (2..c).take_while(|d| d * d <= c).all(|d| c % d != 0))
        .take(count)
        .collect()
}
