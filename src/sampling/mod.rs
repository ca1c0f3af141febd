//! # Samplers
//!
//! A `Sampler` supplies the raw mutation vectors `z` that the mutation
//! operators shape with the adapted covariance and scale with the step size.
//!
//! Base samplers draw vectors directly:
//!
//! - [`GaussianSampler`]: independent standard-normal draws.
//! - [`QuasiSobolSampler`]: a Sobol low-discrepancy sequence mapped through
//!   the inverse normal CDF.
//! - [`QuasiHaltonSampler`]: the same for a Halton sequence (`halton` feature).
//!
//! Wrapping samplers own another sampler and post-process its output:
//!
//! - [`OrthogonalSampler`]: orthonormalizes a batch of draws and restores
//!   their original lengths.
//! - [`MirroredSampler`]: alternates between a fresh draw and its negation.
//!
//! Wrappers nest by value, so a sampler stack is exclusively owned by the run
//! that built it.
//!
//! ```rust
//! use evostrat::rng::RandomNumberGenerator;
//! use evostrat::sampling::{GaussianSampler, MirroredSampler, Sampler};
//!
//! let mut rng = RandomNumberGenerator::from_seed(1);
//! let mut sampler = MirroredSampler::new(GaussianSampler::new(3));
//!
//! let v = sampler.next(&mut rng).unwrap();
//! let w = sampler.next(&mut rng).unwrap();
//! assert_eq!(w, -v);
//! ```

pub mod gaussian;
pub mod mirrored;
pub mod orthogonal;
pub mod quasi;

use std::fmt::Debug;

use nalgebra::DVector;

use crate::{error::Result, rng::RandomNumberGenerator};

pub use gaussian::GaussianSampler;
pub use mirrored::MirroredSampler;
pub use orthogonal::OrthogonalSampler;
pub use quasi::{QuasiHaltonSampler, QuasiSobolSampler};

/// Source of mutation vectors.
///
/// Sampler state is only changed through `next`; a sampler must not be shared
/// between two optimizer runs.
pub trait Sampler: Debug + Send {
    /// Dimensionality of the vectors produced.
    fn dimension(&self) -> usize;

    /// Draws the next vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the sampler cannot produce a finite vector.
    fn next(&mut self, rng: &mut RandomNumberGenerator) -> Result<DVector<f64>>;
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn next(&mut self, rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        (**self).next(rng)
    }
}
