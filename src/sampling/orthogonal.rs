use nalgebra::DVector;
use tracing::trace;

use super::Sampler;
use crate::{
    error::{OptimizerError, Result},
    rng::RandomNumberGenerator,
};

/// Orthogonalizes batches of draws from a base sampler.
///
/// Every `lambda`-th call draws `lambda` vectors from the base sampler,
/// orthonormalizes the first `min(lambda, n)` of them with Gram-Schmidt and
/// scales each back to the length it was drawn with. The batch is then served
/// one vector per call.
#[derive(Debug, Clone)]
pub struct OrthogonalSampler<S: Sampler> {
    base: S,
    lambda: usize,
    current: usize,
    samples: Vec<DVector<f64>>,
    max_attempts: usize,
}

impl<S: Sampler> OrthogonalSampler<S> {
    /// Creates an orthogonal sampler serving batches of `lambda` vectors.
    ///
    /// A `lambda` of zero is treated as one.
    pub fn new(base: S, lambda: usize) -> Self {
        Self {
            base,
            lambda: lambda.max(1),
            current: 0,
            samples: Vec::new(),
            max_attempts: 1000,
        }
    }

    /// Sets how many times a batch containing non-finite values is redrawn
    /// before giving up.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Batch size.
    pub fn lambda(&self) -> usize {
        self.lambda
    }

    fn generate_samples(&mut self, rng: &mut RandomNumberGenerator) -> Result<bool> {
        let mut samples = Vec::with_capacity(self.lambda);
        let mut lengths = Vec::with_capacity(self.lambda);
        for _ in 0..self.lambda {
            let sample = self.base.next(rng)?;
            lengths.push(sample.norm());
            samples.push(sample);
        }

        let num_orthogonal = self.lambda.min(self.base.dimension());
        self.gram_schmidt(&mut samples[..num_orthogonal], rng)?;
        for (sample, length) in samples.iter_mut().zip(&lengths).take(num_orthogonal) {
            *sample *= *length;
        }

        let valid = samples.iter().all(|s| s.iter().all(|x| x.is_finite()));
        self.samples = samples;
        Ok(valid)
    }

    /// Orthonormalizes `vectors` in place.
    ///
    /// A vector that collapses to zero is replaced by a fresh normalized draw.
    fn gram_schmidt(
        &mut self,
        vectors: &mut [DVector<f64>],
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        for i in 1..vectors.len() {
            for j in 0..i {
                let norm_j = vectors[j].norm_squared();
                if norm_j == 0.0 {
                    continue;
                }
                let projection = &vectors[j] * (vectors[i].dot(&vectors[j]) / norm_j);
                vectors[i] -= projection;
            }
        }

        for vector in vectors.iter_mut() {
            let norm = vector.norm();
            if norm == 0.0 {
                let fresh = self.base.next(rng)?;
                *vector = &fresh / fresh.norm();
            } else {
                *vector /= norm;
            }
        }

        Ok(())
    }
}

impl<S: Sampler> Sampler for OrthogonalSampler<S> {
    fn dimension(&self) -> usize {
        self.base.dimension()
    }

    fn next(&mut self, rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        if self.current % self.lambda == 0 {
            self.current = 0;
            let mut attempts = 0;
            while !self.generate_samples(rng)? {
                attempts += 1;
                trace!(attempts, "orthogonal batch contained non-finite values, redrawing");
                if attempts >= self.max_attempts {
                    return Err(OptimizerError::MaxAttemptsReached(format!(
                        "Orthogonal sampler could not draw a finite batch in {} attempts",
                        self.max_attempts
                    )));
                }
            }
        }

        self.current += 1;
        Ok(self.samples[self.current - 1].clone())
    }
}
