use nalgebra::DVector;

use super::Sampler;
use crate::{error::Result, rng::RandomNumberGenerator};

/// Draws vectors of independent N(0, 1) values.
#[derive(Debug, Clone)]
pub struct GaussianSampler {
    n: usize,
}

impl GaussianSampler {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl Sampler for GaussianSampler {
    fn dimension(&self) -> usize {
        self.n
    }

    fn next(&mut self, rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        Ok(rng.standard_normal_vector(self.n))
    }
}
