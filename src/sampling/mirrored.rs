use nalgebra::DVector;

use super::Sampler;
use crate::{error::Result, rng::RandomNumberGenerator};

/// Alternates between a fresh draw from the base sampler and the exact
/// negation of that draw.
#[derive(Debug, Clone)]
pub struct MirroredSampler<S: Sampler> {
    base: S,
    last: Option<DVector<f64>>,
}

impl<S: Sampler> MirroredSampler<S> {
    pub fn new(base: S) -> Self {
        Self { base, last: None }
    }
}

impl<S: Sampler> Sampler for MirroredSampler<S> {
    fn dimension(&self) -> usize {
        self.base.dimension()
    }

    fn next(&mut self, rng: &mut RandomNumberGenerator) -> Result<DVector<f64>> {
        match self.last.take() {
            Some(last) => Ok(-last),
            None => {
                let sample = self.base.next(rng)?;
                self.last = Some(sample.clone());
                Ok(sample)
            }
        }
    }
}
