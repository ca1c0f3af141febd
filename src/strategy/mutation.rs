use nalgebra::DVector;

use crate::{
    error::{OptimizerError, Result},
    individual::Individual,
    parameters::Parameters,
    rng::RandomNumberGenerator,
    sampling::Sampler,
};

/// # Mutation
///
/// Mutates a single offspring in place using a draw `z` from the owned
/// sampler. Every variant stores `z` in `last_z` and the shaped, unscaled step
/// in `mutation_vector`, so that `genotype = start + step_size * mutation_vector`.
#[derive(Debug)]
pub enum Mutation {
    /// `x += sigma * z`.
    AddRandomOffset { sampler: Box<dyn Sampler> },
    /// `x += sigma * B (D * z)`, optionally pushing short draws out to the
    /// threshold-convergence radius first.
    Cma {
        sampler: Box<dyn Sampler>,
        threshold_convergence: bool,
    },
    /// Like `Cma`, with a per-individual step size
    /// `sigma_mean * exp(tau * N(0, 1))`.
    Cmsa { sampler: Box<dyn Sampler> },
    /// `x += sigma * A z`.
    Cholesky { sampler: Box<dyn Sampler> },
}

impl Mutation {
    pub fn add_random_offset(sampler: impl Sampler + 'static) -> Self {
        Mutation::AddRandomOffset {
            sampler: Box::new(sampler),
        }
    }

    pub fn cma(sampler: impl Sampler + 'static, threshold_convergence: bool) -> Self {
        Mutation::Cma {
            sampler: Box::new(sampler),
            threshold_convergence,
        }
    }

    pub fn cmsa(sampler: impl Sampler + 'static) -> Self {
        Mutation::Cmsa {
            sampler: Box::new(sampler),
        }
    }

    pub fn cholesky(sampler: impl Sampler + 'static) -> Self {
        Mutation::Cholesky {
            sampler: Box::new(sampler),
        }
    }

    fn sampler_mut(&mut self) -> &mut Box<dyn Sampler> {
        match self {
            Mutation::AddRandomOffset { sampler }
            | Mutation::Cma { sampler, .. }
            | Mutation::Cmsa { sampler }
            | Mutation::Cholesky { sampler } => sampler,
        }
    }

    /// Mutates `individual` in place.
    ///
    /// ## Errors
    ///
    /// Returns an error if the sampler fails or produces a vector whose
    /// dimension does not match the individual.
    pub fn mutate(
        &mut self,
        individual: &mut Individual,
        params: &Parameters,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let mut z = self.sampler_mut().next(rng)?;
        if z.len() != individual.dimension() {
            return Err(OptimizerError::Sampling(format!(
                "Sampler produced {} values for a {}-dimensional individual",
                z.len(),
                individual.dimension()
            )));
        }

        let (step_size, mutation_vector) = match self {
            Mutation::AddRandomOffset { .. } => (params.sigma, z.clone()),
            Mutation::Cma {
                threshold_convergence,
                ..
            } => {
                if *threshold_convergence {
                    scale_with_threshold(&mut z, params.threshold, rng);
                }
                (params.sigma, shape_with_eigen(&z, params))
            }
            Mutation::Cmsa { .. } => {
                let sigma = params.sigma_mean * (params.tau * rng.standard_normal()).exp();
                individual.sigma = Some(sigma);
                (sigma, shape_with_eigen(&z, params))
            }
            Mutation::Cholesky { .. } => (params.sigma, &params.A * &z),
        };

        individual.genotype += &mutation_vector * step_size;
        individual.mutation_vector = mutation_vector;
        individual.last_z = z;
        Ok(())
    }
}

fn shape_with_eigen(z: &DVector<f64>, params: &Parameters) -> DVector<f64> {
    &params.B * params.D.component_mul(z)
}

/// Pushes a draw shorter than `threshold` out to a random length in
/// `[threshold, 2 * threshold - |z|]`.
fn scale_with_threshold(z: &mut DVector<f64>, threshold: f64, rng: &mut RandomNumberGenerator) {
    let length = z.norm();
    if length > 0.0 && length < threshold {
        let new_length = threshold + (threshold - length) * rng.uniform();
        *z *= new_length / length;
    }
}
