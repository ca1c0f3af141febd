//! # Individual
//!
//! An `Individual` is one candidate solution: a real-valued genotype, the
//! fitness assigned to it by the last evaluation, and the bookkeeping that the
//! adaptation rules need from its most recent mutation.
//!
//! Fitness is minimised. A freshly created individual carries a fitness of
//! `f64::INFINITY`, so any evaluated individual beats it.

use nalgebra::DVector;

/// A single candidate solution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    /// The point in the search space.
    pub genotype: DVector<f64>,
    /// Fitness of `genotype`; lower is better.
    pub fitness: f64,
    /// Per-individual step size for self-adaptive variants.
    pub sigma: Option<f64>,
    /// The raw draw from the sampler used in the last mutation.
    pub last_z: DVector<f64>,
    /// The shaped step of the last mutation, before scaling by the step size.
    pub mutation_vector: DVector<f64>,
}

impl Individual {
    /// Creates an individual at the origin of an `n`-dimensional space.
    pub fn new(n: usize) -> Self {
        Self::at(DVector::zeros(n))
    }

    /// Creates an unevaluated individual at the given point.
    pub fn at(genotype: DVector<f64>) -> Self {
        let n = genotype.len();
        Self {
            genotype,
            fitness: f64::INFINITY,
            sigma: None,
            last_z: DVector::zeros(n),
            mutation_vector: DVector::zeros(n),
        }
    }

    /// Returns the dimensionality of the genotype.
    pub fn dimension(&self) -> usize {
        self.genotype.len()
    }

    /// Returns true if this individual is strictly better than `other`.
    pub fn improves_on(&self, other: &Individual) -> bool {
        self.fitness < other.fitness
    }
}
