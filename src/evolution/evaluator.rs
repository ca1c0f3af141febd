//! # Evaluator
//!
//! The `Evaluator` trait is the fitness capability the optimizer consumes: a
//! single genotype in, a fitness value out, plus a batch form that must
//! preserve order. Lower fitness is better.
//!
//! Any `Fn(&DVector<f64>) -> f64` is an evaluator. [`ParallelEvaluator`] wraps
//! such a function and evaluates large batches on the rayon thread pool;
//! [`BatchEvaluator`] wraps a function that already takes whole batches.
//!
//! ## Example
//!
//! ```rust
//! use evostrat::evolution::{Evaluator, ParallelEvaluator};
//! use nalgebra::DVector;
//!
//! let sphere = |x: &DVector<f64>| x.norm_squared();
//! let parallel = ParallelEvaluator::new(sphere).with_parallel_threshold(2);
//!
//! let batch = vec![DVector::from_element(2, 1.0), DVector::zeros(2), DVector::from_element(2, 2.0)];
//! assert_eq!(parallel.evaluate_batch(&batch).unwrap(), vec![2.0, 0.0, 8.0]);
//! ```

use nalgebra::DVector;
use rayon::prelude::*;

use crate::error::{OptimizerError, Result};

/// A fitness function to be minimised.
pub trait Evaluator: Send + Sync {
    /// Evaluates a single genotype.
    ///
    /// # Errors
    ///
    /// Returns an error if the evaluation itself fails.
    fn evaluate(&self, genotype: &DVector<f64>) -> Result<f64>;

    /// Evaluates a batch of genotypes, returning one value per genotype in
    /// input order.
    ///
    /// The default implementation evaluates the batch sequentially.
    ///
    /// # Errors
    ///
    /// Returns an error if any evaluation fails.
    fn evaluate_batch(&self, genotypes: &[DVector<f64>]) -> Result<Vec<f64>> {
        genotypes.iter().map(|g| self.evaluate(g)).collect()
    }
}

impl<F> Evaluator for F
where
    F: Fn(&DVector<f64>) -> f64 + Send + Sync,
{
    fn evaluate(&self, genotype: &DVector<f64>) -> Result<f64> {
        Ok(self(genotype))
    }
}

/// Evaluates batches in parallel once they reach a size threshold.
#[derive(Debug, Clone)]
pub struct ParallelEvaluator<F> {
    function: F,
    /// Minimum batch size to evaluate in parallel
    parallel_threshold: usize,
}

impl<F> ParallelEvaluator<F>
where
    F: Fn(&DVector<f64>) -> f64 + Send + Sync,
{
    /// Wraps `function` with a parallel threshold of 16.
    pub fn new(function: F) -> Self {
        Self {
            function,
            parallel_threshold: 16,
        }
    }

    /// Sets the minimum batch size that is evaluated in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }
}

impl<F> Evaluator for ParallelEvaluator<F>
where
    F: Fn(&DVector<f64>) -> f64 + Send + Sync,
{
    fn evaluate(&self, genotype: &DVector<f64>) -> Result<f64> {
        Ok((self.function)(genotype))
    }

    fn evaluate_batch(&self, genotypes: &[DVector<f64>]) -> Result<Vec<f64>> {
        if genotypes.len() >= self.parallel_threshold {
            Ok(genotypes.par_iter().map(|g| (self.function)(g)).collect())
        } else {
            Ok(genotypes.iter().map(|g| (self.function)(g)).collect())
        }
    }
}

/// Adapts a function that evaluates whole batches.
///
/// The wrapped function must return exactly one value per genotype.
#[derive(Debug, Clone)]
pub struct BatchEvaluator<F>(pub F);

impl<F> Evaluator for BatchEvaluator<F>
where
    F: Fn(&[DVector<f64>]) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, genotype: &DVector<f64>) -> Result<f64> {
        let values = self.evaluate_batch(std::slice::from_ref(genotype))?;
        values.first().copied().ok_or_else(|| {
            OptimizerError::FitnessCalculation("Batch evaluator returned no value".to_string())
        })
    }

    fn evaluate_batch(&self, genotypes: &[DVector<f64>]) -> Result<Vec<f64>> {
        let values = (self.0)(genotypes);
        if values.len() != genotypes.len() {
            return Err(OptimizerError::FitnessCalculation(format!(
                "Batch evaluator returned {} values for {} genotypes",
                values.len(),
                genotypes.len()
            )));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &DVector<f64>) -> f64 {
        x.norm_squared()
    }

    #[test]
    fn test_closure_is_evaluator() {
        let x = DVector::from_vec(vec![1.0, 2.0]);
        assert_eq!(sphere.evaluate(&x).unwrap(), 5.0);
    }

    #[test]
    fn test_parallel_preserves_order() {
        let evaluator = ParallelEvaluator::new(sphere).with_parallel_threshold(1);
        let batch: Vec<DVector<f64>> = (0..200).map(|i| DVector::from_element(1, i as f64)).collect();

        let values = evaluator.evaluate_batch(&batch).unwrap();
        let expected: Vec<f64> = (0..200).map(|i| (i * i) as f64).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_parallel_below_threshold() {
        let evaluator = ParallelEvaluator::new(sphere).with_parallel_threshold(100);
        assert_eq!(evaluator.parallel_threshold(), 100);
        let values = evaluator
            .evaluate_batch(&[DVector::from_element(1, 3.0)])
            .unwrap();
        assert_eq!(values, vec![9.0]);
    }

    #[test]
    fn test_batch_evaluator_checks_length() {
        let short = BatchEvaluator(|_: &[DVector<f64>]| vec![1.0]);
        let batch = vec![DVector::zeros(1), DVector::zeros(1)];
        assert!(matches!(
            short.evaluate_batch(&batch),
            Err(OptimizerError::FitnessCalculation(_))
        ));

        let exact = BatchEvaluator(|b: &[DVector<f64>]| b.iter().map(|x| x.sum()).collect());
        assert_eq!(exact.evaluate(&DVector::from_element(3, 1.0)).unwrap(), 3.0);
    }
}
