use nalgebra::DVector;

use crate::{
    error::{OptimizerError, Result},
    individual::Individual,
    parameters::Parameters,
};

/// # Recombination
///
/// Turns the `mu` parents of a generation into up to `lambda` unmutated
/// offspring.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recombination {
    /// Every offspring is a copy of the first parent.
    OnePlusOne,
    /// Every offspring starts at the weighted mean of the parents, which
    /// becomes the new distribution mean `wcm`.
    Weighted,
}

impl Recombination {
    /// Creates `min(params.lambda, limit)` offspring from `parents`.
    ///
    /// ## Parameters
    ///
    /// - `parents`: The current parents, best first.
    /// - `params`: The parameter state; `Weighted` updates `wcm` and `wcm_old`.
    /// - `limit`: Upper bound on the offspring count, usually the remaining budget.
    ///
    /// ## Errors
    ///
    /// Returns `EmptyPopulation` if there are no parents.
    pub fn recombine(
        &self,
        parents: &[Individual],
        params: &mut Parameters,
        limit: usize,
    ) -> Result<Vec<Individual>> {
        let first = parents.first().ok_or(OptimizerError::EmptyPopulation)?;
        let count = params.lambda.min(limit);

        match self {
            Recombination::OnePlusOne => {
                params.wcm_old = params.wcm.clone();
                params.wcm = first.genotype.clone();
                Ok(vec![first.clone(); count])
            }
            Recombination::Weighted => {
                let used = parents.len().min(params.weights.len());
                let weights = params.weights.rows(0, used);
                let total: f64 = weights.sum();

                let mut wcm = DVector::zeros(params.n);
                if total > 0.0 {
                    for (parent, w) in parents.iter().zip(weights.iter()) {
                        wcm += &parent.genotype * (*w / total);
                    }
                } else {
                    wcm = first.genotype.clone();
                }

                params.wcm_old = std::mem::replace(&mut params.wcm, wcm);
                Ok((0..count)
                    .map(|_| Individual::at(params.wcm.clone()))
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSettings;

    fn parent(values: &[f64], fitness: f64) -> Individual {
        let mut ind = Individual::at(DVector::from_vec(values.to_vec()));
        ind.fitness = fitness;
        ind
    }

    #[test]
    fn test_weighted_mean_with_equal_weights() {
        let mut params = Parameters::new(ParameterSettings {
            weights_option: crate::parameters::WeightsOption::Equal,
            ..ParameterSettings::new(2, 100).with_mu_count(2).with_lambda(5)
        })
        .unwrap();

        let parents = vec![parent(&[0.0, 2.0], 1.0), parent(&[2.0, 4.0], 2.0)];
        let offspring = Recombination::Weighted
            .recombine(&parents, &mut params, usize::MAX)
            .unwrap();

        assert_eq!(offspring.len(), 5);
        assert_eq!(params.wcm, DVector::from_vec(vec![1.0, 3.0]));
        assert_eq!(params.wcm_old, DVector::zeros(2));
        assert!(offspring.iter().all(|o| o.genotype == params.wcm));
        assert!(offspring.iter().all(|o| o.fitness.is_infinite()));
    }

    #[test]
    fn test_weighted_mean_favours_better_parent() {
        let mut params =
            Parameters::new(ParameterSettings::new(1, 100).with_mu_count(2).with_lambda(6))
                .unwrap();
        let parents = vec![parent(&[0.0], 1.0), parent(&[1.0], 2.0)];
        Recombination::Weighted.recombine(&parents, &mut params, usize::MAX).unwrap();
        assert!(params.wcm[0] < 0.5);
    }

    #[test]
    fn test_one_plus_one_copies_parent() {
        let mut params =
            Parameters::new(ParameterSettings::new(2, 100).with_mu_count(1).with_lambda(1))
                .unwrap();
        let parents = vec![parent(&[1.0, -1.0], 0.3)];
        let offspring = Recombination::OnePlusOne
            .recombine(&parents, &mut params, usize::MAX)
            .unwrap();
        assert_eq!(offspring.len(), 1);
        assert_eq!(offspring[0].genotype, parents[0].genotype);
    }

    #[test]
    fn test_offspring_capped_by_limit() {
        let mut params =
            Parameters::new(ParameterSettings::new(2, 100).with_mu_count(1).with_lambda(64))
                .unwrap();
        let parents = vec![parent(&[1.0, 2.0], 0.5)];

        let offspring = Recombination::Weighted.recombine(&parents, &mut params, 3).unwrap();
        assert_eq!(offspring.len(), 3);
        assert_eq!(params.wcm, DVector::from_vec(vec![1.0, 2.0]));

        let offspring = Recombination::OnePlusOne.recombine(&parents, &mut params, 0).unwrap();
        assert!(offspring.is_empty());
    }

    #[test]
    fn test_no_parents() {
        let mut params = Parameters::new(ParameterSettings::new(2, 100)).unwrap();
        let result = Recombination::Weighted.recombine(&[], &mut params, 10);
        assert!(matches!(result, Err(OptimizerError::EmptyPopulation)));
    }
}
