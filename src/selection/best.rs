use crate::{
    error::{OptimizerError, Result},
    individual::Individual,
    parameters::Parameters,
    selection::selection_strategy::{sort_by_fitness, SelectionStrategy},
};

/// (mu + lambda) or (mu, lambda) truncation selection.
///
/// With `params.elitist` set, parents compete with the offspring; otherwise
/// only the offspring are considered. The `mu_int` best candidates survive,
/// ties broken by their order in the pool (offspring before parents).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default)]
pub struct BestSelection;

impl SelectionStrategy for BestSelection {
    fn select(
        &self,
        parents: Vec<Individual>,
        mut offspring: Vec<Individual>,
        _used_budget: usize,
        params: &mut Parameters,
    ) -> Result<Vec<Individual>> {
        sort_by_fitness(&mut offspring);

        let mut pool = offspring.clone();
        if params.elitist {
            pool.extend(parents);
        }
        if pool.is_empty() {
            return Err(OptimizerError::EmptyPopulation);
        }

        sort_by_fitness(&mut pool);
        pool.truncate(params.mu_int);

        params.record_selection(&offspring, &pool);
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSettings;

    fn with_fitness(values: &[f64]) -> Vec<Individual> {
        values
            .iter()
            .map(|&f| {
                let mut ind = Individual::new(2);
                ind.fitness = f;
                ind
            })
            .collect()
    }

    fn params(elitist: bool) -> Parameters {
        Parameters::new(
            ParameterSettings::new(2, 100)
                .with_mu_count(2)
                .with_lambda(3)
                .with_elitist(elitist),
        )
        .unwrap()
    }

    fn fitnesses(individuals: &[Individual]) -> Vec<f64> {
        individuals.iter().map(|i| i.fitness).collect()
    }

    #[test]
    fn test_better_offspring_win_either_way() {
        for elitist in [true, false] {
            let mut p = params(elitist);
            let survivors = BestSelection
                .select(with_fitness(&[3.0, 5.0]), with_fitness(&[1.0, 2.0, 4.0]), 5, &mut p)
                .unwrap();
            assert_eq!(fitnesses(&survivors), vec![1.0, 2.0]);
        }
    }

    #[test]
    fn test_comma_selection_ignores_parents() {
        let mut p = params(false);
        let survivors = BestSelection
            .select(with_fitness(&[3.0, 5.0]), with_fitness(&[10.0, 11.0, 12.0]), 5, &mut p)
            .unwrap();
        assert_eq!(fitnesses(&survivors), vec![10.0, 11.0]);
    }

    #[test]
    fn test_plus_selection_keeps_better_parents() {
        let mut p = params(true);
        let survivors = BestSelection
            .select(with_fitness(&[3.0, 5.0]), with_fitness(&[10.0, 11.0, 12.0]), 5, &mut p)
            .unwrap();
        assert_eq!(fitnesses(&survivors), vec![3.0, 5.0]);
    }

    #[test]
    fn test_records_sorted_offspring_steps() {
        let mut p = params(false);
        let mut offspring = with_fitness(&[2.0, 1.0, 3.0]);
        for (i, ind) in offspring.iter_mut().enumerate() {
            ind.mutation_vector[0] = i as f64;
        }
        BestSelection.select(vec![], offspring, 3, &mut p).unwrap();

        let firsts: Vec<f64> = p.offspring_steps.iter().map(|s| s[0]).collect();
        assert_eq!(firsts, vec![1.0, 0.0, 2.0]);
        assert_eq!(p.selected_steps.len(), 2);
    }

    #[test]
    fn test_empty_pool() {
        let mut p = params(false);
        let result = BestSelection.select(with_fitness(&[1.0]), vec![], 1, &mut p);
        assert!(matches!(result, Err(OptimizerError::EmptyPopulation)));
    }
}
