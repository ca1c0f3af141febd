use crate::{
    error::Result,
    individual::Individual,
    parameters::Parameters,
    selection::{
        best::BestSelection,
        selection_strategy::{compare_fitness, SelectionStrategy},
    },
};

/// Pairwise selection for mirrored sampling.
///
/// Offspring are taken in adjacent pairs and only the better of each pair
/// enters the pool, which is then reduced by [`BestSelection`]. Mirrored pairs
/// are correlated, so only one of them may survive. The configured offspring
/// count is even; a trailing offspring left unpaired by an early stop enters
/// the pool on its own.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseSelection;

impl SelectionStrategy for PairwiseSelection {
    fn select(
        &self,
        parents: Vec<Individual>,
        offspring: Vec<Individual>,
        used_budget: usize,
        params: &mut Parameters,
    ) -> Result<Vec<Individual>> {
        let mut winners = Vec::with_capacity(offspring.len().div_ceil(2));
        let mut iter = offspring.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) if compare_fitness(second.fitness, first.fitness).is_lt() => {
                    winners.push(second)
                }
                _ => winners.push(first),
            }
        }

        BestSelection.select(parents, winners, used_budget, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSettings;

    fn with_fitness(values: &[f64]) -> Vec<Individual> {
        values
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let mut ind = Individual::new(1);
                ind.genotype[0] = i as f64;
                ind.fitness = f;
                ind
            })
            .collect()
    }

    #[test]
    fn test_only_one_of_each_pair_survives() {
        let mut params = Parameters::new(
            ParameterSettings::new(1, 100).with_mu_count(2).with_lambda(4),
        )
        .unwrap();

        // Pairs (1, 2) and (3, 4): the two best overall share the first pair.
        let survivors = PairwiseSelection
            .select(vec![], with_fitness(&[1.0, 2.0, 4.0, 3.0]), 4, &mut params)
            .unwrap();

        let fitness: Vec<f64> = survivors.iter().map(|i| i.fitness).collect();
        assert_eq!(fitness, vec![1.0, 3.0]);
        assert_eq!(survivors[1].genotype[0], 3.0);
    }

    #[test]
    fn test_trailing_offspring_stands_alone() {
        let mut params = Parameters::new(
            ParameterSettings::new(1, 100).with_mu_count(2).with_lambda(3),
        )
        .unwrap();

        let survivors = PairwiseSelection
            .select(vec![], with_fitness(&[5.0, 6.0, 0.5]), 3, &mut params)
            .unwrap();
        let fitness: Vec<f64> = survivors.iter().map(|i| i.fitness).collect();
        assert_eq!(fitness, vec![0.5, 5.0]);
    }

    #[test]
    fn test_tie_keeps_first_of_pair() {
        let mut params = Parameters::new(
            ParameterSettings::new(1, 100).with_mu_count(1).with_lambda(2),
        )
        .unwrap();
        let survivors = PairwiseSelection
            .select(vec![], with_fitness(&[1.0, 1.0]), 2, &mut params)
            .unwrap();
        assert_eq!(survivors[0].genotype[0], 0.0);
    }
}
