use std::{cmp::Ordering, fmt::Debug};

use crate::{error::Result, individual::Individual, parameters::Parameters};

/// Trait for the survivor selection of an evolution strategy.
///
/// A selection strategy receives the current parents and the evaluated
/// offspring of one generation and returns the next parent population, best
/// first. Strategies record what they selected in the parameter state so the
/// adaptation rules can use it.
///
/// # Examples
///
/// ```
/// use evostrat::individual::Individual;
/// use evostrat::parameters::{ParameterSettings, Parameters};
/// use evostrat::selection::{BestSelection, SelectionStrategy};
/// use evostrat::error::Result;
///
/// fn main() -> Result<()> {
///     let mut params = Parameters::new(ParameterSettings::new(2, 100).with_mu_count(1).with_lambda(2))?;
///
///     let mut a = Individual::new(2);
///     a.fitness = 3.0;
///     let mut b = Individual::new(2);
///     b.fitness = 1.0;
///
///     let survivors = BestSelection.select(vec![], vec![a, b], 2, &mut params)?;
///     assert_eq!(survivors.len(), 1);
///     assert_eq!(survivors[0].fitness, 1.0);
///     Ok(())
/// }
/// ```
pub trait SelectionStrategy: Debug + Send + Sync {
    /// Selects the next parent population.
    ///
    /// # Arguments
    ///
    /// * `parents` - The parent population of the current generation.
    /// * `offspring` - The evaluated offspring of the current generation.
    /// * `used_budget` - Evaluations used so far, including this generation.
    /// * `params` - The parameter state of the run.
    ///
    /// # Returns
    ///
    /// The survivors, sorted by ascending fitness. Normally `params.mu_int`
    /// of them; fewer if the pool was smaller.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool of candidates is empty.
    fn select(
        &self,
        parents: Vec<Individual>,
        offspring: Vec<Individual>,
        used_budget: usize,
        params: &mut Parameters,
    ) -> Result<Vec<Individual>>;
}

/// Orders fitness values ascending with NaN last.
pub(crate) fn compare_fitness(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        _ => Ordering::Less,
    })
}

/// Stable sort by ascending fitness, so ties keep their input order.
pub(crate) fn sort_by_fitness(individuals: &mut [Individual]) {
    individuals.sort_by(|a, b| compare_fitness(a.fitness, b.fitness));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_sorts_last() {
        assert_eq!(compare_fitness(f64::NAN, 1.0), Ordering::Greater);
        assert_eq!(compare_fitness(1.0, f64::NAN), Ordering::Less);
        assert_eq!(compare_fitness(f64::NAN, f64::NAN), Ordering::Equal);
        assert_eq!(compare_fitness(1.0, 2.0), Ordering::Less);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut individuals: Vec<Individual> = [2.0, 1.0, 2.0, f64::NAN, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let mut ind = Individual::new(1);
                ind.genotype[0] = i as f64;
                ind.fitness = f;
                ind
            })
            .collect();

        sort_by_fitness(&mut individuals);
        let order: Vec<f64> = individuals.iter().map(|i| i.genotype[0]).collect();
        assert_eq!(order, vec![1.0, 4.0, 0.0, 2.0, 3.0]);
    }
}
