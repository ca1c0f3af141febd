use crate::{
    error::{OptimizerError, Result},
    individual::Individual,
    parameters::Parameters,
    selection::selection_strategy::SelectionStrategy,
};

/// (1+1) selection: the single offspring replaces the single parent only if
/// it is strictly better.
///
/// The outcome is written to the success history at the current used budget,
/// and the offspring's raw mutation vector is handed to the parameter state,
/// whether it survived or not.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePlusOneSelection;

impl SelectionStrategy for OnePlusOneSelection {
    fn select(
        &self,
        parents: Vec<Individual>,
        offspring: Vec<Individual>,
        used_budget: usize,
        params: &mut Parameters,
    ) -> Result<Vec<Individual>> {
        let parent = parents
            .into_iter()
            .next()
            .ok_or(OptimizerError::EmptyPopulation)?;
        let child = offspring
            .into_iter()
            .next()
            .ok_or(OptimizerError::EmptyPopulation)?;

        let success = child.improves_on(&parent);
        params.add_to_success_history(used_budget, success);
        params.last_z = child.last_z.clone();

        let survivor = if success { child.clone() } else { parent };
        params.record_selection(std::slice::from_ref(&child), std::slice::from_ref(&survivor));

        Ok(vec![survivor])
    }
}
