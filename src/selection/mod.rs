pub mod best;
pub mod one_plus_one;
pub mod pairwise;
pub mod selection_strategy;

pub use best::BestSelection;
pub use one_plus_one::OnePlusOneSelection;
pub use pairwise::PairwiseSelection;
pub use selection_strategy::SelectionStrategy;

use crate::{error::Result, individual::Individual, parameters::Parameters};

/// The selection policies an optimizer can be configured with.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Best,
    Pairwise,
    OnePlusOne,
}

impl SelectionStrategy for Selection {
    fn select(
        &self,
        parents: Vec<Individual>,
        offspring: Vec<Individual>,
        used_budget: usize,
        params: &mut Parameters,
    ) -> Result<Vec<Individual>> {
        match self {
            Selection::Best => BestSelection.select(parents, offspring, used_budget, params),
            Selection::Pairwise => PairwiseSelection.select(parents, offspring, used_budget, params),
            Selection::OnePlusOne => {
                OnePlusOneSelection.select(parents, offspring, used_budget, params)
            }
        }
    }
}
