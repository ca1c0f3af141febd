use crate::{
    error::{OptimizerError, Result},
    parameters::Parameters,
    selection::Selection,
    strategy::{Mutation, Recombination},
};

use super::{
    optimizer::{ExternalCheck, Optimizer},
    options::EvaluationMode,
};

/// Assembles an [`Optimizer`] from its parts.
///
/// Parameters, recombination, mutation and selection are required; the
/// evaluation mode defaults to sequential and the external stop condition is
/// optional.
#[derive(Default)]
pub struct OptimizerBuilder {
    parameters: Option<Parameters>,
    recombination: Option<Recombination>,
    mutation: Option<Mutation>,
    selection: Option<Selection>,
    evaluation: EvaluationMode,
    external_check: Option<ExternalCheck>,
}

impl OptimizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_recombination(mut self, recombination: Recombination) -> Self {
        self.recombination = Some(recombination);
        self
    }

    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_evaluation_mode(mut self, evaluation: EvaluationMode) -> Self {
        self.evaluation = evaluation;
        self
    }

    pub fn with_external_check<F>(mut self, check: F) -> Self
    where
        F: FnMut(&Parameters, usize) -> bool + Send + 'static,
    {
        self.external_check = Some(Box::new(check));
        self
    }

    pub fn build(self) -> Result<Optimizer> {
        let parameters = self.parameters.ok_or_else(|| {
            OptimizerError::Configuration("Parameters not specified".to_string())
        })?;

        let recombination = self.recombination.ok_or_else(|| {
            OptimizerError::Configuration("Recombination not specified".to_string())
        })?;

        let mutation = self
            .mutation
            .ok_or_else(|| OptimizerError::Configuration("Mutation not specified".to_string()))?;

        let selection = self
            .selection
            .ok_or_else(|| OptimizerError::Configuration("Selection not specified".to_string()))?;

        check_population(&parameters, selection)?;

        Ok(Optimizer::new(
            parameters,
            recombination,
            mutation,
            selection,
            self.evaluation,
            self.external_check,
        ))
    }
}

/// Rejects population shapes that selection could never fill.
///
/// Pairwise selection needs an even number of evaluated offspring and keeps one
/// per pair. Without elitism the survivors come from the offspring alone, so
/// `mu_int` may not exceed what selection leaves over.
fn check_population(params: &Parameters, selection: Selection) -> Result<()> {
    let candidates = match selection {
        Selection::Pairwise if params.eff_lambda % 2 != 0 => {
            return Err(OptimizerError::Configuration(format!(
                "Pairwise selection needs an even number of offspring, got {}",
                params.eff_lambda
            )));
        }
        Selection::Pairwise => params.eff_lambda / 2,
        Selection::Best | Selection::OnePlusOne => params.eff_lambda,
    };

    if !params.elitist && params.mu_int > candidates {
        return Err(OptimizerError::Configuration(format!(
            "mu = {} exceeds the {} candidates left for comma selection",
            params.mu_int, candidates
        )));
    }
    Ok(())
}
