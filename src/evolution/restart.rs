//! Global restart scheduling.
//!
//! A run that stops early (local restart criterion or external check) leaves
//! budget unused. The scheduler keeps starting fresh runs until the total
//! budget is spent, choosing the population size and initial step size of each
//! run through a [`LocalRestartBudget`], and merges the traces of all runs.

use tracing::info;

use super::{Evaluator, OptimizationResult, Optimizer};
use crate::{
    error::{OptimizerError, Result},
    individual::Individual,
    parameters::{LocalRestartBudget, RestartRegime, RestartStrategy},
    rng::RandomNumberGenerator,
};

/// One run started by the scheduler.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartRecord {
    pub regime: RestartRegime,
    /// Offspring per generation of the run.
    pub lambda: usize,
    /// Initial step size of the run.
    pub sigma: f64,
    /// Evaluations the run used.
    pub used_budget: usize,
}

/// Merged result of all runs plus one record per run.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartOutcome {
    pub result: OptimizationResult,
    pub restarts: Vec<RestartRecord>,
}

/// What a scheduler needs to start one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRequest {
    pub regime: RestartRegime,
    /// Requested offspring per generation; the run may correct it.
    pub lambda: usize,
    pub sigma: f64,
}

/// Runs fresh optimizers until `budget` evaluations are used.
#[derive(Debug, Clone, Copy)]
pub struct RestartScheduler {
    strategy: RestartStrategy,
    budget: usize,
    lambda_init: usize,
    sigma_init: f64,
}

impl RestartScheduler {
    pub fn new(strategy: RestartStrategy, budget: usize, lambda_init: usize, sigma_init: f64) -> Self {
        Self {
            strategy,
            budget,
            lambda_init,
            sigma_init,
        }
    }

    /// Runs until the budget is spent.
    ///
    /// `start_run` builds the optimizer and initial population of one run from
    /// the request. Without a restart strategy exactly one run is made.
    ///
    /// # Errors
    ///
    /// Returns the first error of `start_run` or of a run.
    pub fn run<E, F>(
        &self,
        evaluator: &E,
        rng: &mut RandomNumberGenerator,
        mut start_run: F,
    ) -> Result<RestartOutcome>
    where
        E: Evaluator + ?Sized,
        F: FnMut(RunRequest, &mut RandomNumberGenerator) -> Result<(Optimizer, Vec<Individual>)>,
    {
        let mut schedule = LocalRestartBudget::new(self.strategy, self.lambda_init);
        let mut request = RunRequest {
            regime: RestartRegime::First,
            lambda: self.lambda_init,
            sigma: self.sigma_init,
        };
        let mut remaining = self.budget;
        let mut merged: Option<OptimizationResult> = None;
        let mut restarts = Vec::new();

        while remaining > 0 {
            let (mut optimizer, population) = start_run(request, rng)?;
            let lambda = optimizer.params().lambda;
            info!(
                run = restarts.len() + 1,
                regime = ?request.regime,
                lambda,
                sigma = request.sigma,
                remaining,
                "starting run"
            );

            let result = optimizer.run(population, evaluator, remaining, rng)?;
            let used = result.used_budget;
            remaining = remaining.saturating_sub(used);
            restarts.push(RestartRecord {
                regime: request.regime,
                lambda,
                sigma: request.sigma,
                used_budget: used,
            });
            info!(
                used_budget = used,
                best_fitness = result.best_fitness(),
                "run finished"
            );

            match merged.as_mut() {
                Some(total) => total.extend(result),
                None => merged = Some(result),
            }

            if self.strategy == RestartStrategy::None || used == 0 {
                break;
            }
            let next = schedule.next_run(used, remaining, rng);
            request = RunRequest {
                regime: next.regime,
                lambda: next.lambda,
                sigma: next.sigma.unwrap_or(self.sigma_init),
            };
        }

        let result = merged.ok_or_else(|| {
            OptimizerError::Configuration("Budget must be at least 1".to_string())
        })?;
        Ok(RestartOutcome { result, restarts })
    }
}
