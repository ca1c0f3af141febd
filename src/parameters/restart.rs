//! Local restart criteria and the per-regime budget bookkeeping of IPOP and
//! BIPOP restarts.

use std::collections::VecDeque;

use tracing::debug;

use super::Parameters;
use crate::rng::RandomNumberGenerator;

const TOL_X: f64 = 1e-12;
const TOL_UP_SIGMA: f64 = 1e20;
const CONDITION_COV: f64 = 1e14;

/// Restart strategy of a run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartStrategy {
    /// Run once until the budget is exhausted.
    #[default]
    None,
    /// Double the offspring count on every restart.
    Ipop,
    /// Alternate between a growing large-population regime and a randomized
    /// small-population regime.
    Bipop,
}

/// The population regime a run belongs to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartRegime {
    First,
    Large,
    Small,
}

/// Settings of the next run, as decided by [`LocalRestartBudget::next_run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextRun {
    pub regime: RestartRegime,
    pub lambda: usize,
    /// Step size to start with; the configured one when `None`.
    pub sigma: Option<f64>,
}

/// Tracks the offspring counts and the per-regime budgets across restarts.
#[derive(Debug, Clone)]
pub struct LocalRestartBudget {
    strategy: RestartStrategy,
    lambda_init: usize,
    lambda: usize,
    lambda_large: usize,
    large_budget: usize,
    small_budget: Option<usize>,
    regime: RestartRegime,
}

impl LocalRestartBudget {
    pub fn new(strategy: RestartStrategy, lambda_init: usize) -> Self {
        let lambda_init = lambda_init.max(1);
        Self {
            strategy,
            lambda_init,
            lambda: lambda_init,
            lambda_large: lambda_init,
            large_budget: 0,
            small_budget: None,
            regime: RestartRegime::First,
        }
    }

    pub fn regime(&self) -> RestartRegime {
        self.regime
    }

    pub fn lambda(&self) -> usize {
        self.lambda
    }

    /// Remaining reserves of the large and small regimes, once split.
    pub fn reserves(&self) -> Option<(usize, usize)> {
        self.small_budget.map(|small| (self.large_budget, small))
    }

    /// Decides the settings of the next run after the current one consumed
    /// `used` evaluations, leaving `remaining` in total.
    ///
    /// IPOP doubles the offspring count. BIPOP splits the remaining budget in
    /// half after the first run, charges every later run to its regime and
    /// continues with the regime that has more budget left, preferring the
    /// large one on ties.
    pub fn next_run(
        &mut self,
        used: usize,
        remaining: usize,
        rng: &mut RandomNumberGenerator,
    ) -> NextRun {
        match self.strategy {
            RestartStrategy::None => NextRun {
                regime: self.regime,
                lambda: self.lambda,
                sigma: None,
            },
            RestartStrategy::Ipop => {
                self.lambda = self.lambda.saturating_mul(2);
                NextRun {
                    regime: self.regime,
                    lambda: self.lambda,
                    sigma: None,
                }
            }
            RestartStrategy::Bipop => self.next_bipop_run(used, remaining, rng),
        }
    }

    fn next_bipop_run(
        &mut self,
        used: usize,
        remaining: usize,
        rng: &mut RandomNumberGenerator,
    ) -> NextRun {
        match (self.regime, self.small_budget) {
            (RestartRegime::First, _) | (_, None) => {
                let small = remaining / 2;
                self.small_budget = Some(small);
                self.large_budget = remaining - small;
            }
            (RestartRegime::Large, Some(_)) => {
                self.large_budget = self.large_budget.saturating_sub(used);
            }
            (RestartRegime::Small, Some(small)) => {
                self.small_budget = Some(small.saturating_sub(used));
            }
        }

        let small = self.small_budget.unwrap_or(0);
        if small > self.large_budget {
            self.regime = RestartRegime::Small;
            let r = rng.uniform().powi(2);
            let ratio = 0.5 * self.lambda_large as f64 / self.lambda_init as f64;
            self.lambda = ((self.lambda_init as f64 * ratio.powf(r)).floor() as usize).max(1);
            NextRun {
                regime: self.regime,
                lambda: self.lambda,
                // Drawn from (0, 0.02] so the step size stays positive.
                sigma: Some(2e-2 * (1.0 - rng.uniform())),
            }
        } else {
            self.regime = RestartRegime::Large;
            self.lambda_large = self.lambda_large.saturating_mul(2);
            self.lambda = self.lambda_large;
            NextRun {
                regime: self.regime,
                lambda: self.lambda,
                sigma: Some(2.0),
            }
        }
    }
}

/// Per-generation statistics kept for the stagnation and flat-fitness criteria.
#[derive(Debug, Clone, Default)]
pub(crate) struct RestartHistory {
    generation: usize,
    best_fitnesses: VecDeque<f64>,
    median_fitnesses: VecDeque<f64>,
    flat_fitnesses: VecDeque<bool>,
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl Parameters {
    /// Number of generations the stagnation criterion looks back over.
    pub fn stagnation_window(&self) -> usize {
        (120.0 + 30.0 * self.n as f64 / self.lambda as f64).ceil() as usize
    }

    /// Decides whether the current run should be stopped for a local restart.
    ///
    /// `fitnesses` are this generation's offspring fitness values in ascending
    /// order. Always false when no restart strategy is configured.
    pub fn local_restart(&mut self, t: usize, fitnesses: &[f64]) -> bool {
        if self.local_restart == RestartStrategy::None || fitnesses.is_empty() {
            return false;
        }

        let reason = self.restart_reason(fitnesses);
        if let Some(reason) = reason {
            debug!(reason, used_budget = t, sigma = self.sigma, "local restart triggered");
            return true;
        }
        false
    }

    fn restart_reason(&mut self, fitnesses: &[f64]) -> Option<&'static str> {
        let n = self.n;
        self.restart_history.generation += 1;
        let generation = self.restart_history.generation;

        let tol = TOL_X * self.sigma_init;
        let diag: Vec<f64> = (0..n).map(|i| self.C[(i, i)].max(0.0).sqrt()).collect();

        let tol_x = self.p_c.iter().all(|p| (self.sigma * p).abs() < tol)
            && diag.iter().all(|d| self.sigma * d < tol);

        let max_d = self.D.iter().copied().fold(0.0, f64::max);
        let min_d = self.D.iter().copied().fold(f64::INFINITY, f64::min);
        let tol_up_sigma = self.sigma / self.sigma_init > TOL_UP_SIGMA * max_d;

        let axis = generation % n;
        let no_effect_axis = (0..n).all(|i| {
            let shift = 0.1 * self.sigma * self.D[axis] * self.B[(i, axis)];
            self.wcm[i] + shift == self.wcm[i]
        });
        let no_effect_coord =
            (0..n).any(|i| self.wcm[i] + 0.2 * self.sigma * diag[i] == self.wcm[i]);

        let condition_cov = min_d <= 0.0 || (max_d / min_d).powi(2) > CONDITION_COV;

        // Flat fitness over the last n generations
        let flat_index = (0.1 + self.lambda as f64 / 4.0).ceil() as usize;
        let window = self.stagnation_window();
        let history = &mut self.restart_history;
        if flat_index < fitnesses.len() {
            if history.flat_fitnesses.len() == n {
                history.flat_fitnesses.pop_front();
            }
            history
                .flat_fitnesses
                .push_back(fitnesses[0] == fitnesses[flat_index]);
        }
        let flat_count = history.flat_fitnesses.iter().filter(|&&f| f).count();
        let flat_fitness = 3 * flat_count > n;

        // Stagnation of best and median fitness
        if history.best_fitnesses.len() == window {
            history.best_fitnesses.pop_front();
            history.median_fitnesses.pop_front();
        }
        history.best_fitnesses.push_back(fitnesses[0]);
        history
            .median_fitnesses
            .push_back(median(fitnesses.iter().copied()));

        let stagnation = if history.best_fitnesses.len() == window {
            let part = (window * 3 / 10).max(1);
            let early_best = median(history.best_fitnesses.iter().take(part).copied());
            let recent_best = median(history.best_fitnesses.iter().rev().take(part).copied());
            let early_median = median(history.median_fitnesses.iter().take(part).copied());
            let recent_median = median(history.median_fitnesses.iter().rev().take(part).copied());
            recent_best >= early_best && recent_median >= early_median
        } else {
            false
        };

        [
            (tol_x, "TolX"),
            (tol_up_sigma, "TolUpSigma"),
            (no_effect_axis, "NoEffectAxis"),
            (no_effect_coord, "NoEffectCoord"),
            (condition_cov, "ConditionCov"),
            (flat_fitness, "flat fitness"),
            (stagnation, "stagnation"),
        ]
        .into_iter()
        .find(|(fired, _)| *fired)
        .map(|(_, reason)| reason)
    }
}
