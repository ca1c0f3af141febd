use crate::individual::Individual;

/// Represents the outcome of an optimization run, or of several runs merged
/// by the restart scheduler.
///
/// The three traces are indexed by function evaluation: every evaluation of a
/// generation is recorded with the values that held at the end of that
/// generation, so all traces have exactly `used_budget` entries. After a merge
/// the fitness trace restarts with each run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Evaluations spent per generation.
    pub generation_sizes: Vec<usize>,
    /// Mean step size, one entry per evaluation.
    pub sigma_over_time: Vec<f64>,
    /// Best fitness found so far, one entry per evaluation.
    pub fitness_over_time: Vec<f64>,
    /// The best individual found.
    pub best_individual: Individual,
    /// Total number of evaluations.
    pub used_budget: usize,
}

impl OptimizationResult {
    /// Fitness of the best individual found.
    pub fn best_fitness(&self) -> f64 {
        self.best_individual.fitness
    }

    /// Appends the traces of a later run and keeps the better best individual.
    ///
    /// Ties keep the individual found first.
    pub fn extend(&mut self, other: OptimizationResult) {
        self.generation_sizes.extend(other.generation_sizes);
        self.sigma_over_time.extend(other.sigma_over_time);
        self.fitness_over_time.extend(other.fitness_over_time);
        self.used_budget += other.used_budget;
        if other.best_individual.improves_on(&self.best_individual) {
            self.best_individual = other.best_individual;
        }
    }
}
