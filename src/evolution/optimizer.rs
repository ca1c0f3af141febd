use std::fmt;

use nalgebra::DVector;
use tracing::{debug, trace};

use super::{builder::OptimizerBuilder, options::EvaluationMode, Evaluator, OptimizationResult};
use crate::{
    error::{OptimizerError, Result},
    individual::Individual,
    parameters::Parameters,
    rng::RandomNumberGenerator,
    selection::{selection_strategy::compare_fitness, Selection, SelectionStrategy},
    strategy::{Mutation, Recombination},
};

/// Caller-supplied stop condition, checked after every generation with the
/// current parameter state and the evaluations used so far.
pub type ExternalCheck = Box<dyn FnMut(&Parameters, usize) -> bool + Send>;

/// Where the optimizer is within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Initializing,
    Evaluating,
    Selecting,
    Adapting,
    RestartCheck,
    Done,
}

/// The generational loop of an evolution strategy.
///
/// An `Optimizer` owns the parameter state of one run together with the
/// operators that act on it. Each generation it mutates and evaluates the
/// offspring, selects the next parents, records statistics, recombines the
/// parents into the next offspring and adapts the search distribution, until
/// the budget is spent or a stop condition fires.
pub struct Optimizer {
    params: Parameters,
    recombination: Recombination,
    mutation: Mutation,
    selection: Selection,
    evaluation: EvaluationMode,
    external_check: Option<ExternalCheck>,
    state: OptimizerState,
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimizer")
            .field("recombination", &self.recombination)
            .field("mutation", &self.mutation)
            .field("selection", &self.selection)
            .field("evaluation", &self.evaluation)
            .field("external_check", &self.external_check.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Optimizer {
    pub(crate) fn new(
        params: Parameters,
        recombination: Recombination,
        mutation: Mutation,
        selection: Selection,
        evaluation: EvaluationMode,
        external_check: Option<ExternalCheck>,
    ) -> Self {
        Self {
            params,
            recombination,
            mutation,
            selection,
            evaluation,
            external_check,
            state: OptimizerState::Initializing,
        }
    }

    /// Returns a builder for creating an `Optimizer`.
    pub fn builder() -> OptimizerBuilder {
        OptimizerBuilder::new()
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    /// Runs the optimizer from `population` until `budget` evaluations are
    /// used or a stop condition fires.
    ///
    /// # Arguments
    ///
    /// * `population` - The initial parents. Their fitness is not evaluated.
    /// * `evaluator` - The fitness function to minimise.
    /// * `budget` - The maximum number of evaluations for this run.
    /// * `rng` - The random number generator for mutation.
    ///
    /// # Returns
    ///
    /// The traces of the run and the best individual found. The used budget
    /// never exceeds `budget`.
    ///
    /// # Errors
    ///
    /// This method will return an error if:
    /// - The initial population is empty or `budget` is zero
    /// - Sampling, evaluation or selection fails
    /// - Selection returns a parent population whose size differs from `mu`
    pub fn run<E>(
        &mut self,
        population: Vec<Individual>,
        evaluator: &E,
        budget: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<OptimizationResult>
    where
        E: Evaluator + ?Sized,
    {
        self.state = OptimizerState::Initializing;
        if budget == 0 {
            return Err(OptimizerError::Configuration(
                "Budget must be at least 1".to_string(),
            ));
        }
        let mut best = population
            .first()
            .cloned()
            .ok_or(OptimizerError::EmptyPopulation)?;
        let mut population = population;

        let mut used_budget = 0;
        let mut generation_sizes = Vec::new();
        let mut sigma_over_time = Vec::new();
        let mut fitness_over_time = Vec::new();

        let cutoff = self.params.sequential_cutoff();
        let mut offspring = self
            .recombination
            .recombine(&population, &mut self.params, budget)?;

        loop {
            self.state = OptimizerState::Evaluating;
            if self.params.tpa {
                let keep = offspring.len().saturating_sub(2).max(1);
                offspring.truncate(keep);
            }
            let remaining = budget - used_budget;
            let evaluated =
                self.evaluate_offspring(&mut offspring, &best, evaluator, remaining, cutoff, rng)?;
            used_budget += evaluated;
            offspring.truncate(evaluated);

            let mut fitnesses: Vec<f64> = offspring.iter().map(|o| o.fitness).collect();
            fitnesses.sort_by(|a, b| compare_fitness(*a, *b));
            self.params.record_fitness(&fitnesses);

            self.state = OptimizerState::Selecting;
            population = self.selection.select(
                population,
                std::mem::take(&mut offspring),
                used_budget,
                &mut self.params,
            )?;
            let generation_best = population
                .first()
                .cloned()
                .ok_or(OptimizerError::EmptyPopulation)?;

            if used_budget < budget {
                self.state = OptimizerState::Adapting;
                if population.len() != self.params.mu_int {
                    return Err(OptimizerError::PopulationSize {
                        expected: self.params.mu_int,
                        actual: population.len(),
                        used_budget,
                    });
                }
                offspring = self.recombination.recombine(
                    &population,
                    &mut self.params,
                    budget - used_budget,
                )?;
                if self.params.tpa && budget - used_budget >= 2 {
                    used_budget += self.two_point_probe(evaluator)?;
                }
                self.params.adapt(used_budget);
            }

            if generation_best.improves_on(&best) {
                best = generation_best;
            }
            let gen_size = used_budget - fitness_over_time.len();
            generation_sizes.push(gen_size);
            sigma_over_time.extend(std::iter::repeat(self.params.sigma_mean).take(gen_size));
            fitness_over_time.extend(std::iter::repeat(best.fitness).take(gen_size));

            debug!(
                generation = generation_sizes.len(),
                used_budget,
                best_fitness = best.fitness,
                sigma = self.params.sigma_mean,
                "generation complete"
            );

            self.state = OptimizerState::RestartCheck;
            if used_budget >= budget {
                break;
            }
            if self.params.local_restart(used_budget, &fitnesses) {
                break;
            }
            if let Some(check) = self.external_check.as_mut() {
                if check(&self.params, used_budget) {
                    debug!(used_budget, "external stop condition fired");
                    break;
                }
            }
        }

        self.state = OptimizerState::Done;
        Ok(OptimizationResult {
            generation_sizes,
            sigma_over_time,
            fitness_over_time,
            best_individual: best,
            used_budget,
        })
    }

    /// Mutates and evaluates the offspring, returning how many were
    /// evaluated. Never evaluates more than `remaining`.
    fn evaluate_offspring<E>(
        &mut self,
        offspring: &mut [Individual],
        best: &Individual,
        evaluator: &E,
        remaining: usize,
        cutoff: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<usize>
    where
        E: Evaluator + ?Sized,
    {
        match self.evaluation {
            EvaluationMode::Batch => {
                let count = offspring.len().min(remaining);
                let batch = &mut offspring[..count];
                for individual in batch.iter_mut() {
                    self.mutation.mutate(individual, &self.params, rng)?;
                }
                let genotypes: Vec<DVector<f64>> =
                    batch.iter().map(|o| o.genotype.clone()).collect();
                let fitnesses = evaluator.evaluate_batch(&genotypes)?;
                if fitnesses.len() != count {
                    return Err(OptimizerError::FitnessCalculation(format!(
                        "Evaluator returned {} values for {} offspring",
                        fitnesses.len(),
                        count
                    )));
                }
                for (individual, fitness) in batch.iter_mut().zip(fitnesses) {
                    individual.fitness = fitness;
                }
                Ok(count)
            }
            EvaluationMode::Sequential => {
                let mut count = 0;
                let mut improvement_found = false;
                for (i, individual) in offspring.iter_mut().enumerate() {
                    if count >= remaining {
                        break;
                    }
                    self.mutation.mutate(individual, &self.params, rng)?;
                    individual.fitness = evaluator.evaluate(&individual.genotype)?;
                    count += 1;

                    if self.params.sequential {
                        improvement_found |= individual.improves_on(best);
                        if i >= cutoff && improvement_found {
                            trace!(evaluated = count, "sequential evaluation stopped early");
                            break;
                        }
                    }
                }
                Ok(count)
            }
        }
    }

    /// Evaluates the two TPA probes along the last mean shift and records
    /// which one was better. Returns the evaluations used.
    fn two_point_probe<E>(&mut self, evaluator: &E) -> Result<usize>
    where
        E: Evaluator + ?Sized,
    {
        let params = &mut self.params;
        let shift = &params.wcm - &params.wcm_old;
        let length = shift.norm();
        let direction = if length > 0.0 {
            shift / length
        } else {
            DVector::zeros(params.n)
        };
        let probe = direction * (params.tpa_factor * params.sigma * params.chi_n);

        let plus = evaluator.evaluate(&(&params.wcm + &probe))?;
        let minus = evaluator.evaluate(&(&params.wcm - &probe))?;
        params.set_tpa_result(plus < minus);
        trace!(plus, minus, "two-point step-size probe");
        Ok(2)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        parameters::{AdaptationRule, ParameterSettings},
        sampling::GaussianSampler,
    };

    fn sphere(x: &DVector<f64>) -> f64 {
        x.norm_squared()
    }

    fn cma_optimizer(settings: ParameterSettings, evaluation: EvaluationMode) -> Optimizer {
        let n = settings.n;
        Optimizer::builder()
            .with_parameters(Parameters::new(settings).unwrap())
            .with_recombination(Recombination::Weighted)
            .with_mutation(Mutation::cma(GaussianSampler::new(n), false))
            .with_selection(Selection::Best)
            .with_evaluation_mode(evaluation)
            .build()
            .unwrap()
    }

    fn start(params: &Parameters) -> Vec<Individual> {
        vec![Individual::at(DVector::from_element(params.n, 1.0)); params.mu_int]
    }

    #[test]
    fn test_batch_uses_exact_budget() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        let settings = ParameterSettings::new(3, 50).with_lambda(7);
        let mut optimizer = cma_optimizer(settings, EvaluationMode::Batch);
        let population = start(optimizer.params());

        let result = optimizer.run(population, &sphere, 50, &mut rng).unwrap();

        assert_eq!(result.used_budget, 50);
        assert_eq!(result.fitness_over_time.len(), 50);
        assert_eq!(result.sigma_over_time.len(), 50);
        assert_eq!(result.generation_sizes.iter().sum::<usize>(), 50);
        // 7 full generations and one truncated to the single remaining evaluation.
        assert_eq!(result.generation_sizes.len(), 8);
        assert_eq!(*result.generation_sizes.last().unwrap(), 1);
        assert_eq!(optimizer.state(), OptimizerState::Done);
    }

    #[test]
    fn test_best_fitness_never_worsens() {
        let mut rng = RandomNumberGenerator::from_seed(2);
        let mut optimizer = cma_optimizer(ParameterSettings::new(4, 800), EvaluationMode::Sequential);
        let population = start(optimizer.params());

        let result = optimizer.run(population, &sphere, 800, &mut rng).unwrap();

        assert_eq!(result.used_budget, 800);
        assert!(result.best_fitness() < 4.0);
        assert!(result
            .fitness_over_time
            .windows(2)
            .all(|pair| pair[1] <= pair[0]));
        assert_eq!(result.fitness_over_time.last(), Some(&result.best_fitness()));
    }

    #[test]
    fn test_sequential_stops_early_after_cutoff() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        let settings = ParameterSettings {
            sequential: true,
            ..ParameterSettings::new(2, 1000).with_lambda(10).with_mu_count(2)
        };
        let mut optimizer = cma_optimizer(settings, EvaluationMode::Sequential);
        let population = start(optimizer.params());

        // Every offspring improves on the unevaluated start, so the first
        // generation stops right after index == cutoff (2).
        let result = optimizer.run(population, &|_: &DVector<f64>| 1.0, 1000, &mut rng);
        let result = result.unwrap();
        assert_eq!(result.generation_sizes[0], 3);
    }

    #[test]
    fn test_external_check_stops_run() {
        let mut rng = RandomNumberGenerator::from_seed(4);
        let settings = ParameterSettings::new(2, 1000).with_lambda(6);
        let n = settings.n;
        let mut optimizer = Optimizer::builder()
            .with_parameters(Parameters::new(settings).unwrap())
            .with_recombination(Recombination::Weighted)
            .with_mutation(Mutation::cma(GaussianSampler::new(n), false))
            .with_selection(Selection::Best)
            .with_external_check(|_: &Parameters, used: usize| used >= 30)
            .build()
            .unwrap();
        let population = start(optimizer.params());

        let result = optimizer.run(population, &sphere, 1000, &mut rng).unwrap();
        assert_eq!(result.used_budget, 30);
    }

    #[test]
    fn test_tpa_counts_probe_evaluations() {
        let mut rng = RandomNumberGenerator::from_seed(5);
        let calls = AtomicUsize::new(0);
        let counting = |x: &DVector<f64>| {
            calls.fetch_add(1, Ordering::Relaxed);
            sphere(x)
        };
        let settings = ParameterSettings {
            tpa: true,
            ..ParameterSettings::new(3, 200).with_lambda(8)
        };
        let mut optimizer = cma_optimizer(settings, EvaluationMode::Sequential);
        let population = start(optimizer.params());

        let result = optimizer.run(population, &counting, 200, &mut rng).unwrap();

        assert_eq!(result.used_budget, calls.load(Ordering::Relaxed));
        assert_eq!(result.fitness_over_time.len(), result.used_budget);
        assert!(result.used_budget <= 200);
        // Six offspring plus two probes per full generation.
        assert_eq!(result.generation_sizes[0], 8);
    }

    #[test]
    fn test_one_plus_one_optimizer() {
        let mut rng = RandomNumberGenerator::from_seed(6);
        let settings = ParameterSettings::new(2, 300)
            .with_rule(AdaptationRule::OneFifth)
            .with_mu_count(1)
            .with_lambda(1)
            .with_elitist(true);
        let mut optimizer = Optimizer::builder()
            .with_parameters(Parameters::new(settings).unwrap())
            .with_recombination(Recombination::OnePlusOne)
            .with_mutation(Mutation::add_random_offset(GaussianSampler::new(2)))
            .with_selection(Selection::OnePlusOne)
            .build()
            .unwrap();

        let result = optimizer
            .run(vec![Individual::at(DVector::from_element(2, 2.0))], &sphere, 300, &mut rng)
            .unwrap();
        assert_eq!(result.used_budget, 300);
        assert_eq!(result.generation_sizes, vec![1; 300]);
        assert!(result.best_fitness() < 8.0);
    }

    #[test]
    fn test_empty_population() {
        let mut rng = RandomNumberGenerator::from_seed(7);
        let mut optimizer = cma_optimizer(ParameterSettings::new(2, 10), EvaluationMode::Batch);
        assert!(matches!(
            optimizer.run(vec![], &sphere, 10, &mut rng),
            Err(OptimizerError::EmptyPopulation)
        ));
    }
}
