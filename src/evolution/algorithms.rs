//! # Ready-made evolution strategies
//!
//! Preset functions wire parameters, operators and a start point together for
//! the classic algorithms: the (1+1)-ES with the 1/5th success rule, the
//! (mu, lambda)- and (mu + lambda)-CMA-ES, the CMSA-ES and the two
//! (1+1)-Cholesky-CMA-ES variants. Every preset starts from a point drawn
//! uniformly from `[-5, 5]^n` with step size 1.
//!
//! [`CustomizedEs`] assembles a CMA-ES from [`EsOptions`], including the
//! sampler stack and IPOP/BIPOP restarts.
//!
//! ## Example
//!
//! ```rust
//! use evostrat::evolution::algorithms::one_plus_one_es;
//! use evostrat::rng::RandomNumberGenerator;
//! use nalgebra::DVector;
//!
//! let mut rng = RandomNumberGenerator::from_seed(7);
//! let sphere = |x: &DVector<f64>| x.norm_squared();
//!
//! let result = one_plus_one_es(3, &sphere, 500, &mut rng).unwrap();
//! assert_eq!(result.used_budget, 500);
//! assert!(result.best_fitness() < 1.0);
//! ```

use tracing::{info, warn};

use super::{
    options::{BaseSampler, EsOptions, SelectionKind},
    restart::{RestartOutcome, RestartScheduler, RunRequest},
    Evaluator, OptimizationResult, Optimizer,
};
use crate::{
    error::Result,
    individual::Individual,
    parameters::{AdaptationRule, Mu, ParameterSettings, Parameters},
    rng::RandomNumberGenerator,
    sampling::{
        GaussianSampler, MirroredSampler, OrthogonalSampler, QuasiHaltonSampler,
        QuasiSobolSampler, Sampler,
    },
    selection::Selection,
    strategy::{Mutation, Recombination},
};

const LOWER_BOUND: f64 = -5.0;
const UPPER_BOUND: f64 = 5.0;

fn start_point(n: usize, rng: &mut RandomNumberGenerator) -> Individual {
    Individual::at(rng.uniform_vector(n, LOWER_BOUND, UPPER_BOUND))
}

fn preset_settings(
    n: usize,
    budget: usize,
    rule: AdaptationRule,
    rng: &mut RandomNumberGenerator,
) -> (ParameterSettings, Individual) {
    let start = start_point(n, rng);
    let settings = ParameterSettings::new(n, budget)
        .with_rule(rule)
        .with_wcm(start.genotype.clone());
    (settings, start)
}

fn run_single<E>(
    params: Parameters,
    start: Individual,
    recombination: Recombination,
    mutation: Mutation,
    selection: Selection,
    evaluator: &E,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    let budget = params.budget;
    let population = vec![start; params.mu_int];
    let mut optimizer = Optimizer::builder()
        .with_parameters(params)
        .with_recombination(recombination)
        .with_mutation(mutation)
        .with_selection(selection)
        .build()?;
    optimizer.run(population, evaluator, budget, rng)
}

/// The (1+1)-ES with the 1/5th success rule.
pub fn one_plus_one_es<E>(
    n: usize,
    evaluator: &E,
    budget: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    let (settings, start) = preset_settings(n, budget, AdaptationRule::OneFifth, rng);
    let params = Parameters::new(settings.with_mu_count(1).with_lambda(1).with_elitist(true))?;
    run_single(
        params,
        start,
        Recombination::OnePlusOne,
        Mutation::add_random_offset(GaussianSampler::new(n)),
        Selection::OnePlusOne,
        evaluator,
        rng,
    )
}

/// The CMA-ES with weighted recombination.
///
/// `mu` and `lambda` default to half the offspring and `floor(4 + 3 ln n) + 4`.
/// With `elitist`, parents compete with their offspring ((mu + lambda)-CMA-ES).
pub fn cma_es<E>(
    n: usize,
    evaluator: &E,
    budget: usize,
    mu: Option<usize>,
    lambda: Option<usize>,
    elitist: bool,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    let (mut settings, start) = preset_settings(n, budget, AdaptationRule::Cma, rng);
    settings.lambda = lambda;
    settings.elitist = elitist;
    if let Some(mu) = mu {
        settings.mu = Mu::Count(mu);
    }
    let params = Parameters::new(settings)?;
    run_single(
        params,
        start,
        Recombination::Weighted,
        Mutation::cma(GaussianSampler::new(n), false),
        Selection::Best,
        evaluator,
        rng,
    )
}

/// The CMSA-ES: self-adaptive step sizes and a covariance matrix blended
/// toward the mean selected step.
pub fn cmsa_es<E>(
    n: usize,
    evaluator: &E,
    budget: usize,
    mu: Option<usize>,
    lambda: Option<usize>,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    let (mut settings, start) = preset_settings(n, budget, AdaptationRule::Cmsa, rng);
    settings.lambda = lambda;
    if let Some(mu) = mu {
        settings.mu = Mu::Count(mu);
    }
    let params = Parameters::new(settings)?;
    run_single(
        params,
        start,
        Recombination::Weighted,
        Mutation::cmsa(GaussianSampler::new(n)),
        Selection::Best,
        evaluator,
        rng,
    )
}

/// The (1+1)-Cholesky-CMA-ES.
pub fn cholesky_es<E>(
    n: usize,
    evaluator: &E,
    budget: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    one_plus_one_cholesky(n, evaluator, budget, AdaptationRule::Cholesky, rng)
}

/// The (1+1)-active-Cholesky-CMA-ES, which also shrinks the distribution
/// along directions that lead to poor offspring.
pub fn active_cholesky_es<E>(
    n: usize,
    evaluator: &E,
    budget: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    one_plus_one_cholesky(n, evaluator, budget, AdaptationRule::ActiveCholesky, rng)
}

fn one_plus_one_cholesky<E>(
    n: usize,
    evaluator: &E,
    budget: usize,
    rule: AdaptationRule,
    rng: &mut RandomNumberGenerator,
) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    let (settings, start) = preset_settings(n, budget, rule, rng);
    let params = Parameters::new(settings.with_mu_count(1).with_lambda(1).with_elitist(true))?;
    run_single(
        params,
        start,
        Recombination::OnePlusOne,
        Mutation::cholesky(GaussianSampler::new(n)),
        Selection::OnePlusOne,
        evaluator,
        rng,
    )
}

/// A CMA-ES assembled from [`EsOptions`].
#[derive(Debug, Clone)]
pub struct CustomizedEs {
    options: EsOptions,
}

impl CustomizedEs {
    /// Validates `options` and creates the strategy.
    pub fn new(options: EsOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &EsOptions {
        &self.options
    }

    /// Runs the strategy on `evaluator` with the configured budget, restarting
    /// according to the configured restart strategy.
    ///
    /// Uses a generator seeded from `options.seed`, or from entropy if absent.
    pub fn run<E>(&self, evaluator: &E) -> Result<RestartOutcome>
    where
        E: Evaluator + ?Sized,
    {
        let mut rng = match self.options.seed {
            Some(seed) => RandomNumberGenerator::from_seed(seed),
            None => RandomNumberGenerator::new(),
        };
        self.run_with_rng(evaluator, &mut rng)
    }

    /// Like [`CustomizedEs::run`], with a caller-supplied generator.
    pub fn run_with_rng<E>(
        &self,
        evaluator: &E,
        rng: &mut RandomNumberGenerator,
    ) -> Result<RestartOutcome>
    where
        E: Evaluator + ?Sized,
    {
        let options = &self.options;
        let lambda_init = options.dependencies().lambda;
        info!(
            n = options.n,
            budget = options.budget,
            lambda = lambda_init,
            restarts = ?options.ipop,
            "running customized evolution strategy"
        );

        let scheduler = RestartScheduler::new(options.ipop, options.budget, lambda_init, options.sigma);
        scheduler.run(evaluator, rng, |request, rng| self.start_run(request, rng))
    }

    /// Builds the optimizer and initial population of one run.
    fn start_run(
        &self,
        request: RunRequest,
        rng: &mut RandomNumberGenerator,
    ) -> Result<(Optimizer, Vec<Individual>)> {
        let options = &self.options;
        let deps = options.dependencies_for(Some(request.lambda));
        let wcm = rng.uniform_vector(options.n, options.lower_bound, options.upper_bound);

        let params = Parameters::new(ParameterSettings {
            n: options.n,
            budget: options.budget,
            mu: Mu::Fraction(deps.mu),
            lambda: Some(deps.lambda),
            eff_lambda: Some(deps.eff_lambda),
            sigma: request.sigma,
            lower_bound: options.lower_bound,
            upper_bound: options.upper_bound,
            rule: AdaptationRule::Cma,
            weights_option: options.weights_option,
            active: options.active,
            elitist: options.elitist,
            sequential: options.sequential,
            tpa: options.tpa,
            threshold: options.threshold,
            local_restart: options.ipop,
            seq_cutoff: deps.seq_cutoff,
            wcm: Some(wcm.clone()),
        })?;

        let sampler = self.sampler_stack(deps.eff_lambda, rng)?;
        let selection = match options.selection {
            SelectionKind::Best => Selection::Best,
            SelectionKind::Pairwise => Selection::Pairwise,
        };
        let population = vec![Individual::at(wcm); params.mu_int];

        let optimizer = Optimizer::builder()
            .with_parameters(params)
            .with_recombination(Recombination::Weighted)
            .with_mutation(Mutation::Cma {
                sampler,
                threshold_convergence: options.threshold,
            })
            .with_selection(selection)
            .with_evaluation_mode(options.evaluation)
            .build()?;
        Ok((optimizer, population))
    }

    /// Base sampler, optionally orthogonalized, optionally mirrored.
    fn sampler_stack(
        &self,
        eff_lambda: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Box<dyn Sampler>> {
        let n = self.options.n;
        let mut sampler: Box<dyn Sampler> = match self.options.base_sampler {
            BaseSampler::Gaussian => Box::new(GaussianSampler::new(n)),
            BaseSampler::QuasiSobol => Box::new(QuasiSobolSampler::new(n, rng)?),
            BaseSampler::QuasiHalton if QuasiHaltonSampler::available() => {
                Box::new(QuasiHaltonSampler::new(n)?)
            }
            BaseSampler::QuasiHalton => {
                warn!("Halton sampling is not available, falling back to Gaussian sampling");
                Box::new(GaussianSampler::new(n))
            }
        };

        if self.options.orthogonal {
            let orth_lambda = if self.options.mirrored {
                (eff_lambda / 2).max(1)
            } else {
                eff_lambda
            };
            sampler = Box::new(OrthogonalSampler::new(sampler, orth_lambda));
        }
        if self.options.mirrored {
            sampler = Box::new(MirroredSampler::new(sampler));
        }
        Ok(sampler)
    }
}

/// Runs a [`CustomizedEs`] with the given options and returns the merged
/// result of all runs.
///
/// # Errors
///
/// Returns an error if the options are invalid or a run fails.
pub fn customized_es<E>(options: EsOptions, evaluator: &E) -> Result<OptimizationResult>
where
    E: Evaluator + ?Sized,
{
    Ok(CustomizedEs::new(options)?.run(evaluator)?.result)
}
