//! # EsOptions
//!
//! The `EsOptions` struct is the configuration surface of the customizable
//! evolution strategy. It names every module that can be switched on or off
//! (elitism, mirrored and orthogonal sampling, sequential evaluation,
//! threshold convergence, two-point step-size adaptation, active updates), the
//! base sampler, the selection policy, the restart strategy and the
//! recombination weights.
//!
//! Options are validated once with [`EsOptions::validate`]; the derived
//! population sizes come from [`EsOptions::dependencies`], which also applies
//! the automatic corrections that TPA and pairwise selection require.
//!
//! ## Example
//!
//! ```rust
//! use evostrat::evolution::options::{EsOptions, SelectionKind};
//!
//! let options = EsOptions::builder(5, 1000)
//!     .selection(SelectionKind::Pairwise)
//!     .mirrored(true)
//!     .lambda(5)
//!     .build()
//!     .unwrap();
//!
//! // Pairwise selection needs an even number of offspring.
//! assert_eq!(options.dependencies().lambda, 4);
//! ```

use crate::{
    error::{OptimizerError, Result},
    parameters::default_lambda,
};

pub use crate::parameters::{RestartStrategy, WeightsOption};

/// The sampler at the bottom of the sampler stack.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseSampler {
    #[default]
    Gaussian,
    QuasiSobol,
    /// Falls back to `Gaussian` with a warning when the `halton` feature is
    /// not enabled.
    QuasiHalton,
}

/// Survivor selection policy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionKind {
    #[default]
    Best,
    Pairwise,
}

/// How offspring are evaluated.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// One offspring at a time; allows stopping early when `sequential` is set.
    #[default]
    Sequential,
    /// All offspring of a generation in one call to the evaluator.
    Batch,
}

/// Configuration of a customizable evolution strategy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EsOptions {
    pub n: usize,
    pub budget: usize,
    /// Parents as a fraction of the offspring; 0.5 when absent.
    pub mu: Option<f64>,
    /// Offspring per generation; `floor(4 + 3 ln n) + 4` when absent.
    pub lambda: Option<usize>,
    pub sigma: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub active: bool,
    pub elitist: bool,
    pub mirrored: bool,
    pub orthogonal: bool,
    pub sequential: bool,
    pub threshold: bool,
    pub tpa: bool,
    pub base_sampler: BaseSampler,
    pub selection: SelectionKind,
    pub ipop: RestartStrategy,
    pub weights_option: WeightsOption,
    pub evaluation: EvaluationMode,
    /// Multiplier on `mu` for the sequential-evaluation cutoff.
    pub seq_cutoff: usize,
    pub seed: Option<u64>,
}

/// Population sizes derived from [`EsOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dependencies {
    /// Offspring per generation, including the two TPA probes.
    pub lambda: usize,
    /// Offspring that are mutated and evaluated normally.
    pub eff_lambda: usize,
    /// Parents as a fraction of `eff_lambda`.
    pub mu: f64,
    /// Multiplier on `mu` for the sequential-evaluation cutoff.
    pub seq_cutoff: usize,
}

impl EsOptions {
    /// Creates options with every module switched off.
    pub fn new(n: usize, budget: usize) -> Self {
        Self {
            n,
            budget,
            mu: None,
            lambda: None,
            sigma: 1.0,
            lower_bound: -5.0,
            upper_bound: 5.0,
            active: false,
            elitist: false,
            mirrored: false,
            orthogonal: false,
            sequential: false,
            threshold: false,
            tpa: false,
            base_sampler: BaseSampler::Gaussian,
            selection: SelectionKind::Best,
            ipop: RestartStrategy::None,
            weights_option: WeightsOption::Default,
            evaluation: EvaluationMode::Sequential,
            seq_cutoff: 1,
            seed: None,
        }
    }

    /// Returns a builder for creating an `EsOptions` instance.
    pub fn builder(n: usize, budget: usize) -> EsOptionsBuilder {
        EsOptionsBuilder {
            options: Self::new(n, budget),
        }
    }

    /// Checks the options for values no run can work with.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero dimension or budget, a
    /// non-positive step size, empty bounds, a parent fraction outside
    /// `(0, 1]`, zero offspring, a zero sequential cutoff, or a Sobol base
    /// sampler beyond the supported dimensionality.
    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(OptimizerError::Configuration(
                "Dimensionality must be at least 1".to_string(),
            ));
        }
        if self.budget == 0 {
            return Err(OptimizerError::Configuration(
                "Budget must be at least 1".to_string(),
            ));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(OptimizerError::Configuration(format!(
                "Step size must be positive and finite, got {}",
                self.sigma
            )));
        }
        if !(self.lower_bound < self.upper_bound) {
            return Err(OptimizerError::Configuration(format!(
                "Lower bound {} must be below upper bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        if let Some(mu) = self.mu {
            if !(mu > 0.0 && mu <= 1.0) {
                return Err(OptimizerError::Configuration(format!(
                    "Parent fraction must lie in (0, 1], got {}",
                    mu
                )));
            }
        }
        if self.lambda == Some(0) {
            return Err(OptimizerError::Configuration(
                "Number of offspring cannot be zero".to_string(),
            ));
        }
        if self.seq_cutoff == 0 {
            return Err(OptimizerError::Configuration(
                "Sequential cutoff multiplier cannot be zero".to_string(),
            ));
        }
        if self.base_sampler == BaseSampler::QuasiSobol
            && self.n > sobol_burley::NUM_DIMENSIONS as usize
        {
            return Err(OptimizerError::Configuration(format!(
                "Sobol sampling supports at most {} dimensions, got {}",
                sobol_burley::NUM_DIMENSIONS,
                self.n
            )));
        }
        Ok(())
    }

    /// Derives the population sizes for the configured offspring count.
    pub fn dependencies(&self) -> Dependencies {
        self.dependencies_for(self.lambda)
    }

    /// Derives the population sizes for a given offspring count.
    ///
    /// - With TPA, two offspring are reserved for the probes, with at least
    ///   four offspring in total.
    /// - With pairwise selection, the offspring count is forced even (at
    ///   least one pair, two with TPA) and a parent fraction of one half or
    ///   more is halved, since only half of the offspring can survive.
    pub fn dependencies_for(&self, lambda: Option<usize>) -> Dependencies {
        let mut lambda = lambda.unwrap_or_else(|| default_lambda(self.n));
        let mut eff_lambda = lambda;
        let mut mu = self.mu.unwrap_or(0.5);

        if self.tpa {
            if lambda <= 4 {
                lambda = 4;
                eff_lambda = 2;
            } else {
                eff_lambda = lambda - 2;
            }
        }

        if self.selection == SelectionKind::Pairwise {
            if lambda % 2 == 1 {
                lambda -= 1;
            }
            if lambda == 0 {
                lambda = 2;
            }

            if self.tpa {
                if lambda == 2 {
                    lambda = 4;
                }
                eff_lambda = lambda - 2;
            } else {
                eff_lambda = lambda;
            }

            if mu >= 0.5 {
                mu /= 2.0;
            }
        }

        let seq_cutoff = if self.sequential && self.selection == SelectionKind::Pairwise {
            2 * self.seq_cutoff
        } else {
            self.seq_cutoff
        };

        Dependencies {
            lambda,
            eff_lambda,
            mu,
            seq_cutoff,
        }
    }
}

/// Builder for `EsOptions`.
///
/// Provides a fluent interface; [`EsOptionsBuilder::build`] validates.
#[derive(Debug, Clone)]
pub struct EsOptionsBuilder {
    options: EsOptions,
}

impl EsOptionsBuilder {
    pub fn mu(mut self, value: f64) -> Self {
        self.options.mu = Some(value);
        self
    }

    pub fn lambda(mut self, value: usize) -> Self {
        self.options.lambda = Some(value);
        self
    }

    pub fn sigma(mut self, value: f64) -> Self {
        self.options.sigma = value;
        self
    }

    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.options.lower_bound = lower;
        self.options.upper_bound = upper;
        self
    }

    pub fn active(mut self, value: bool) -> Self {
        self.options.active = value;
        self
    }

    pub fn elitist(mut self, value: bool) -> Self {
        self.options.elitist = value;
        self
    }

    pub fn mirrored(mut self, value: bool) -> Self {
        self.options.mirrored = value;
        self
    }

    pub fn orthogonal(mut self, value: bool) -> Self {
        self.options.orthogonal = value;
        self
    }

    pub fn sequential(mut self, value: bool) -> Self {
        self.options.sequential = value;
        self
    }

    pub fn threshold(mut self, value: bool) -> Self {
        self.options.threshold = value;
        self
    }

    pub fn tpa(mut self, value: bool) -> Self {
        self.options.tpa = value;
        self
    }

    pub fn base_sampler(mut self, value: BaseSampler) -> Self {
        self.options.base_sampler = value;
        self
    }

    pub fn selection(mut self, value: SelectionKind) -> Self {
        self.options.selection = value;
        self
    }

    pub fn ipop(mut self, value: RestartStrategy) -> Self {
        self.options.ipop = value;
        self
    }

    pub fn weights_option(mut self, value: WeightsOption) -> Self {
        self.options.weights_option = value;
        self
    }

    pub fn evaluation(mut self, value: EvaluationMode) -> Self {
        self.options.evaluation = value;
        self
    }

    pub fn seq_cutoff(mut self, value: usize) -> Self {
        self.options.seq_cutoff = value;
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.options.seed = Some(value);
        self
    }

    /// Builds and validates the `EsOptions` instance.
    pub fn build(self) -> Result<EsOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
