//! # Adaptive Parameter State
//!
//! `Parameters` owns every number that describes the current search
//! distribution of one optimizer run: the step size, the covariance matrix or
//! its Cholesky factor, the evolution paths, the success bookkeeping and the
//! constants of the adaptation rules.
//!
//! The state is mutated in place by three kinds of callers:
//!
//! - mutation operators read `sigma`, `B`/`D` or `A` and the threshold,
//! - selection operators record which offspring survived
//!   ([`Parameters::record_selection`], [`Parameters::add_to_success_history`]),
//! - the optimizer calls [`Parameters::adapt`] once per generation, which runs
//!   the configured [`AdaptationRule`] followed by the matching degeneracy check.
//!
//! A degenerate distribution (non-finite entries, an ill-conditioned matrix or
//! a step size outside `[1e-16, 1e16]`) is reset to the identity. This happens
//! inside the adaptation call and is not reported as an error.
//!
//! ## Example
//!
//! ```rust
//! use evostrat::parameters::{AdaptationRule, ParameterSettings, Parameters};
//!
//! let settings = ParameterSettings::new(4, 1000)
//!     .with_rule(AdaptationRule::OneFifth)
//!     .with_mu_count(1)
//!     .with_lambda(1);
//! let mut params = Parameters::new(settings).unwrap();
//!
//! params.add_to_success_history(4, true);
//! params.adapt(4);
//! assert!(params.sigma > 1.0);
//! ```

mod adaptation;
mod degeneracy;
pub mod restart;
pub mod weights;

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};

use crate::error::{OptimizerError, Result};

pub use restart::{LocalRestartBudget, RestartRegime, RestartStrategy};
pub use weights::WeightsOption;

/// Lower and upper bound on any step size or condition number.
pub(crate) const NUMERIC_LOWER: f64 = 1e-16;
pub(crate) const NUMERIC_UPPER: f64 = 1e16;

/// Number of generations kept in the fitness history.
pub(crate) const FITNESS_HISTORY_LEN: usize = 5;

/// The rule applied by [`Parameters::adapt`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationRule {
    /// The 1/5th success rule of the (1+1)-ES.
    OneFifth,
    /// Blend the covariance toward the mean selected step (CMSA-ES).
    Cmsa,
    /// Success-driven rank-one update of the Cholesky factor ((1+1)-Cholesky-CMA-ES).
    Cholesky,
    /// Positive and negative rank-one Cholesky updates ((1+1)-active-CMA-ES).
    ActiveCholesky,
    /// Cumulative step-size adaptation with rank-one and rank-mu covariance updates.
    Cma,
}

/// Number of parents, either as a fraction of the offspring or as a count.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mu {
    /// `1 + floor(f * (eff_lambda - 1))` parents.
    Fraction(f64),
    /// Exactly this many parents.
    Count(usize),
}

impl Mu {
    /// Resolves the number of parents for `eff_lambda` evaluated offspring.
    pub fn resolve(self, eff_lambda: usize) -> usize {
        match self {
            Mu::Fraction(f) => {
                1 + (f * eff_lambda.saturating_sub(1) as f64).floor().max(0.0) as usize
            }
            Mu::Count(c) => c,
        }
    }
}

impl Default for Mu {
    fn default() -> Self {
        Mu::Fraction(0.5)
    }
}

/// Everything needed to build a [`Parameters`] instance.
#[derive(Debug, Clone)]
pub struct ParameterSettings {
    pub n: usize,
    pub budget: usize,
    pub mu: Mu,
    /// Offspring per generation, including the two TPA probes.
    pub lambda: Option<usize>,
    /// Offspring that are actually mutated; defaults to `lambda`.
    pub eff_lambda: Option<usize>,
    pub sigma: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub rule: AdaptationRule,
    pub weights_option: WeightsOption,
    pub active: bool,
    pub elitist: bool,
    pub sequential: bool,
    pub tpa: bool,
    pub threshold: bool,
    pub local_restart: RestartStrategy,
    /// Multiplier applied to `mu` to obtain the sequential-evaluation cutoff.
    pub seq_cutoff: usize,
    /// Starting mean; the origin when absent.
    pub wcm: Option<DVector<f64>>,
}

impl ParameterSettings {
    pub fn new(n: usize, budget: usize) -> Self {
        Self {
            n,
            budget,
            mu: Mu::default(),
            lambda: None,
            eff_lambda: None,
            sigma: 1.0,
            lower_bound: -5.0,
            upper_bound: 5.0,
            rule: AdaptationRule::Cma,
            weights_option: WeightsOption::Default,
            active: false,
            elitist: false,
            sequential: false,
            tpa: false,
            threshold: false,
            local_restart: RestartStrategy::None,
            seq_cutoff: 1,
            wcm: None,
        }
    }

    pub fn with_rule(mut self, rule: AdaptationRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_mu_count(mut self, mu: usize) -> Self {
        self.mu = Mu::Count(mu);
        self
    }

    pub fn with_mu_fraction(mut self, mu: f64) -> Self {
        self.mu = Mu::Fraction(mu);
        self
    }

    pub fn with_lambda(mut self, lambda: usize) -> Self {
        self.lambda = Some(lambda);
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn with_elitist(mut self, elitist: bool) -> Self {
        self.elitist = elitist;
        self
    }

    pub fn with_wcm(mut self, wcm: DVector<f64>) -> Self {
        self.wcm = Some(wcm);
        self
    }
}

/// Default offspring count for dimensionality `n`: `floor(4 + 3 ln n) + 4`.
pub fn default_lambda(n: usize) -> usize {
    (4.0 + 3.0 * (n.max(1) as f64).ln()).floor() as usize + 4
}

/// The complete mutable state of the search distribution of one run.
///
/// Field names follow the usual CMA-ES notation.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct Parameters {
    // Sizes and switches
    pub n: usize,
    pub budget: usize,
    pub mu: Mu,
    pub mu_int: usize,
    pub lambda: usize,
    pub eff_lambda: usize,
    pub rule: AdaptationRule,
    pub active: bool,
    pub elitist: bool,
    pub sequential: bool,
    pub tpa: bool,
    pub threshold_convergence: bool,
    pub local_restart: RestartStrategy,
    pub seq_cutoff: usize,

    // Step size
    pub sigma: f64,
    pub sigma_init: f64,
    pub sigma_mean: f64,

    // Recombination
    pub weights: DVector<f64>,
    pub mu_eff: f64,
    pub wcm: DVector<f64>,
    pub wcm_old: DVector<f64>,

    // Search space
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub diameter: f64,

    // Full covariance
    pub C: DMatrix<f64>,
    pub B: DMatrix<f64>,
    /// Square roots of the eigenvalues of `C`.
    pub D: DVector<f64>,
    pub p_sigma: DVector<f64>,
    pub p_c: DVector<f64>,
    pub c_sigma: f64,
    pub c_c: f64,
    pub c_1: f64,
    pub c_mu: f64,
    pub c_mu_neg: f64,
    pub damps: f64,
    pub chi_n: f64,

    // Two-point step-size adaptation
    pub tpa_factor: f64,
    pub tpa_result: f64,
    pub alpha_s: f64,
    pub c_alpha: f64,
    pub d_tpa: f64,

    // Threshold convergence
    pub threshold: f64,
    pub init_threshold: f64,
    pub decay_factor: f64,

    // 1/5th rule
    pub success_window: usize,
    pub success_history: Vec<bool>,
    pub c: f64,

    // CMSA
    pub tau: f64,
    pub tau_c: f64,

    // (1+1)-Cholesky
    pub A: DMatrix<f64>,
    pub d: f64,
    pub p_target: f64,
    pub p_success: f64,
    pub c_p: f64,
    pub c_cov: f64,
    pub p_thresh: f64,
    pub c_a: f64,
    pub lambda_success: bool,
    pub last_z: DVector<f64>,

    // Active (1+1)
    pub A_inv: DMatrix<f64>,
    pub s: DVector<f64>,
    pub fitness_history: VecDeque<f64>,
    pub best_fitness: f64,
    pub c_act: f64,
    pub c_cov_pos: f64,
    pub c_cov_neg: f64,
    pub c_cov_neg_default: f64,

    // Selection records
    /// Mutation vectors of the evaluated offspring, best first.
    pub offspring_steps: Vec<DVector<f64>>,
    /// Mutation vectors of the survivors, best first.
    pub selected_steps: Vec<DVector<f64>>,
    /// Step sizes of the survivors that carry one.
    pub selected_sigmas: Vec<f64>,

    pub(crate) restart_history: restart::RestartHistory,
}

impl Parameters {
    /// Builds the state for a fresh run.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero dimension, a zero budget, a
    /// non-positive step size, empty bounds, or a population that leaves no
    /// parent to select.
    pub fn new(settings: ParameterSettings) -> Result<Self> {
        let n = settings.n;
        if n == 0 {
            return Err(OptimizerError::Configuration(
                "Dimensionality must be at least 1".to_string(),
            ));
        }
        if settings.budget == 0 {
            return Err(OptimizerError::Configuration(
                "Budget must be at least 1".to_string(),
            ));
        }
        if !(settings.sigma.is_finite() && settings.sigma > 0.0) {
            return Err(OptimizerError::Configuration(format!(
                "Step size must be positive and finite, got {}",
                settings.sigma
            )));
        }
        if !(settings.lower_bound.is_finite() && settings.upper_bound.is_finite()) {
            return Err(OptimizerError::InvalidNumericValue(format!(
                "Search space bounds must be finite, got [{}, {}]",
                settings.lower_bound, settings.upper_bound
            )));
        }
        if !(settings.lower_bound < settings.upper_bound) {
            return Err(OptimizerError::Configuration(format!(
                "Lower bound {} must be below upper bound {}",
                settings.lower_bound, settings.upper_bound
            )));
        }

        let lambda = settings.lambda.unwrap_or_else(|| default_lambda(n)).max(1);
        let eff_lambda = settings.eff_lambda.unwrap_or(lambda).clamp(1, lambda);
        let mu_int = settings.mu.resolve(eff_lambda);
        if mu_int == 0 {
            return Err(OptimizerError::Configuration(
                "At least one parent is required".to_string(),
            ));
        }
        if let Mu::Fraction(f) = settings.mu {
            if !(0.0..=1.0).contains(&f) {
                return Err(OptimizerError::Configuration(format!(
                    "Parent fraction must lie in [0, 1], got {}",
                    f
                )));
            }
        }

        let wcm = match settings.wcm {
            Some(wcm) if wcm.len() != n => {
                return Err(OptimizerError::Configuration(format!(
                    "Initial mean has {} entries, expected {}",
                    wcm.len(),
                    n
                )));
            }
            Some(wcm) if !wcm.iter().all(|x| x.is_finite()) => {
                return Err(OptimizerError::InvalidNumericValue(
                    "Initial mean contains NaN or infinite entries".to_string(),
                ));
            }
            Some(wcm) => wcm,
            None => DVector::zeros(n),
        };

        let nf = n as f64;
        let weights = settings.weights_option.weights(mu_int, lambda);
        let mu_eff = weights::mu_effective(&weights);

        // Cumulation and learning rates
        let c_sigma = (mu_eff + 2.0) / (mu_eff + nf + 5.0);
        let c_c = (4.0 + mu_eff / nf) / (nf + 4.0 + 2.0 * mu_eff / nf);
        let c_1 = 2.0 / ((nf + 1.3).powi(2) + mu_eff);
        let alpha_mu = 2.0;
        let c_mu = (1.0 - c_1).min(
            alpha_mu * (mu_eff - 2.0 + 1.0 / mu_eff)
                / ((nf + 2.0).powi(2) + alpha_mu * mu_eff / 2.0),
        );
        let c_mu = c_mu.max(0.0);
        let c_mu_neg = (1.0 - c_mu) * 0.25 * mu_eff / ((nf + 2.0).powf(1.5) + 2.0 * mu_eff);
        let damps = 1.0 + 2.0 * (((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let chi_n = nf.sqrt() * (1.0 - 1.0 / (4.0 * nf) + 1.0 / (21.0 * nf * nf));

        let diameter = nf.sqrt() * (settings.upper_bound - settings.lower_bound);
        let init_threshold = 0.2;

        let success_window = 10 * n;
        let c_cov = 2.0 / (nf * nf + 6.0);
        let p_target = 2.0 / 11.0;
        let c_cov_neg_default = 0.4 / (nf.powf(1.6) + 1.0);

        let sigma = settings.sigma;
        Ok(Self {
            n,
            budget: settings.budget,
            mu: settings.mu,
            mu_int,
            lambda,
            eff_lambda,
            rule: settings.rule,
            active: settings.active,
            elitist: settings.elitist,
            sequential: settings.sequential,
            tpa: settings.tpa,
            threshold_convergence: settings.threshold,
            local_restart: settings.local_restart,
            seq_cutoff: settings.seq_cutoff.max(1),

            sigma,
            sigma_init: sigma,
            sigma_mean: sigma,

            weights,
            mu_eff,
            wcm_old: wcm.clone(),
            wcm,

            lower_bound: settings.lower_bound,
            upper_bound: settings.upper_bound,
            diameter,

            C: DMatrix::identity(n, n),
            B: DMatrix::identity(n, n),
            D: DVector::from_element(n, 1.0),
            p_sigma: DVector::zeros(n),
            p_c: DVector::zeros(n),
            c_sigma,
            c_c,
            c_1,
            c_mu,
            c_mu_neg,
            damps,
            chi_n,

            tpa_factor: 0.5,
            tpa_result: 0.0,
            alpha_s: 0.0,
            c_alpha: 0.3,
            d_tpa: nf.sqrt(),

            threshold: init_threshold * diameter,
            init_threshold,
            decay_factor: 0.995,

            success_window,
            success_history: vec![false; success_window],
            c: 0.817,

            tau: 1.0 / (2.0 * nf).sqrt(),
            tau_c: 1.0 + (nf * nf + nf) / (2.0 * mu_int as f64),

            A: DMatrix::identity(n, n),
            d: 1.0 + nf / 2.0,
            p_target,
            p_success: p_target,
            c_p: 1.0 / 12.0,
            c_cov,
            p_thresh: 0.44,
            c_a: (1.0 - c_cov).sqrt(),
            lambda_success: false,
            last_z: DVector::zeros(n),

            A_inv: DMatrix::identity(n, n),
            s: DVector::zeros(n),
            fitness_history: VecDeque::with_capacity(FITNESS_HISTORY_LEN),
            best_fitness: f64::INFINITY,
            c_act: 2.0 / (nf + 2.0),
            c_cov_pos: c_cov,
            c_cov_neg: c_cov_neg_default,
            c_cov_neg_default,

            offspring_steps: Vec::new(),
            selected_steps: Vec::new(),
            selected_sigmas: Vec::new(),

            restart_history: restart::RestartHistory::default(),
        })
    }

    /// Number of offspring the sequential evaluation must try before it may
    /// stop early.
    pub fn sequential_cutoff(&self) -> usize {
        self.mu_int * self.seq_cutoff
    }

    /// Records the outcome of the two TPA probes: `+1` when the probe in the
    /// direction of the mean shift was better, `-1` otherwise.
    pub fn set_tpa_result(&mut self, plus_was_better: bool) {
        self.tpa_result = if plus_was_better { 1.0 } else { -1.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lambda() {
        assert_eq!(default_lambda(1), 8);
        assert_eq!(default_lambda(2), 10);
        assert_eq!(default_lambda(10), 14);
    }

    #[test]
    fn test_mu_resolution() {
        assert_eq!(Mu::Fraction(0.5).resolve(10), 5);
        assert_eq!(Mu::Fraction(0.5).resolve(1), 1);
        assert_eq!(Mu::Fraction(0.25).resolve(8), 2);
        assert_eq!(Mu::Count(3).resolve(10), 3);
    }

    #[test]
    fn test_new_parameters() {
        let params = Parameters::new(ParameterSettings::new(5, 100)).unwrap();
        assert_eq!(params.n, 5);
        assert_eq!(params.success_history.len(), 50);
        assert_eq!(params.lambda, default_lambda(5));
        assert_eq!(params.mu_int, Mu::Fraction(0.5).resolve(params.lambda));
        assert_eq!(params.weights.len(), params.mu_int);
        assert_eq!(params.C, DMatrix::identity(5, 5));
        assert_eq!(params.sigma_mean, 1.0);
        assert!((params.p_target - 2.0 / 11.0).abs() < 1e-15);
        assert!((params.tau - 1.0 / 10f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            Parameters::new(ParameterSettings::new(0, 100)),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(matches!(
            Parameters::new(ParameterSettings::new(3, 0)),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(matches!(
            Parameters::new(ParameterSettings::new(3, 10).with_sigma(-1.0)),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(matches!(
            Parameters::new(ParameterSettings::new(3, 10).with_mu_count(0)),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(matches!(
            Parameters::new(ParameterSettings::new(3, 10).with_wcm(DVector::zeros(2))),
            Err(OptimizerError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_finite_inputs_are_rejected() {
        let settings = ParameterSettings {
            upper_bound: f64::INFINITY,
            ..ParameterSettings::new(3, 10)
        };
        assert!(matches!(
            Parameters::new(settings),
            Err(OptimizerError::InvalidNumericValue(_))
        ));

        let wcm = DVector::from_vec(vec![0.0, f64::NAN, 1.0]);
        assert!(matches!(
            Parameters::new(ParameterSettings::new(3, 10).with_wcm(wcm)),
            Err(OptimizerError::InvalidNumericValue(_))
        ));
    }

    #[test]
    fn test_tpa_result() {
        let mut params = Parameters::new(ParameterSettings::new(2, 10)).unwrap();
        params.set_tpa_result(true);
        assert_eq!(params.tpa_result, 1.0);
        params.set_tpa_result(false);
        assert_eq!(params.tpa_result, -1.0);
    }
}
