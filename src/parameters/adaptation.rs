use nalgebra::{DMatrix, DVector};
use tracing::trace;

use super::{AdaptationRule, Parameters, FITNESS_HISTORY_LEN};
use crate::individual::Individual;

impl Parameters {
    /// Runs the configured adaptation rule for a run that has used `t`
    /// evaluations so far, followed by the matching degeneracy check.
    pub fn adapt(&mut self, t: usize) {
        match self.rule {
            AdaptationRule::OneFifth => self.one_fifth_rule(t),
            AdaptationRule::Cmsa => self.adapt_covariance_matrix(),
            AdaptationRule::Cholesky => self.adapt_cholesky_covariance_matrix(),
            AdaptationRule::ActiveCholesky => self.adapt_active_covariance_matrix(),
            AdaptationRule::Cma => self.adapt_cma(t),
        }
    }

    /// Records whether the evaluation at time `t` (1-based) was a success.
    pub fn add_to_success_history(&mut self, t: usize, success: bool) {
        let index = t.saturating_sub(1) % self.success_window;
        self.success_history[index] = success;
        self.lambda_success = success;
    }

    /// Records the fitness values of one generation's offspring.
    ///
    /// Only the best value is kept, in a history of the last five generations.
    pub fn record_fitness(&mut self, fitnesses: &[f64]) {
        let best = fitnesses.iter().copied().fold(f64::INFINITY, f64::min);
        if self.fitness_history.len() == FITNESS_HISTORY_LEN {
            self.fitness_history.pop_front();
        }
        self.fitness_history.push_back(best);
    }

    /// Records the offspring of a generation (best first) and the survivors of
    /// selection (best first).
    pub fn record_selection(&mut self, sorted_offspring: &[Individual], survivors: &[Individual]) {
        self.offspring_steps = sorted_offspring
            .iter()
            .map(|ind| ind.mutation_vector.clone())
            .collect();
        self.selected_steps = survivors
            .iter()
            .map(|ind| ind.mutation_vector.clone())
            .collect();
        self.selected_sigmas = survivors.iter().filter_map(|ind| ind.sigma).collect();
    }

    /// Adapts `sigma` with the 1/5th success rule.
    ///
    /// Runs only every `n` evaluations. The success rate is taken over the
    /// filled part of the success window.
    pub fn one_fifth_rule(&mut self, t: usize) {
        if t == 0 || t % self.n != 0 {
            return;
        }

        let window = t.min(self.success_window);
        let successes = self.success_history[..window].iter().filter(|&&s| s).count();

        // Compare 5 * successes against the window to keep exactly 1/5 exact.
        match (5 * successes).cmp(&window) {
            std::cmp::Ordering::Less => self.sigma *= self.c,
            std::cmp::Ordering::Greater => self.sigma /= self.c,
            std::cmp::Ordering::Equal => {}
        }
        self.sigma_mean = self.sigma;
    }

    /// CMSA-ES: blends `C` toward the mean selected step and sets the mean step
    /// size to the mean of the selected step sizes.
    pub fn adapt_covariance_matrix(&mut self) {
        if !self.selected_steps.is_empty() {
            let mut s_mean = DVector::zeros(self.n);
            for step in &self.selected_steps {
                s_mean += step;
            }
            s_mean /= self.selected_steps.len() as f64;

            let tau_c_inv = 1.0 / self.tau_c;
            self.C *= 1.0 - tau_c_inv;
            self.C += (&s_mean * s_mean.transpose()) * tau_c_inv;
        }

        if !self.selected_sigmas.is_empty() {
            self.sigma_mean =
                self.selected_sigmas.iter().sum::<f64>() / self.selected_sigmas.len() as f64;
        }

        self.check_degenerated();
    }

    /// (1+1)-Cholesky-CMA-ES update.
    pub fn adapt_cholesky_covariance_matrix(&mut self) {
        let success = if self.lambda_success { 1.0 } else { 0.0 };
        self.p_success = (1.0 - self.c_p) * self.p_success + self.c_p * success;
        self.sigma *= ((self.p_success
            - (self.p_target / (1.0 - self.p_target)) * (1.0 - self.p_success))
            / self.d)
            .exp();
        self.sigma_mean = self.sigma;

        if self.lambda_success && self.p_success < self.p_thresh {
            let z_squared = self.last_z.norm_squared();
            if z_squared > 0.0 {
                let c_a_squared = self.c_a * self.c_a;
                let scale = (self.c_a / z_squared)
                    * ((1.0 + ((1.0 - c_a_squared) * z_squared) / c_a_squared).sqrt() - 1.0);
                let az = &self.A * &self.last_z;
                self.A = &self.A * self.c_a + (az * self.last_z.transpose()) * scale;
            }
        }

        self.check_cholesky_degenerated();
    }

    /// (1+1)-active-CMA-ES update: a positive rank-one update along the
    /// evolution path on success and a negative rank-one update along the last
    /// step once the fitness history shows a new best value.
    pub fn adapt_active_covariance_matrix(&mut self) {
        if self.lambda_success {
            self.p_success = (1.0 - self.c_p) * self.p_success + self.c_p;
            let az = &self.A * &self.last_z;
            self.s = &self.s * (1.0 - self.c_act) + az * (self.c_act * (2.0 - self.c_act)).sqrt();

            let w = &self.A_inv * &self.s;
            let w_norm_squared = w.norm_squared();
            if w_norm_squared > 0.0 {
                let a = (1.0 - self.c_cov_pos).sqrt();
                let b = (a / w_norm_squared)
                    * ((1.0 + w_norm_squared * self.c_cov_pos / (1.0 - self.c_cov_pos)).sqrt()
                        - 1.0);
                self.rank_one_cholesky(&w, a, b);
            }
        } else {
            self.p_success *= 1.0 - self.c_p;
        }

        self.sigma *=
            ((1.0 / self.d) * ((self.p_success - self.p_target) / (1.0 - self.p_target))).exp();
        self.sigma_mean = self.sigma;

        let latest = self.fitness_history.back().copied();
        if let Some(latest) = latest {
            if self.fitness_history.len() == FITNESS_HISTORY_LEN && latest < self.best_fitness {
                self.best_fitness = latest;
                self.negative_cholesky_update();
            }
        }

        self.check_active_degenerated();
    }

    fn negative_cholesky_update(&mut self) {
        let z = self.last_z.clone();
        let z_squared = z.norm_squared();
        if z_squared == 0.0 {
            return;
        }

        // Keep the factor positive definite.
        self.c_cov_neg = if self.c_cov_neg_default * (2.0 * z_squared - 1.0) > 1.0 {
            1.0 / (2.0 * z_squared - 1.0)
        } else {
            self.c_cov_neg_default
        };

        let c_neg = self.c_cov_neg;
        let a = (1.0 + c_neg).sqrt();
        let b = (a / z_squared) * ((1.0 - c_neg * z_squared / (1.0 + c_neg)).sqrt() - 1.0);
        trace!(c_neg, a, b, "negative Cholesky update");
        self.rank_one_cholesky(&z, a, b);
    }

    /// Applies `A <- a A + b (A w) w^T` and keeps `A_inv` its exact inverse.
    fn rank_one_cholesky(&mut self, w: &DVector<f64>, a: f64, b: f64) {
        let w_norm_squared = w.norm_squared();
        let aw = &self.A * w;
        self.A = &self.A * a + (aw * w.transpose()) * b;

        let wt_a_inv = w.transpose() * &self.A_inv;
        let denominator = a * a + a * b * w_norm_squared;
        self.A_inv = &self.A_inv * (1.0 / a) - (w * wt_a_inv) * (b / denominator);
    }

    /// Full CMA-ES update of mean paths, covariance and step size.
    pub fn adapt_cma(&mut self, t: usize) {
        let n = self.n as f64;
        let y_w = (&self.wcm - &self.wcm_old) / self.sigma;

        let inv_d = self.D.map(|d| if d > 0.0 { 1.0 / d } else { 0.0 });
        let inv_sqrt_c = &self.B * DMatrix::from_diagonal(&inv_d) * self.B.transpose();

        self.p_sigma = &self.p_sigma * (1.0 - self.c_sigma)
            + (&inv_sqrt_c * &y_w) * (self.c_sigma * (2.0 - self.c_sigma) * self.mu_eff).sqrt();

        let generation = (t / self.lambda.max(1)) as f64;
        let decay = 1.0 - (1.0 - self.c_sigma).powf(2.0 * (generation + 1.0));
        let h_sigma = if self.p_sigma.norm() / decay.max(f64::MIN_POSITIVE).sqrt()
            < (1.4 + 2.0 / (n + 1.0)) * self.chi_n
        {
            1.0
        } else {
            0.0
        };

        self.p_c = &self.p_c * (1.0 - self.c_c)
            + &y_w * (h_sigma * (self.c_c * (2.0 - self.c_c) * self.mu_eff).sqrt());

        let mut rank_mu = DMatrix::zeros(self.n, self.n);
        for (w, y) in self.weights.iter().zip(&self.offspring_steps) {
            rank_mu += (y * y.transpose()) * *w;
        }

        let rank_one = &self.p_c * self.p_c.transpose()
            + &self.C * ((1.0 - h_sigma) * self.c_c * (2.0 - self.c_c));
        self.C = &self.C * (1.0 - self.c_1 - self.c_mu) + rank_one * self.c_1 + rank_mu * self.c_mu;

        if self.active && self.offspring_steps.len() >= 2 * self.mu_int {
            let mut negative = DMatrix::zeros(self.n, self.n);
            for (w, y) in self.weights.iter().zip(self.offspring_steps.iter().rev()) {
                negative += (y * y.transpose()) * *w;
            }
            self.C -= negative * self.c_mu_neg;
        }

        if self.tpa {
            self.alpha_s = (1.0 - self.c_alpha) * self.alpha_s + self.c_alpha * self.tpa_result;
            self.sigma *= (self.alpha_s / self.d_tpa).exp();
        } else {
            self.sigma *= ((self.p_sigma.norm() / self.chi_n - 1.0) * self.c_sigma / self.damps).exp();
        }
        self.sigma_mean = self.sigma;

        self.check_degenerated();

        if self.threshold_convergence {
            self.update_threshold(t);
        }
    }

    /// Shrinks the threshold-convergence radius as the budget is used up.
    pub fn update_threshold(&mut self, t: usize) {
        let remaining = self.budget.saturating_sub(t) as f64 / self.budget as f64;
        self.threshold = self.init_threshold * self.diameter * remaining.powf(self.decay_factor);
    }
}

#[cfg(test)]
mod tests {
    use super::super::ParameterSettings;
    use super::*;

    fn one_fifth(n: usize) -> Parameters {
        Parameters::new(
            ParameterSettings::new(n, 1000)
                .with_rule(AdaptationRule::OneFifth)
                .with_mu_count(1)
                .with_lambda(1),
        )
        .unwrap()
    }

    #[test]
    fn test_one_fifth_exact_rate_leaves_sigma_unchanged() {
        let mut params = one_fifth(2);
        assert_eq!(params.success_history.len(), 20);

        for t in 1..=20 {
            params.add_to_success_history(t, t % 5 == 0);
        }
        params.adapt(20);
        assert_eq!(params.sigma, 1.0);
        assert_eq!(params.sigma_mean, 1.0);
    }

    #[test]
    fn test_one_fifth_increases_and_decreases() {
        let mut params = one_fifth(2);
        params.add_to_success_history(1, true);
        params.add_to_success_history(2, true);
        params.adapt(2);
        assert!((params.sigma - 1.0 / 0.817).abs() < 1e-12);

        let mut params = one_fifth(2);
        params.add_to_success_history(1, false);
        params.add_to_success_history(2, false);
        params.adapt(2);
        assert!((params.sigma - 0.817).abs() < 1e-12);
    }

    #[test]
    fn test_one_fifth_only_every_n_evaluations() {
        let mut params = one_fifth(3);
        params.add_to_success_history(1, true);
        params.adapt(1);
        params.adapt(2);
        assert_eq!(params.sigma, 1.0);
    }

    #[test]
    fn test_success_history_wraps_around_window() {
        let mut params = one_fifth(1);
        assert_eq!(params.success_window, 10);
        params.add_to_success_history(11, true);
        assert!(params.success_history[0]);
        assert!(params.lambda_success);
    }

    #[test]
    fn test_fitness_history_keeps_five() {
        let mut params = one_fifth(2);
        for f in 0..8 {
            params.record_fitness(&[f as f64 + 1.0, f as f64]);
        }
        assert_eq!(params.fitness_history.len(), 5);
        assert_eq!(params.fitness_history.front().copied(), Some(3.0));
        assert_eq!(params.fitness_history.back().copied(), Some(7.0));
    }

    #[test]
    fn test_cmsa_update_moves_covariance_toward_step() {
        let mut params = Parameters::new(
            ParameterSettings::new(2, 100)
                .with_rule(AdaptationRule::Cmsa)
                .with_mu_count(1)
                .with_lambda(4),
        )
        .unwrap();

        let mut survivor = Individual::new(2);
        survivor.mutation_vector = DVector::from_vec(vec![2.0, 0.0]);
        survivor.sigma = Some(0.5);
        params.record_selection(&[survivor.clone()], &[survivor]);
        params.adapt(4);

        assert!(params.C[(0, 0)] > 1.0);
        assert!((params.C[(1, 1)] - (1.0 - 1.0 / params.tau_c)).abs() < 1e-12);
        assert_eq!(params.sigma_mean, 0.5);
    }

    #[test]
    fn test_cholesky_success_grows_sigma() {
        let mut params = Parameters::new(
            ParameterSettings::new(3, 100)
                .with_rule(AdaptationRule::Cholesky)
                .with_mu_count(1)
                .with_lambda(1),
        )
        .unwrap();

        params.last_z = DVector::from_vec(vec![1.0, 0.5, -0.2]);
        params.add_to_success_history(1, true);
        params.adapt(1);

        assert!(params.sigma > 1.0);
        assert!(params.A != DMatrix::identity(3, 3));
        assert!(params.A.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_active_update_keeps_inverse() {
        let mut params = Parameters::new(
            ParameterSettings::new(3, 100)
                .with_rule(AdaptationRule::ActiveCholesky)
                .with_mu_count(1)
                .with_lambda(1),
        )
        .unwrap();

        let steps = [
            vec![0.3, -1.2, 0.8],
            vec![1.1, 0.4, -0.5],
            vec![-0.7, 0.2, 1.5],
            vec![0.9, 0.9, 0.1],
            vec![-0.4, 1.3, -0.6],
            vec![1.6, -0.3, 0.2],
        ];
        for (t, step) in steps.iter().enumerate() {
            params.last_z = DVector::from_vec(step.clone());
            params.record_fitness(&[10.0 - t as f64]);
            params.add_to_success_history(t + 1, t % 2 == 0);
            params.adapt(t + 1);

            let product = &params.A * &params.A_inv;
            let error = (product - DMatrix::<f64>::identity(3, 3)).abs().max();
            assert!(error < 1e-9, "A * A_inv deviates by {}", error);
        }

        // The history filled up and kept improving, so the negative update ran.
        assert_eq!(params.best_fitness, 5.0);
    }

    #[test]
    fn test_active_success_path_uses_its_own_rate() {
        let mut params = Parameters::new(
            ParameterSettings::new(2, 100)
                .with_rule(AdaptationRule::ActiveCholesky)
                .with_mu_count(1)
                .with_lambda(1),
        )
        .unwrap();
        assert_eq!(params.c_act, 0.5);

        params.last_z = DVector::from_vec(vec![1.0, -2.0]);
        params.add_to_success_history(1, true);
        params.adapt(1);

        let expected = &params.last_z * 0.75f64.sqrt();
        assert!((&params.s - expected).abs().max() < 1e-12);
    }

    #[test]
    fn test_negative_update_shrinks_variance_along_last_step() {
        let mut params = Parameters::new(
            ParameterSettings::new(3, 100)
                .with_rule(AdaptationRule::ActiveCholesky)
                .with_mu_count(1)
                .with_lambda(1),
        )
        .unwrap();

        let z = DVector::from_vec(vec![6.0, -5.0, 4.0]);
        let z_squared = z.norm_squared();
        let direction = (&params.A * &z).normalize();
        let variance = |a: &DMatrix<f64>| (a.transpose() * &direction).norm_squared();

        params.last_z = z;
        for f in [5.0, 4.0, 3.0, 2.0, 1.0] {
            params.record_fitness(&[f]);
        }
        params.add_to_success_history(1, false);

        let mut previous = variance(&params.A);
        assert!((previous - 1.0).abs() < 1e-12);
        for (t, f) in [(1, 1.0), (2, 0.5)] {
            if t > 1 {
                params.record_fitness(&[f]);
            }
            params.adapt(t);

            // The step is long, so the learning rate is clamped.
            assert_eq!(params.c_cov_neg, 1.0 / (2.0 * z_squared - 1.0));
            assert_eq!(params.best_fitness, f);

            let current = variance(&params.A);
            assert!(current < previous, "variance {} did not shrink below {}", current, previous);
            assert!(current > 0.0);
            previous = current;

            assert!(params.A.iter().all(|x| x.is_finite()));
            let product = &params.A * &params.A_inv;
            let error = (product - DMatrix::<f64>::identity(3, 3)).abs().max();
            assert!(error < 1e-9, "A * A_inv deviates by {}", error);
        }
    }

    #[test]
    fn test_cma_update_keeps_covariance_symmetric() {
        let mut params = Parameters::new(ParameterSettings::new(3, 100).with_lambda(6)).unwrap();
        params.wcm_old = DVector::zeros(3);
        params.wcm = DVector::from_vec(vec![0.5, -0.2, 0.1]);
        params.offspring_steps = vec![
            DVector::from_vec(vec![0.6, -0.1, 0.2]),
            DVector::from_vec(vec![0.4, -0.4, 0.0]),
            DVector::from_vec(vec![0.1, 0.3, -0.2]),
        ];
        params.adapt(6);

        assert!((&params.C - params.C.transpose()).abs().max() < 1e-12);
        assert!(params.C[(0, 0)] > params.C[(2, 2)]);
        assert!(params.D.iter().all(|d| *d > 0.0));
        assert!(params.sigma.is_finite());
    }

    #[test]
    fn test_tpa_result_drives_step_size() {
        let settings = ParameterSettings {
            tpa: true,
            ..ParameterSettings::new(2, 100)
        };
        let mut params = Parameters::new(settings).unwrap();
        params.set_tpa_result(true);
        params.adapt(10);
        assert!(params.sigma > 1.0);

        let mut params = Parameters::new(ParameterSettings {
            tpa: true,
            ..ParameterSettings::new(2, 100)
        })
        .unwrap();
        params.set_tpa_result(false);
        params.adapt(10);
        assert!(params.sigma < 1.0);
    }

    #[test]
    fn test_threshold_decays_with_budget() {
        let mut params = Parameters::new(ParameterSettings {
            threshold: true,
            ..ParameterSettings::new(2, 100)
        })
        .unwrap();
        let initial = params.threshold;
        params.update_threshold(50);
        assert!(params.threshold < initial);
        params.update_threshold(100);
        assert_eq!(params.threshold, 0.0);
    }
}
