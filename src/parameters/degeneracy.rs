use nalgebra::{DMatrix, DVector};
use tracing::warn;

use super::{Parameters, FITNESS_HISTORY_LEN, NUMERIC_LOWER, NUMERIC_UPPER};

/// Condition numbers of `A A^T` above this mark the active Cholesky factor as degenerate.
const ACTIVE_CONDITION_LIMIT: f64 = 1e14;

fn all_finite(matrix: &DMatrix<f64>) -> bool {
    matrix.iter().all(|x| x.is_finite())
}

fn in_range(value: f64) -> bool {
    NUMERIC_LOWER < value && value < NUMERIC_UPPER
}

/// Ratio of the largest to the smallest singular value; infinite for a
/// singular matrix.
pub(crate) fn condition_number(matrix: &DMatrix<f64>) -> f64 {
    let singular_values = matrix.singular_values();
    let max = singular_values.iter().copied().fold(0.0, f64::max);
    let min = singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    if min > 0.0 {
        max / min
    } else {
        f64::INFINITY
    }
}

impl Parameters {
    /// Checks the full covariance matrix and refreshes its eigen-decomposition.
    ///
    /// Returns true if the state was degenerate and has been reset.
    pub fn check_degenerated(&mut self) -> bool {
        let degenerated = if !all_finite(&self.C) {
            Some("non-finite covariance matrix")
        } else if !in_range(self.sigma_mean) {
            Some("step size out of range")
        } else {
            self.C = (&self.C + self.C.transpose()) * 0.5;
            let eigen = self.C.clone().symmetric_eigen();
            let eigenvalues = eigen.eigenvalues;
            let min = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
            let max = eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            if !(min > 0.0) || !eigenvalues.iter().all(|x| x.is_finite()) {
                Some("covariance matrix is not positive definite")
            } else if !in_range(max / min) {
                Some("ill-conditioned covariance matrix")
            } else {
                self.B = eigen.eigenvectors;
                self.D = eigenvalues.map(f64::sqrt);
                None
            }
        };

        match degenerated {
            Some(reason) => {
                warn!(reason, sigma_mean = self.sigma_mean, "resetting degenerate covariance");
                let n = self.n;
                self.C = DMatrix::identity(n, n);
                self.B = DMatrix::identity(n, n);
                self.D = DVector::from_element(n, 1.0);
                self.p_c = DVector::zeros(n);
                self.p_sigma = DVector::zeros(n);
                self.sigma = 1.0;
                self.sigma_mean = 1.0;
                true
            }
            None => false,
        }
    }

    /// Checks the Cholesky factor of the (1+1)-Cholesky rule.
    ///
    /// Returns true if the state was degenerate and has been reset.
    pub fn check_cholesky_degenerated(&mut self) -> bool {
        let degenerated = if !all_finite(&self.A) {
            Some("non-finite Cholesky factor")
        } else if !in_range(condition_number(&self.A)) {
            Some("ill-conditioned Cholesky factor")
        } else if !in_range(self.sigma_mean) {
            Some("step size out of range")
        } else {
            None
        };

        match degenerated {
            Some(reason) => {
                warn!(reason, sigma_mean = self.sigma_mean, "resetting degenerate Cholesky factor");
                let n = self.n;
                self.A = DMatrix::identity(n, n);
                self.A_inv = DMatrix::identity(n, n);
                self.p_c = DVector::zeros(n);
                self.p_success = self.p_target;
                self.sigma = 1.0;
                self.sigma_mean = 1.0;
                true
            }
            None => false,
        }
    }

    /// Checks the Cholesky factor and its inverse of the active rule.
    ///
    /// Returns true if the state was degenerate and has been reset.
    pub fn check_active_degenerated(&mut self) -> bool {
        let degenerated = if !all_finite(&self.A) || !all_finite(&self.A_inv) {
            Some("non-finite Cholesky factor")
        } else if !(condition_number(&self.A).powi(2) <= ACTIVE_CONDITION_LIMIT) {
            Some("ill-conditioned Cholesky factor")
        } else if !in_range(self.sigma_mean) {
            Some("step size out of range")
        } else {
            None
        };

        match degenerated {
            Some(reason) => {
                warn!(reason, sigma_mean = self.sigma_mean, "resetting degenerate active Cholesky factor");
                let n = self.n;
                self.A = DMatrix::identity(n, n);
                self.A_inv = DMatrix::identity(n, n);
                self.s = DVector::zeros(n);
                self.p_success = 0.0;
                self.sigma = 1.0;
                self.sigma_mean = 1.0;
                self.fitness_history = std::iter::repeat(self.best_fitness)
                    .take(FITNESS_HISTORY_LEN)
                    .collect();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{AdaptationRule, ParameterSettings};
    use super::*;

    fn params(rule: AdaptationRule) -> Parameters {
        Parameters::new(ParameterSettings::new(3, 100).with_rule(rule)).unwrap()
    }

    #[test]
    fn test_nan_covariance_resets_to_identity() {
        let mut p = params(AdaptationRule::Cma);
        p.C[(1, 2)] = f64::NAN;
        p.sigma = 3.0;

        assert!(p.check_degenerated());
        assert_eq!(p.C, DMatrix::identity(3, 3));
        assert_eq!(p.B, DMatrix::identity(3, 3));
        assert_eq!(p.D, DVector::from_element(3, 1.0));
        assert_eq!(p.sigma_mean, 1.0);
        assert_eq!(p.sigma, 1.0);
    }

    #[test]
    fn test_out_of_range_sigma_mean_resets() {
        let mut p = params(AdaptationRule::Cma);
        p.sigma_mean = 1e-20;
        assert!(p.check_degenerated());
        assert_eq!(p.sigma_mean, 1.0);

        let mut p = params(AdaptationRule::Cma);
        p.sigma_mean = 1e17;
        assert!(p.check_degenerated());
    }

    #[test]
    fn test_negative_eigenvalue_resets() {
        let mut p = params(AdaptationRule::Cma);
        p.C[(0, 0)] = -1.0;
        assert!(p.check_degenerated());
        assert_eq!(p.C, DMatrix::identity(3, 3));
    }

    #[test]
    fn test_valid_covariance_refreshes_decomposition() {
        let mut p = params(AdaptationRule::Cma);
        p.C = DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 9.0, 1.0]));

        assert!(!p.check_degenerated());
        let mut d: Vec<f64> = p.D.iter().copied().collect();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((d[0] - 1.0).abs() < 1e-12);
        assert!((d[1] - 2.0).abs() < 1e-12);
        assert!((d[2] - 3.0).abs() < 1e-12);

        let reconstructed =
            &p.B * DMatrix::from_diagonal(&p.D.map(|x| x * x)) * p.B.transpose();
        assert!((reconstructed - &p.C).abs().max() < 1e-10);
    }

    #[test]
    fn test_singular_cholesky_factor_resets() {
        let mut p = params(AdaptationRule::Cholesky);
        p.A[(2, 2)] = 0.0;
        p.p_success = 0.9;

        assert!(p.check_cholesky_degenerated());
        assert_eq!(p.A, DMatrix::identity(3, 3));
        assert_eq!(p.p_success, p.p_target);
        assert_eq!(p.sigma_mean, 1.0);
    }

    #[test]
    fn test_healthy_cholesky_factor_is_kept() {
        let mut p = params(AdaptationRule::Cholesky);
        p.A[(0, 1)] = 0.5;
        let a = p.A.clone();
        assert!(!p.check_cholesky_degenerated());
        assert_eq!(p.A, a);
    }

    #[test]
    fn test_active_reset_restores_inverse_and_history() {
        let mut p = params(AdaptationRule::ActiveCholesky);
        p.best_fitness = 2.5;
        p.A[(0, 0)] = 1e8;
        p.s = DVector::from_element(3, 1.0);

        assert!(p.check_active_degenerated());
        assert_eq!(p.A, DMatrix::identity(3, 3));
        assert_eq!(p.A_inv, DMatrix::identity(3, 3));
        assert_eq!(p.s, DVector::zeros(3));
        assert_eq!(p.fitness_history.len(), 5);
        assert!(p.fitness_history.iter().all(|&f| f == 2.5));
    }

    #[test]
    fn test_condition_number() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 0.5]));
        assert!((condition_number(&m) - 4.0).abs() < 1e-12);
        assert!(condition_number(&DMatrix::zeros(2, 2)).is_infinite());
    }
}
