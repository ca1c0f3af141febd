use nalgebra::DVector;

/// Scheme for the recombination weights of the `mu` selected parents.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightsOption {
    /// Log-linearly decreasing weights, `ln(mu' + 1) - ln(i)` with `mu' = (lambda - 1) / 2`.
    #[default]
    Default,
    /// Every parent weighs `1 / mu`.
    Equal,
    /// Parent `i` weighs `1 / 2^i`; the remainder is shared equally.
    Halving,
}

impl WeightsOption {
    /// Computes normalised weights for `mu` parents out of `lambda` offspring.
    ///
    /// The weights are non-negative, sum to one and never increase with rank.
    pub fn weights(self, mu: usize, lambda: usize) -> DVector<f64> {
        if mu == 0 {
            return DVector::zeros(0);
        }

        let raw: Vec<f64> = match self {
            WeightsOption::Equal => vec![1.0; mu],
            WeightsOption::Halving => {
                let halves: Vec<f64> = (1..=mu).map(|i| 0.5f64.powi(i as i32)).collect();
                let remainder = (1.0 - halves.iter().sum::<f64>()) / mu as f64;
                halves.into_iter().map(|w| w + remainder).collect()
            }
            WeightsOption::Default => {
                let mu_prime = (lambda as f64 - 1.0) / 2.0;
                (1..=mu)
                    .map(|i| ((mu_prime + 1.0).ln() - (i as f64).ln()).max(0.0))
                    .collect()
            }
        };

        let total: f64 = raw.iter().sum();
        if total > 0.0 && total.is_finite() {
            DVector::from_iterator(mu, raw.into_iter().map(|w| w / total))
        } else {
            DVector::from_element(mu, 1.0 / mu as f64)
        }
    }
}

/// Variance-effective selection mass, `1 / sum(w_i^2)`.
pub fn mu_effective(weights: &DVector<f64>) -> f64 {
    let squares = weights.norm_squared();
    if squares > 0.0 {
        1.0 / squares
    } else {
        0.0
    }
}
