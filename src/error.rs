//! # Error Types
//!
//! This module defines the error type shared by every part of the library.
//!
//! Numerical degeneracy of the search distribution is *not* an error: the
//! parameter state repairs itself and the run continues. The variants below
//! cover the fatal cases only: invalid configuration, a population whose size
//! no longer matches the configuration, and samplers or evaluators that cannot
//! deliver what they promise.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use evostrat::error::{OptimizerError, Result};
//!
//! fn check_budget(budget: usize) -> Result<()> {
//!     if budget == 0 {
//!         return Err(OptimizerError::Configuration("Budget cannot be zero".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_budget(0).is_err());
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use evostrat::error::{OptimizerError, OptionExt};
//!
//! fn best_fitness(fitnesses: &[f64]) -> evostrat::error::Result<f64> {
//!     fitnesses
//!         .iter()
//!         .cloned()
//!         .reduce(f64::min)
//!         .ok_or_else_optimizer(|| OptimizerError::EmptyPopulation)
//! }
//!
//! assert!(best_fitness(&[]).is_err());
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur while configuring or running an optimizer.
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// An invalid configuration was provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation needed at least one individual but got none.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// Selection produced a parent population of the wrong size.
    #[error(
        "Bad population size: {actual} instead of {expected} at used budget {used_budget}"
    )]
    PopulationSize {
        expected: usize,
        actual: usize,
        used_budget: usize,
    },

    /// A sampler failed to produce a usable vector.
    #[error("Sampling error: {0}")]
    Sampling(String),

    /// A retry loop gave up.
    #[error("Maximum attempts reached: {0}")]
    MaxAttemptsReached(String),

    /// A fitness evaluator broke its contract.
    #[error("Fitness calculation error: {0}")]
    FitnessCalculation(String),

    /// NaN or infinity where a finite value is required.
    #[error("Invalid numeric value: {0}")]
    InvalidNumericValue(String),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use evostrat::error::ResultExt;
///
/// fn parse_budget(raw: &str) -> evostrat::error::Result<usize> {
///     raw.parse::<usize>().context("Failed to parse budget")
/// }
///
/// assert!(parse_budget("many").is_err());
/// ```
pub trait ResultExt<T, E> {
    /// Converts the error to an `OptimizerError` carrying the given context.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| OptimizerError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, OptimizerError>` using
    /// a closure to generate the error.
    fn ok_or_else_optimizer<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> OptimizerError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_optimizer<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> OptimizerError,
    {
        self.ok_or_else(err_fn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_size_message() {
        let err = OptimizerError::PopulationSize {
            expected: 3,
            actual: 2,
            used_budget: 40,
        };
        assert_eq!(
            err.to_string(),
            "Bad population size: 2 instead of 3 at used budget 40"
        );
    }

    #[test]
    fn test_context_wraps_source_error() {
        let result: std::result::Result<u8, std::num::ParseIntError> = "x".parse::<u8>();
        match result.context("Reading lambda") {
            Err(OptimizerError::Other(msg)) => assert!(msg.starts_with("Reading lambda: ")),
            _ => panic!("Expected Other error"),
        }
    }

    #[test]
    fn test_option_ext() {
        let empty: Option<usize> = None;
        assert!(matches!(
            empty.ok_or_else_optimizer(|| OptimizerError::EmptyPopulation),
            Err(OptimizerError::EmptyPopulation)
        ));
        assert_eq!(
            Some(4).ok_or_else_optimizer(|| OptimizerError::EmptyPopulation).unwrap(),
            4
        );
    }
}
