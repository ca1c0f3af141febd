pub mod error;
pub mod evolution;
pub mod individual;
pub mod parameters;
pub mod rng;
pub mod sampling;
pub mod selection;
pub mod strategy;

// Re-export commonly used types for convenience
pub use error::{OptimizerError, OptionExt, Result, ResultExt};
pub use evolution::{customized_es, EsOptions, Evaluator, OptimizationResult, Optimizer};
pub use individual::Individual;
