pub mod algorithms;
pub mod builder;
pub mod evaluator;
pub mod optimizer;
pub mod options;
pub mod restart;
pub mod result;

pub use algorithms::{
    active_cholesky_es, cholesky_es, cma_es, cmsa_es, customized_es, one_plus_one_es, CustomizedEs,
};
pub use builder::OptimizerBuilder;
pub use evaluator::{BatchEvaluator, Evaluator, ParallelEvaluator};
pub use optimizer::{ExternalCheck, Optimizer, OptimizerState};
pub use options::{BaseSampler, EsOptions, EsOptionsBuilder, EvaluationMode, SelectionKind};
pub use restart::{RestartOutcome, RestartRecord, RestartScheduler, RunRequest};
pub use result::OptimizationResult;
