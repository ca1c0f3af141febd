//! # Variation operators
//!
//! Recombination creates the unmutated offspring of a generation from its
//! parents; mutation then moves each offspring with a draw from a sampler,
//! shaped by the current search distribution. Both are small closed sets of
//! variants dispatched with a `match`, so the optimizer loop does not depend
//! on which algorithm it runs.
pub mod mutation;
pub mod recombination;

pub use mutation::Mutation;
pub use recombination::Recombination;
