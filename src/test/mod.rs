//! Statistical tests for two-group differences.

pub mod mann_whitney;

pub use mann_whitney::{mann_whitney_u, MannWhitneyMethod, MannWhitneyResult};
pub use permutation::{
    binomial, test_permutation, PermutationConfig, PermutationOutcome, PermutationResult,
    PermutationResults, PermutationSubsets, SubsetMode, DEFAULT_SEED,
};
