//! Group comparison statistics (M vs S).

pub mod summary;

pub use summary::{
    cohens_d, compare_groups, mean, median, prevalence, sample_sd, GroupComparison, GroupIndices,
};
