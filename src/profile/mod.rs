//! Descriptive profiling of normalized samples.

pub mod diversity;

pub use diversity::{alpha_diversity, richness, shannon, write_alpha_diversity, AlphaDiversity};
