//! Normalization of raw abundance tables.
//!
//! - **Sample names**: ordered suffix rules recovering run accessions
//! - **Relative abundance**: per-sample proportions over the selected rows
//! - **CLR**: per-feature centered log-ratio with a pseudocount

pub mod clr;
pub mod relative;
pub mod sample_names;

pub use clr::{clr_values, norm_clr, TransformedMatrix, DEFAULT_PSEUDOCOUNT};
pub use relative::{normalize_relative, NormalizationReport, RelativeAbundance};
pub use sample_names::SuffixRules;
