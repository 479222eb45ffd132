//! Cohort Differential Abundance Analysis Library
//!
//! This library compares metagenomic profiles (HUMAnN pathway tables or
//! MetaPhlAn clade tables) between two severity groups, M and S, with a
//! seeded permutation test on CLR-transformed relative abundances.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Abundance tables, group maps, module membership, result tables
//! - **filter**: Stratified and sentinel row removal, taxonomic level selection
//! - **normalize**: Sample name rules, relative abundance, CLR
//! - **aggregate**: Module scores from member features
//! - **compare**: Group summaries (means, medians, Cohen's d, prevalence)
//! - **test**: Permutation test and Mann-Whitney U
//! - **correct**: Multiple testing correction (Benjamini-Hochberg)
//! - **profile**: Per-sample alpha diversity
//! - **validate**: Direction agreement with an external cohort
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use cohort_daa::prelude::*;
//!
//! let table = AbundanceTable::from_tsv("pathabundance.tsv.gz").unwrap();
//! let groups = GroupMap::from_tsv("samples.tsv", &GroupColumns::default()).unwrap();
//!
//! let config = AnalysisConfig {
//!     permutation: PermutationConfig {
//!         n_permutations: 5000,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! let output = run_feature_analysis(&table, &groups, &config).unwrap();
//! output
//!     .feature_table()
//!     .unwrap()
//!     .to_tsv("species_differential_clr.tsv")
//!     .unwrap();
//! ```

pub mod aggregate;
pub mod compare;
pub mod correct;
pub mod data;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod test;
pub mod validate;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::aggregate::{aggregate_modules, ModuleScores};
    pub use crate::compare::{compare_groups, GroupComparison, GroupIndices};
    pub use crate::correct::{bh_qvalues, correct_bh, BhCorrected};
    pub use crate::data::{
        AbundanceTable, FeatureStatsRow, FeatureStatsTable, Group, GroupColumns, GroupMap,
        ModuleSet, ModuleStatsRow, ModuleStatsTable, ResultSummary,
    };
    pub use crate::error::{DaaError, Result};
    pub use crate::filter::{export_levels, RowFilter, RowSelection, TaxonomicLevel};
    pub use crate::normalize::{
        norm_clr, normalize_relative, RelativeAbundance, SuffixRules, TransformedMatrix,
    };
    pub use crate::pipeline::{
        run_feature_analysis, run_module_analysis, AnalysisConfig, ModuleTest, Pipeline,
        PipelineConfig, PipelineInput, PipelineOutput, PipelineStep, RunManifest,
    };
    pub use crate::profile::{alpha_diversity, write_alpha_diversity, AlphaDiversity};
    pub use crate::test::{
        mann_whitney_u, test_permutation, PermutationConfig, PermutationResults,
    };
    pub use crate::validate::{validate_direction, DirectionConfig, DirectionTable, StatsTable};
}
