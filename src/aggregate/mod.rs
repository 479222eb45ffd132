//! Aggregation of feature relative abundances into module scores.

pub mod module_scores;

pub use module_scores::{aggregate_modules, ModuleScoreRow, ModuleScores};
