//! Pipeline composition and execution for cohort comparisons.

mod config;
mod manifest;
mod runner;

pub use config::{AnalysisConfig, ModuleTest};
pub use manifest::{ManifestMeta, RunManifest, SampleCounts};
pub use runner::{
    default_id_column, run_feature_analysis, run_module_analysis, Pipeline, PipelineConfig,
    PipelineInput, PipelineOutput, PipelineStep,
};
