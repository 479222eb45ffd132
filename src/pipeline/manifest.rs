//! Run provenance written next to the result tables.

use super::config::AnalysisConfig;
use super::runner::{PipelineConfig, PipelineOutput};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tool and time of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMeta {
    /// RFC 3339 UTC timestamp.
    pub generated: String,
    pub version: String,
    pub tool: String,
}

impl ManifestMeta {
    fn now() -> Self {
        Self {
            generated: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tool: "cohort-daa".to_string(),
        }
    }
}

/// Samples that reached the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub n_m: usize,
    pub n_s: usize,
    /// Abundance columns without a group assignment.
    pub n_unmatched: usize,
    /// Columns dropped for a zero total.
    pub n_zero_sum: usize,
}

/// Record of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub meta: ManifestMeta,
    /// Input files by role.
    pub inputs: Vec<(String, String)>,
    /// Output files by role.
    pub outputs: Vec<(String, String)>,
    pub samples: SampleCounts,
    /// Number of tested features or modules.
    pub n_tested: usize,
    /// Rows with q < 0.05.
    pub n_significant: usize,
    /// Settings in effect after CLI overrides.
    pub config: AnalysisConfig,
    /// Steps that were executed.
    pub pipeline: PipelineConfig,
}

impl RunManifest {
    /// Describe a finished run.
    pub fn new(output: &PipelineOutput, config: &AnalysisConfig, pipeline: PipelineConfig) -> Self {
        let report = &output.relative.report;
        let summary = match (&output.features, &output.modules) {
            (Some(features), _) => Some(features.summary()),
            (None, Some(modules)) => Some(modules.summary()),
            (None, None) => None,
        };
        Self {
            meta: ManifestMeta::now(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            samples: SampleCounts {
                n_m: report.n_m,
                n_s: report.n_s,
                n_unmatched: report.n_unmatched,
                n_zero_sum: report.n_zero_sum,
            },
            n_tested: summary.as_ref().map_or(0, |s| s.tested),
            n_significant: summary.as_ref().map_or(0, |s| s.significant_05),
            config: config.clone(),
            pipeline,
        }
    }

    /// Record an input file.
    pub fn input<P: AsRef<Path>>(mut self, role: &str, path: P) -> Self {
        self.inputs
            .push((role.to_string(), path.as_ref().display().to_string()));
        self
    }

    /// Record an output file.
    pub fn output<P: AsRef<Path>>(mut self, role: &str, path: P) -> Self {
        self.outputs
            .push((role.to_string(), path.as_ref().display().to_string()));
        self
    }

    /// Convert to JSON format for export.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the manifest as pretty JSON.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
