//! Run configuration shared by the library and the command line.

use crate::data::GroupColumns;
use crate::error::{DaaError, Result};
use crate::filter::RowFilter;
use crate::normalize::{SuffixRules, DEFAULT_PSEUDOCOUNT};
use crate::test::PermutationConfig;
use crate::validate::DirectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// P-value method for module scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleTest {
    /// Permutation test on CLR-transformed module scores.
    #[default]
    Permutation,
    /// Mann-Whitney U on raw module scores.
    MannWhitney,
}

/// Settings for one analysis run.
///
/// Every field has a default, so a YAML file only needs the keys it
/// changes:
///
/// ```yaml
/// pseudocount: 1.0e-9
/// permutation:
///   n_permutations: 5000
///   seed: 20260205
/// rows:
///   selection: species
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Added to proportions before the CLR log.
    pub pseudocount: f64,
    /// Permutation engine settings.
    pub permutation: PermutationConfig,
    /// Which rows of the raw table are features.
    pub rows: RowFilter,
    /// Suffixes stripped from sample column names.
    pub suffixes: SuffixRules,
    /// Column names of the sample sheet.
    pub sample_sheet: GroupColumns,
    /// P-value method for module scores.
    pub module_test: ModuleTest,
    /// Identifier column of the feature table; derived from the input when unset.
    pub id_column: Option<String>,
    /// Join settings for direction validation.
    pub direction: DirectionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pseudocount: DEFAULT_PSEUDOCOUNT,
            permutation: PermutationConfig::default(),
            rows: RowFilter::default(),
            suffixes: SuffixRules::default(),
            sample_sheet: GroupColumns::default(),
            module_test: ModuleTest::default(),
            id_column: None,
            direction: DirectionConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DaaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DaaError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check settings before any data is read.
    pub fn validate(&self) -> Result<()> {
        if !(self.pseudocount > 0.0 && self.pseudocount.is_finite()) {
            return Err(DaaError::InvalidParameter(format!(
                "pseudocount must be positive and finite, got {}",
                self.pseudocount
            )));
        }
        self.permutation.validate()
    }
}
