//! Pipeline runner for composing and executing analysis steps.

use super::config::{AnalysisConfig, ModuleTest};
use crate::aggregate::{aggregate_modules, ModuleScores};
use crate::compare::{compare_groups, median, GroupIndices};
use crate::correct::bh_qvalues;
use crate::data::{
    AbundanceTable, FeatureStatsRow, FeatureStatsTable, Group, GroupMap, ModuleSet, ModuleStatsRow,
    ModuleStatsTable,
};
use crate::error::{DaaError, Result};
use crate::filter::RowFilter;
use crate::normalize::{norm_clr, normalize_relative, RelativeAbundance, SuffixRules, TransformedMatrix};
use crate::test::{mann_whitney_u, test_permutation, PermutationConfig};
use log::info;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// A step in the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineStep {
    /// Select feature rows and convert samples to proportions.
    NormalizeRelative {
        rows: RowFilter,
        suffixes: SuffixRules,
    },
    /// Replace features by module scores.
    AggregateModules,
    /// Per-feature CLR transform.
    TransformClr { pseudocount: f64 },
    /// Permutation test on CLR values.
    TestPermutation(PermutationConfig),
    /// Mann-Whitney U on untransformed values.
    TestMannWhitney,
    /// Benjamini-Hochberg correction.
    CorrectBH,
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DaaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DaaError::from)
    }
}

/// Inputs of one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a> {
    pub table: &'a AbundanceTable,
    pub groups: &'a GroupMap,
    /// Required when the pipeline aggregates modules.
    pub modules: Option<&'a ModuleSet>,
    /// Identifier column of the feature table.
    pub id_column: &'a str,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Pipeline name.
    pub name: String,
    /// Normalized feature proportions.
    pub relative: RelativeAbundance,
    /// Module scores, for module pipelines.
    pub scores: Option<ModuleScores>,
    /// Feature statistics, for feature pipelines.
    pub features: Option<FeatureStatsTable>,
    /// Module statistics, for module pipelines.
    pub modules: Option<ModuleStatsTable>,
}

impl PipelineOutput {
    /// Feature statistics, or an error for module pipelines.
    pub fn feature_table(&self) -> Result<&FeatureStatsTable> {
        self.features
            .as_ref()
            .ok_or_else(|| DaaError::Pipeline("Pipeline produced no feature table".to_string()))
    }

    /// Module statistics, or an error for feature pipelines.
    pub fn module_table(&self) -> Result<&ModuleStatsTable> {
        self.modules
            .as_ref()
            .ok_or_else(|| DaaError::Pipeline("Pipeline produced no module table".to_string()))
    }
}

/// Builder for constructing and running analysis pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    name: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Feature-level analysis: proportions, CLR, permutation test, BH.
    pub fn features(config: &AnalysisConfig) -> Self {
        Self::new()
            .name("feature_permutation_clr")
            .normalize_relative(config.rows.clone(), config.suffixes.clone())
            .transform_clr(config.pseudocount)
            .test_permutation(config.permutation.clone())
            .correct_bh()
    }

    /// Module-level analysis with the configured module test.
    pub fn modules(config: &AnalysisConfig) -> Self {
        let pipeline = Self::new()
            .normalize_relative(config.rows.clone(), config.suffixes.clone())
            .aggregate_modules();
        match config.module_test {
            ModuleTest::Permutation => pipeline
                .name("module_permutation_clr")
                .transform_clr(config.pseudocount)
                .test_permutation(config.permutation.clone())
                .correct_bh(),
            ModuleTest::MannWhitney => pipeline
                .name("module_mann_whitney")
                .test_mann_whitney()
                .correct_bh(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add relative abundance normalization.
    pub fn normalize_relative(mut self, rows: RowFilter, suffixes: SuffixRules) -> Self {
        self.steps
            .push(PipelineStep::NormalizeRelative { rows, suffixes });
        self
    }

    /// Add module aggregation.
    pub fn aggregate_modules(mut self) -> Self {
        self.steps.push(PipelineStep::AggregateModules);
        self
    }

    /// Add the CLR transform.
    pub fn transform_clr(mut self, pseudocount: f64) -> Self {
        self.steps.push(PipelineStep::TransformClr { pseudocount });
        self
    }

    /// Add the permutation test.
    pub fn test_permutation(mut self, config: PermutationConfig) -> Self {
        self.steps.push(PipelineStep::TestPermutation(config));
        self
    }

    /// Add the Mann-Whitney U test.
    pub fn test_mann_whitney(mut self) -> Self {
        self.steps.push(PipelineStep::TestMannWhitney);
        self
    }

    /// Add BH correction.
    pub fn correct_bh(mut self) -> Self {
        self.steps.push(PipelineStep::CorrectBH);
        self
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            steps: self.steps.clone(),
        }
    }

    /// Run the pipeline on data.
    pub fn run(&self, input: PipelineInput<'_>) -> Result<PipelineOutput> {
        let mut state = PipelineState::new(input);

        for (i, step) in self.steps.iter().enumerate() {
            state = state.apply(step).map_err(|e| {
                if e.is_configuration() {
                    e
                } else {
                    DaaError::Pipeline(format!("Step {} ({:?}) failed: {}", i + 1, step, e))
                }
            })?;
        }

        state.finalize(&self.name)
    }
}

/// Internal state during pipeline execution.
struct PipelineState<'a> {
    input: PipelineInput<'a>,
    relative: Option<RelativeAbundance>,
    scores: Option<ModuleScores>,
    transformed: Option<TransformedMatrix>,
    p_values: Option<Vec<f64>>,
    q_values: Option<Vec<f64>>,
}

impl<'a> PipelineState<'a> {
    fn new(input: PipelineInput<'a>) -> Self {
        Self {
            input,
            relative: None,
            scores: None,
            transformed: None,
            p_values: None,
            q_values: None,
        }
    }

    /// Untransformed values under test (features × samples) with their
    /// row ids, column ids and column groups.
    fn raw_values(&self) -> Result<(&DMatrix<f64>, &[String], &[String], &[Group])> {
        if let Some(scores) = &self.scores {
            return Ok((&scores.data, &scores.module_ids, &scores.run_ids, &scores.groups));
        }
        let rel = self.relative.as_ref().ok_or_else(|| {
            DaaError::Pipeline("Must normalize before this step".to_string())
        })?;
        Ok((&rel.data, &rel.feature_ids, &rel.run_ids, &rel.groups))
    }

    fn apply(mut self, step: &PipelineStep) -> Result<Self> {
        match step {
            PipelineStep::NormalizeRelative { rows, suffixes } => {
                self.relative = Some(normalize_relative(
                    self.input.table,
                    self.input.groups,
                    rows,
                    suffixes,
                )?);
            }

            PipelineStep::AggregateModules => {
                if self.transformed.is_some() || self.p_values.is_some() {
                    return Err(DaaError::Pipeline(
                        "Module aggregation must come before transform and test steps".to_string(),
                    ));
                }
                let modules = self.input.modules.ok_or_else(|| {
                    DaaError::Pipeline("Module aggregation needs a membership table".to_string())
                })?;
                let rel = self.relative.as_ref().ok_or_else(|| {
                    DaaError::Pipeline("Must normalize before aggregating modules".to_string())
                })?;
                let scores = aggregate_modules(rel, modules)?;
                if scores.n_modules() == 0 {
                    return Err(DaaError::EmptyData(
                        "No module has a member feature in the abundance table".to_string(),
                    ));
                }
                self.scores = Some(scores);
            }

            PipelineStep::TransformClr { pseudocount } => {
                let (data, ids, sample_ids, _) = self.raw_values()?;
                let transformed = norm_clr(data, ids.to_vec(), sample_ids.to_vec(), *pseudocount)?;
                self.transformed = Some(transformed);
            }

            PipelineStep::TestPermutation(config) => {
                let transformed = self.transformed.as_ref().ok_or_else(|| {
                    DaaError::Pipeline("Must transform before permutation test".to_string())
                })?;
                let (data, _, _, groups) = self.raw_values()?;
                if transformed.n_features() != data.nrows() {
                    return Err(DaaError::Pipeline(format!(
                        "Transformed matrix has {} rows but {} are under test",
                        transformed.n_features(),
                        data.nrows()
                    )));
                }
                let indices = GroupIndices::from_groups(groups);
                let results = test_permutation(transformed, &indices, config)?;
                self.p_values = Some(results.p_values());
                self.q_values = None;
            }

            PipelineStep::TestMannWhitney => {
                let (data, _, _, groups) = self.raw_values()?;
                let indices = GroupIndices::from_groups(groups);
                let p_values = (0..data.nrows())
                    .map(|i| {
                        let row: Vec<f64> = data.row(i).iter().cloned().collect();
                        let (m, s) = indices.split(&row);
                        mann_whitney_u(&m, &s).map(|r| r.p_value)
                    })
                    .collect::<Result<Vec<f64>>>()?;
                self.p_values = Some(p_values);
                self.q_values = None;
            }

            PipelineStep::CorrectBH => {
                let p_values = self.p_values.as_ref().ok_or_else(|| {
                    DaaError::Pipeline("Must run a test before BH correction".to_string())
                })?;
                self.q_values = Some(bh_qvalues(p_values));
            }
        }
        Ok(self)
    }

    fn finalize(self, method_name: &str) -> Result<PipelineOutput> {
        let p_values = self.p_values.as_ref().ok_or_else(|| {
            DaaError::Pipeline("Pipeline must include a test step".to_string())
        })?;
        let q_values = self.q_values.as_ref().ok_or_else(|| {
            DaaError::Pipeline("Pipeline must include correction step".to_string())
        })?;
        let (data, _, _, _) = self.raw_values()?;
        if p_values.len() != data.nrows() || q_values.len() != data.nrows() {
            return Err(DaaError::Pipeline(format!(
                "{} p-values for {} rows under test",
                p_values.len(),
                data.nrows()
            )));
        }

        let (features, modules) = match &self.scores {
            Some(scores) => (None, Some(module_table(scores, p_values, q_values, method_name))),
            None => {
                let rel = self.relative.as_ref().ok_or_else(|| {
                    DaaError::Pipeline("Relative abundances not available".to_string())
                })?;
                let transformed = self.transformed.as_ref().ok_or_else(|| {
                    DaaError::Pipeline("Feature table needs CLR values".to_string())
                })?;
                if transformed.n_features() != rel.n_features() {
                    return Err(DaaError::Pipeline(
                        "CLR values do not match the normalized features".to_string(),
                    ));
                }
                let table = feature_table(
                    rel,
                    transformed,
                    p_values,
                    q_values,
                    method_name,
                    self.input.id_column,
                );
                (Some(table), None)
            }
        };

        let relative = self.relative.ok_or_else(|| {
            DaaError::Pipeline("Relative abundances not available".to_string())
        })?;
        Ok(PipelineOutput {
            name: method_name.to_string(),
            relative,
            scores: self.scores,
            features,
            modules,
        })
    }
}

fn feature_table(
    rel: &RelativeAbundance,
    transformed: &TransformedMatrix,
    p_values: &[f64],
    q_values: &[f64],
    method_name: &str,
    id_column: &str,
) -> FeatureStatsTable {
    let indices = GroupIndices::from_groups(&rel.groups);
    let rows = (0..rel.n_features())
        .map(|i| {
            let cmp = compare_groups(&transformed.row(i), &rel.row(i), &indices);
            FeatureStatsRow {
                feature: rel.feature_ids[i].clone(),
                mean_clr_m: cmp.mean_m,
                mean_clr_s: cmp.mean_s,
                diff_s_minus_m: cmp.diff_s_minus_m,
                cohens_d: cmp.cohens_d,
                prev_m: cmp.prev_m,
                prev_s: cmp.prev_s,
                p_perm: p_values[i],
                q_fdr: q_values[i],
            }
        })
        .collect();
    FeatureStatsTable::new(method_name, id_column, rows)
}

fn module_table(
    scores: &ModuleScores,
    p_values: &[f64],
    q_values: &[f64],
    method_name: &str,
) -> ModuleStatsTable {
    let indices = GroupIndices::from_groups(&scores.groups);
    let rows = (0..scores.n_modules())
        .map(|i| {
            let (m, s) = indices.split(&scores.row(i));
            let median_m = median(&m);
            let median_s = median(&s);
            ModuleStatsRow {
                module: scores.module_ids[i].clone(),
                median_m,
                median_s,
                delta_s_minus_m: median_s - median_m,
                p_value: p_values[i],
                q_value: q_values[i],
            }
        })
        .collect();
    ModuleStatsTable::new(method_name, rows)
}

/// Identifier column for a feature table read from `table`.
///
/// MetaPhlAn tables keep `clade_name`; anything else is written as `feature`.
pub fn default_id_column(table: &AbundanceTable) -> &'static str {
    if table.feature_column() == "clade_name" {
        "clade_name"
    } else {
        "feature"
    }
}

/// Convenience function to run the feature-level analysis.
pub fn run_feature_analysis(
    table: &AbundanceTable,
    groups: &GroupMap,
    config: &AnalysisConfig,
) -> Result<PipelineOutput> {
    config.validate()?;
    let id_column = config
        .id_column
        .clone()
        .unwrap_or_else(|| default_id_column(table).to_string());
    let output = Pipeline::features(config).run(PipelineInput {
        table,
        groups,
        modules: None,
        id_column: &id_column,
    })?;
    let summary = output.feature_table()?.summary();
    info!(
        "Feature analysis: {} features tested, {} with q < 0.05",
        summary.tested, summary.significant_05
    );
    Ok(output)
}

/// Convenience function to run the module-level analysis.
pub fn run_module_analysis(
    table: &AbundanceTable,
    groups: &GroupMap,
    modules: &ModuleSet,
    config: &AnalysisConfig,
) -> Result<PipelineOutput> {
    config.validate()?;
    let output = Pipeline::modules(config).run(PipelineInput {
        table,
        groups,
        modules: Some(modules),
        id_column: "module",
    })?;
    let summary = output.module_table()?.summary();
    info!(
        "Module analysis: {} modules tested, {} with q < 0.05",
        summary.tested, summary.significant_05
    );
    Ok(output)
}
