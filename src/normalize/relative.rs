//! Relative abundance normalization against a sample sheet.
//!
//! Converts a raw feature × sample table into per-sample proportions over the
//! selected feature rows, keeping only samples that resolve to group M or S.

use super::sample_names::SuffixRules;
use crate::data::{AbundanceTable, Group, GroupMap};
use crate::error::{DaaError, Result};
use crate::filter::{filter_rows, RowFilter, RowFilterReport};
use log::{debug, info, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Bookkeeping from a normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// Row filter counts.
    pub rows: RowFilterReport,
    /// Sample columns in the raw table.
    pub n_columns: usize,
    /// Columns whose accession had no M/S group.
    pub n_unmatched: usize,
    /// Matched columns dropped because their total over kept rows was zero.
    pub n_zero_sum: usize,
    /// Kept samples in group M.
    pub n_m: usize,
    /// Kept samples in group S.
    pub n_s: usize,
}

/// Relative abundances for the samples of both groups.
#[derive(Debug, Clone)]
pub struct RelativeAbundance {
    /// Proportions (features × kept samples); each column sums to 1.
    pub data: DMatrix<f64>,
    /// Feature keys of the kept rows.
    pub feature_ids: Vec<String>,
    /// Original sample column names.
    pub sample_ids: Vec<String>,
    /// Run accessions after suffix stripping.
    pub run_ids: Vec<String>,
    /// Group of each kept sample.
    pub groups: Vec<Group>,
    /// Raw column totals over the kept rows.
    pub column_totals: Vec<f64>,
    /// Counts of what was kept and dropped.
    pub report: NormalizationReport,
}

impl RelativeAbundance {
    /// Get the proportion for a feature and sample.
    pub fn get(&self, feature: usize, sample: usize) -> f64 {
        self.data[(feature, sample)]
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of kept samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row (feature) as a vector.
    pub fn row(&self, feature: usize) -> Vec<f64> {
        self.data.row(feature).iter().cloned().collect()
    }

    /// Get a column (sample) as a vector.
    pub fn col(&self, sample: usize) -> Vec<f64> {
        self.data.column(sample).iter().cloned().collect()
    }

    /// Index of a feature key.
    pub fn feature_index(&self, key: &str) -> Option<usize> {
        self.feature_ids.iter().position(|f| f == key)
    }

    /// Get reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }
}

/// Normalize a raw table to relative abundances.
///
/// 1. Keep the rows selected by `filter` (unstratified or one taxonomic
///    rank, sentinels removed).
/// 2. Strip `suffixes` from each sample column name and look the result up
///    in `groups`; unmatched columns are dropped.
/// 3. Divide each matched column by its total over the kept rows. Columns
///    with a zero total are dropped with a warning.
///
/// # Errors
/// `EmptyData` if no row or no sample survives, `MissingGroup` if either
/// group ends up empty.
pub fn normalize_relative(
    table: &AbundanceTable,
    groups: &GroupMap,
    filter: &RowFilter,
    suffixes: &SuffixRules,
) -> Result<RelativeAbundance> {
    let (rows, row_report) = filter_rows(table, filter);
    if rows.is_empty() {
        return Err(DaaError::EmptyData(
            "No feature rows left after removing stratified and sentinel rows".to_string(),
        ));
    }

    let mut report = NormalizationReport {
        rows: row_report,
        n_columns: table.n_samples(),
        ..Default::default()
    };

    let mut columns: Vec<usize> = Vec::new();
    let mut sample_ids = Vec::new();
    let mut run_ids = Vec::new();
    let mut kept_groups = Vec::new();
    let mut column_totals = Vec::new();

    for (col, name) in table.sample_ids().iter().enumerate() {
        let run = suffixes.apply(name);
        let group = match groups.get(&run) {
            Some(g) => g,
            None => {
                report.n_unmatched += 1;
                continue;
            }
        };

        let total = table.col_sum_over(col, &rows);
        if total <= 0.0 || !total.is_finite() {
            warn!(
                "Sample {} ({}) has zero total abundance over {} feature rows; excluded",
                name,
                run,
                rows.len()
            );
            report.n_zero_sum += 1;
            continue;
        }

        columns.push(col);
        sample_ids.push(name.clone());
        run_ids.push(run);
        kept_groups.push(group);
        column_totals.push(total);
    }

    if columns.is_empty() {
        return Err(DaaError::EmptyData(
            "No overlapping samples between abundance table and sample sheet".to_string(),
        ));
    }

    report.n_m = kept_groups.iter().filter(|&&g| g == Group::M).count();
    report.n_s = kept_groups.len() - report.n_m;
    if report.n_m == 0 || report.n_s == 0 {
        return Err(DaaError::MissingGroup {
            n_m: report.n_m,
            n_s: report.n_s,
        });
    }

    let data = DMatrix::from_fn(rows.len(), columns.len(), |i, j| {
        table.get(rows[i], columns[j]) / column_totals[j]
    });
    let feature_ids = rows
        .iter()
        .map(|&r| table.feature_ids()[r].clone())
        .collect();

    if report.n_unmatched > 0 {
        debug!(
            "{} sample columns had no M/S group in the sample sheet",
            report.n_unmatched
        );
    }
    info!(
        "Normalized {} features across {} samples (M={}, S={})",
        rows.len(),
        columns.len(),
        report.n_m,
        report.n_s
    );

    Ok(RelativeAbundance {
        data,
        feature_ids,
        sample_ids,
        run_ids,
        groups: kept_groups,
        column_totals,
        report,
    })
}
