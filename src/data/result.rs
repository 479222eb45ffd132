//! Result tables for feature-level and module-level comparisons.

use super::io::create_text;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Decimal places for group summaries and effect sizes.
pub const STAT_DECIMALS: usize = 6;
/// Decimal places for p- and q-values.
pub const PVALUE_DECIMALS: usize = 8;

/// Format a float with fixed precision; non-finite values become "".
///
/// Every table written by this crate goes through this function, so a
/// missing statistic is always an empty cell and never the text "nan".
pub fn format_float(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        String::new()
    }
}

/// Statistics for one feature (clade or pathway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatsRow {
    /// Feature key.
    pub feature: String,
    /// Mean CLR value in group M.
    pub mean_clr_m: f64,
    /// Mean CLR value in group S.
    pub mean_clr_s: f64,
    /// mean_clr_s - mean_clr_m (positive: enriched in S).
    pub diff_s_minus_m: f64,
    /// Cohen's d on CLR values.
    pub cohens_d: f64,
    /// Samples in M with positive relative abundance.
    pub prev_m: usize,
    /// Samples in S with positive relative abundance.
    pub prev_s: usize,
    /// Empirical two-sided permutation p-value.
    pub p_perm: f64,
    /// Benjamini-Hochberg q-value.
    pub q_fdr: f64,
}

/// Statistics for one module aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatsRow {
    /// Module name.
    pub module: String,
    /// Median module score in group M.
    pub median_m: f64,
    /// Median module score in group S.
    pub median_s: f64,
    /// median_s - median_m.
    pub delta_s_minus_m: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Benjamini-Hochberg q-value.
    pub q_value: f64,
}

/// Feature-level result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStatsTable {
    /// Name of the analysis that produced the table.
    pub method: String,
    /// Header of the identifier column.
    pub id_column: String,
    /// One row per tested feature, in input order.
    pub rows: Vec<FeatureStatsRow>,
}

impl FeatureStatsTable {
    /// Create a new table.
    pub fn new(method: &str, id_column: &str, rows: Vec<FeatureStatsRow>) -> Self {
        Self {
            method: method.to_string(),
            id_column: id_column.to_string(),
            rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a row by feature key.
    pub fn get(&self, feature: &str) -> Option<&FeatureStatsRow> {
        self.rows.iter().find(|r| r.feature == feature)
    }

    /// Rows sorted by p-value (ascending, NaN last).
    pub fn sorted_by_pvalue(&self) -> Vec<&FeatureStatsRow> {
        let mut sorted: Vec<_> = self.rows.iter().collect();
        sorted.sort_by(|a, b| nan_last(a.p_perm).total_cmp(&nan_last(b.p_perm)));
        sorted
    }

    /// Count rows below several q-value thresholds.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::from_qvalues(self.rows.iter().map(|r| r.q_fdr))
    }

    /// Write the table as TSV.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(
            writer,
            "{}\tmean_clr_M\tmean_clr_S\tdiff_S_minus_M\tcohens_d\tprev_M\tprev_S\tp_perm\tq_fdr",
            self.id_column
        )?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.feature,
                format_float(r.mean_clr_m, STAT_DECIMALS),
                format_float(r.mean_clr_s, STAT_DECIMALS),
                format_float(r.diff_s_minus_m, STAT_DECIMALS),
                format_float(r.cohens_d, STAT_DECIMALS),
                r.prev_m,
                r.prev_s,
                format_float(r.p_perm, PVALUE_DECIMALS),
                format_float(r.q_fdr, PVALUE_DECIMALS),
            )?;
        }
        Ok(())
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = create_text(path)?;
        self.write_tsv(&mut writer)?;
        writer.finish()?;
        Ok(())
    }
}

/// Module-level result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatsTable {
    /// Name of the analysis that produced the table.
    pub method: String,
    /// One row per scored module, in module name order.
    pub rows: Vec<ModuleStatsRow>,
}

impl ModuleStatsTable {
    /// Create a new table.
    pub fn new(method: &str, rows: Vec<ModuleStatsRow>) -> Self {
        Self {
            method: method.to_string(),
            rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a row by module name.
    pub fn get(&self, module: &str) -> Option<&ModuleStatsRow> {
        self.rows.iter().find(|r| r.module == module)
    }

    /// Count rows below several q-value thresholds.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::from_qvalues(self.rows.iter().map(|r| r.q_value))
    }

    /// Write the table as TSV.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "module\tmedian_M\tmedian_S\tdelta_S_minus_M\tp\tq")?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                r.module,
                format_float(r.median_m, STAT_DECIMALS),
                format_float(r.median_s, STAT_DECIMALS),
                format_float(r.delta_s_minus_m, STAT_DECIMALS),
                format_float(r.p_value, PVALUE_DECIMALS),
                format_float(r.q_value, PVALUE_DECIMALS),
            )?;
        }
        Ok(())
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = create_text(path)?;
        self.write_tsv(&mut writer)?;
        writer.finish()?;
        Ok(())
    }
}

fn nan_last(x: f64) -> f64 {
    if x.is_nan() {
        f64::INFINITY
    } else {
        x
    }
}

/// Summary statistics for a result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: usize,
    pub tested: usize,
    pub significant_01: usize,
    pub significant_05: usize,
    pub significant_10: usize,
    pub significant_25: usize,
}

impl ResultSummary {
    fn from_qvalues<I: Iterator<Item = f64>>(qvalues: I) -> Self {
        let q: Vec<f64> = qvalues.collect();
        let below = |alpha: f64| q.iter().filter(|&&v| v < alpha).count();
        Self {
            total: q.len(),
            tested: q.iter().filter(|v| !v.is_nan()).count(),
            significant_01: below(0.01),
            significant_05: below(0.05),
            significant_10: below(0.10),
            significant_25: below(0.25),
        }
    }
}

impl std::fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rows: {} ({} with a q-value)", self.total, self.tested)?;
        writeln!(f, "q < 0.01: {}", self.significant_01)?;
        writeln!(f, "q < 0.05: {}", self.significant_05)?;
        writeln!(f, "q < 0.10: {}", self.significant_10)?;
        writeln!(f, "q < 0.25: {}", self.significant_25)?;
        Ok(())
    }
}
