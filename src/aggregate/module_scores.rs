//! Module scores from member feature relative abundances.

use crate::data::io::create_text;
use crate::data::{Group, ModuleSet};
use crate::error::Result;
use crate::normalize::RelativeAbundance;
use log::{debug, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// One (module, sample) score in long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleScoreRow {
    pub module: String,
    pub run_accession: String,
    pub group: Group,
    pub score: f64,
}

/// Module × sample score matrix.
#[derive(Debug, Clone)]
pub struct ModuleScores {
    /// Scores (modules × samples), each the sum of member proportions.
    pub data: DMatrix<f64>,
    /// Scored module names, in name order.
    pub module_ids: Vec<String>,
    /// Number of members found in the table, per scored module.
    pub n_members: Vec<usize>,
    /// Run accession of each sample column.
    pub run_ids: Vec<String>,
    /// Group of each sample column.
    pub groups: Vec<Group>,
    /// Modules with no member present in the table.
    pub skipped: Vec<String>,
}

impl ModuleScores {
    /// Score for a module and sample.
    pub fn get(&self, module: usize, sample: usize) -> f64 {
        self.data[(module, sample)]
    }

    /// Number of scored modules.
    pub fn n_modules(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Scores of one module across samples.
    pub fn row(&self, module: usize) -> Vec<f64> {
        self.data.row(module).iter().cloned().collect()
    }

    /// Long-format rows (module-major, samples in column order).
    pub fn to_long(&self) -> Vec<ModuleScoreRow> {
        let mut rows = Vec::with_capacity(self.n_modules() * self.n_samples());
        for (i, module) in self.module_ids.iter().enumerate() {
            for (j, run) in self.run_ids.iter().enumerate() {
                rows.push(ModuleScoreRow {
                    module: module.clone(),
                    run_accession: run.clone(),
                    group: self.groups[j],
                    score: self.data[(i, j)],
                });
            }
        }
        rows
    }

    /// Write the long-format table (`module, run_accession, group, score`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = create_text(path)?;
        writeln!(writer, "module\trun_accession\tgroup\tscore")?;
        for row in self.to_long() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                row.module, row.run_accession, row.group, row.score
            )?;
        }
        writer.finish()?;
        Ok(())
    }
}

/// Sum member relative abundances per module and sample.
///
/// Members absent from the table are ignored. A module none of whose
/// members is present produces no row and is listed in `skipped`.
pub fn aggregate_modules(rel: &RelativeAbundance, set: &ModuleSet) -> Result<ModuleScores> {
    let index: HashMap<&str, usize> = rel
        .feature_ids
        .iter()
        .enumerate()
        .map(|(i, f)| (f.as_str(), i))
        .collect();

    let n_samples = rel.n_samples();
    let mut module_ids = Vec::new();
    let mut n_members = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut skipped = Vec::new();

    for (module, members) in set.iter() {
        let rows: Vec<usize> = members
            .iter()
            .filter_map(|m| index.get(m.as_str()).copied())
            .collect();
        if rows.is_empty() {
            skipped.push(module.to_string());
            continue;
        }
        for j in 0..n_samples {
            values.push(rows.iter().map(|&r| rel.get(r, j)).sum());
        }
        module_ids.push(module.to_string());
        n_members.push(rows.len());
        debug!("Module {}: {} of {} members present", module, rows.len(), members.len());
    }

    if !skipped.is_empty() {
        warn!(
            "{} modules have no member features in the table and were skipped: {}",
            skipped.len(),
            skipped.join(", ")
        );
    }

    let data = DMatrix::from_row_slice(module_ids.len(), n_samples, &values);
    Ok(ModuleScores {
        data,
        module_ids,
        n_members,
        run_ids: rel.run_ids.clone(),
        groups: rel.groups.clone(),
        skipped,
    })
}
