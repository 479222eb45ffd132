//! Per-sample alpha diversity of normalized profiles.

use crate::data::io::create_text;
use crate::data::{format_float, Group, STAT_DECIMALS};
use crate::error::Result;
use crate::normalize::RelativeAbundance;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Alpha diversity of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaDiversity {
    /// Sample column name.
    pub sample_id: String,
    pub run_accession: String,
    pub group: Group,
    /// Shannon entropy, natural log.
    pub shannon: f64,
    /// Features with a positive proportion.
    pub richness: usize,
}

/// Shannon entropy `-Σ p ln p` over positive proportions.
pub fn shannon(proportions: &[f64]) -> f64 {
    proportions
        .iter()
        .filter(|&&p| p > 0.0)
        .fold(0.0, |acc, &p| acc - p * p.ln())
}

/// Number of positive proportions.
pub fn richness(proportions: &[f64]) -> usize {
    proportions.iter().filter(|&&p| p > 0.0).count()
}

/// Shannon entropy and richness for every kept sample.
pub fn alpha_diversity(rel: &RelativeAbundance) -> Vec<AlphaDiversity> {
    (0..rel.n_samples())
        .map(|j| {
            let col = rel.col(j);
            AlphaDiversity {
                sample_id: rel.sample_ids[j].clone(),
                run_accession: rel.run_ids[j].clone(),
                group: rel.groups[j],
                shannon: shannon(&col),
                richness: richness(&col),
            }
        })
        .collect()
}

/// Write `sample_id, run_accession, group, shannon, richness` rows.
pub fn write_alpha_diversity<P: AsRef<Path>>(rows: &[AlphaDiversity], path: P) -> Result<()> {
    let mut writer = create_text(path)?;
    writeln!(writer, "sample_id\trun_accession\tgroup\tshannon\trichness")?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            row.sample_id,
            row.run_accession,
            row.group,
            format_float(row.shannon, STAT_DECIMALS),
            row.richness
        )?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizationReport;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_shannon() {
        assert_relative_eq!(shannon(&[0.25, 0.25, 0.25, 0.25]), 4.0_f64.ln(), epsilon = 1e-12);
        assert_eq!(shannon(&[1.0, 0.0]), 0.0);
        assert_eq!(richness(&[0.5, 0.0, 0.5]), 2);
    }

    #[test]
    fn test_alpha_diversity_table() {
        let rel = RelativeAbundance {
            data: DMatrix::from_row_slice(2, 2, &[0.5, 1.0, 0.5, 0.0]),
            feature_ids: vec!["A".into(), "B".into()],
            sample_ids: vec!["R1.metaphlan".into(), "R2.metaphlan".into()],
            run_ids: vec!["R1".into(), "R2".into()],
            groups: vec![Group::M, Group::S],
            column_totals: vec![2.0, 1.0],
            report: NormalizationReport::default(),
        };
        let rows = alpha_diversity(&rel);
        assert_eq!(rows.len(), 2);
        assert_relative_eq!(rows[0].shannon, 2.0_f64.ln(), epsilon = 1e-12);
        assert_eq!(rows[0].richness, 2);
        assert_eq!(rows[1].richness, 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha_diversity.tsv");
        write_alpha_diversity(&rows, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sample_id\trun_accession\tgroup\tshannon\trichness");
        assert_eq!(lines[1], "R1.metaphlan\tR1\tM\t0.693147\t2");
        assert_eq!(lines[2], "R2.metaphlan\tR2\tS\t0.000000\t1");
    }
}
