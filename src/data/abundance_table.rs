//! Raw feature × sample abundance tables (MetaPhlAn / HUMAnN style).

use super::io::{create_text, open_text};
use crate::error::{DaaError, Result};
use log::debug;
use nalgebra::DMatrix;
use std::io::{BufRead, Write};
use std::path::Path;

/// A dense table of raw, non-negative abundances.
///
/// Rows are features (clades or pathways, stratified rows included),
/// columns are samples exactly as named in the file header. Values may be
/// counts, RPKs or percentages depending on the producing tool.
#[derive(Debug, Clone)]
pub struct AbundanceTable {
    /// Raw values (features × samples).
    data: DMatrix<f64>,
    /// Name of the first header column, with any comment marker removed.
    feature_column: String,
    /// Feature keys (row names).
    feature_ids: Vec<String>,
    /// Sample column names as they appear in the header.
    sample_ids: Vec<String>,
}

impl AbundanceTable {
    /// Create a table from a dense matrix and identifiers.
    pub fn new(
        data: DMatrix<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(DaaError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(DaaError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            feature_column: "feature".to_string(),
            feature_ids,
            sample_ids,
        })
    }

    /// Set the name of the feature column used when writing.
    pub fn with_feature_column(mut self, name: &str) -> Self {
        self.feature_column = name.to_string();
        self
    }

    /// Load a table from a tab-delimited file (plain or `.gz`).
    ///
    /// Expected format:
    /// - Optional leading comment lines starting with `#`
    /// - A header line: feature key column followed by one column per sample.
    ///   The header may itself carry a comment marker (`# Pathway\t...`); a
    ///   `#` line is taken as the header when it contains a tab.
    /// - Data rows: feature key followed by text-encoded floats
    ///
    /// Later `#` lines and rows with fewer than two fields are skipped.
    /// Missing or unparseable cells are read as 0.0.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_text(path)?;
        Self::from_reader(reader, &path.display().to_string())
    }

    /// Parse a table from any buffered reader. `source` names the input in
    /// error messages.
    pub fn from_reader<R: BufRead>(reader: R, source: &str) -> Result<Self> {
        let mut lines = reader.lines();

        let header_line = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    let line = line.trim_end_matches(['\r', '\n']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    if line.starts_with('#') && !line.contains('\t') {
                        continue;
                    }
                    break line.to_string();
                }
                None => {
                    return Err(DaaError::HeaderParse {
                        path: source.to_string(),
                        reason: "no header line found".to_string(),
                    })
                }
            }
        };

        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DaaError::HeaderParse {
                path: source.to_string(),
                reason: "header has fewer than 2 columns".to_string(),
            });
        }
        let feature_column = header[0].trim_start_matches('#').trim().to_string();
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut feature_ids: Vec<String> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        let mut n_bad_cells = 0usize;

        for line_result in lines {
            let line = line_result?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                continue;
            }

            feature_ids.push(fields[0].to_string());
            for col_idx in 0..n_samples {
                let value = match fields.get(col_idx + 1).map(|s| s.trim().parse::<f64>()) {
                    Some(Ok(v)) if v.is_finite() => v,
                    _ => {
                        n_bad_cells += 1;
                        0.0
                    }
                };
                values.push(value);
            }
        }

        if n_bad_cells > 0 {
            debug!(
                "{}: {} missing or unparseable cells read as 0.0",
                source, n_bad_cells
            );
        }

        let n_features = feature_ids.len();
        let data = DMatrix::from_row_slice(n_features, n_samples, &values);
        debug!(
            "{}: read {} features x {} samples",
            source, n_features, n_samples
        );

        Ok(Self::new(data, feature_ids, sample_ids)?.with_feature_column(&feature_column))
    }

    /// Write the table as TSV (compressed when the path ends in `.gz`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = create_text(path)?;

        write!(writer, "{}", self.feature_column)?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for col_idx in 0..self.n_samples() {
                write!(writer, "\t{}", self.get(row_idx, col_idx))?;
            }
            writeln!(writer)?;
        }
        writer.finish()?;

        Ok(())
    }

    /// Get the raw value at (feature, sample).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Name of the feature key column.
    pub fn feature_column(&self) -> &str {
        &self.feature_column
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample column names.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Underlying dense matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Dense copy of one feature row.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    /// Sum of one sample column restricted to the given rows.
    pub fn col_sum_over(&self, col: usize, rows: &[usize]) -> f64 {
        rows.iter().map(|&r| self.data[(r, col)]).sum()
    }

    /// Subset the table to the given feature rows (by index).
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        let n_samples = self.n_samples();
        let mut data = DMatrix::zeros(indices.len(), n_samples);
        let mut feature_ids = Vec::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_features() {
                return Err(DaaError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    old_row
                )));
            }
            feature_ids.push(self.feature_ids[old_row].clone());
            for col in 0..n_samples {
                data[(new_row, col)] = self.data[(old_row, col)];
            }
        }

        Ok(Self::new(data, feature_ids, self.sample_ids.clone())?
            .with_feature_column(&self.feature_column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<AbundanceTable> {
        AbundanceTable::from_reader(Cursor::new(text.to_string()), "test")
    }

    #[test]
    fn test_parse_plain_header() {
        let table = parse("clade_name\tS1\tS2\nA\t1.5\t2\nB\t0\t3.25\n").unwrap();
        assert_eq!(table.feature_column(), "clade_name");
        assert_eq!(table.sample_ids(), &["S1", "S2"]);
        assert_eq!(table.feature_ids(), &["A", "B"]);
        assert_eq!(table.get(1, 1), 3.25);
    }

    #[test]
    fn test_parse_skips_leading_comments() {
        let table = parse("#mpa_vJan21\n#another note\nclade_name\tS1\nk__Bacteria\t100\n").unwrap();
        assert_eq!(table.feature_column(), "clade_name");
        assert_eq!(table.n_features(), 1);
    }

    #[test]
    fn test_parse_commented_header() {
        let table = parse("# Pathway\tS1_Abundance\tS2_Abundance\nUNMAPPED\t5\t6\nPWY-1\t1\t2\n")
            .unwrap();
        assert_eq!(table.feature_column(), "Pathway");
        assert_eq!(table.sample_ids(), &["S1_Abundance", "S2_Abundance"]);
        assert_eq!(table.feature_ids(), &["UNMAPPED", "PWY-1"]);
    }

    #[test]
    fn test_unparseable_cells_are_zero() {
        let table = parse("f\tS1\tS2\tS3\nA\tNA\t\t4\nB\t1\n").unwrap();
        assert_eq!(table.get(0, 0), 0.0);
        assert_eq!(table.get(0, 1), 0.0);
        assert_eq!(table.get(0, 2), 4.0);
        // Short row is padded with zeros
        assert_eq!(table.get(1, 2), 0.0);
    }

    #[test]
    fn test_short_rows_and_late_comments_skipped() {
        let table = parse("f\tS1\nA\t1\nlonely\n#trailer\tx\nB\t2\n").unwrap();
        assert_eq!(table.feature_ids(), &["A", "B"]);
    }

    #[test]
    fn test_header_too_narrow() {
        let err = parse("feature_only\nA\n").unwrap_err();
        assert!(matches!(err, DaaError::HeaderParse { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_no_header() {
        assert!(matches!(
            parse("#only comments\n").unwrap_err(),
            DaaError::HeaderParse { .. }
        ));
    }

    #[test]
    fn test_tsv_roundtrip_gz() {
        let table = parse("clade_name\tS1\tS2\nA\t1.5\t2\nB\t0\t3.25\n").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv.gz");
        table.to_tsv(&path).unwrap();

        let loaded = AbundanceTable::from_tsv(&path).unwrap();
        assert_eq!(loaded.feature_column(), "clade_name");
        assert_eq!(loaded.feature_ids(), table.feature_ids());
        assert_eq!(loaded.sample_ids(), table.sample_ids());
        assert_eq!(loaded.matrix(), table.matrix());
    }

    #[test]
    fn test_subset_features() {
        let table = parse("f\tS1\tS2\nA\t1\t2\nB\t3\t4\nC\t5\t6\n").unwrap();
        let subset = table.subset_features(&[2, 0]).unwrap();
        assert_eq!(subset.feature_ids(), &["C", "A"]);
        assert_eq!(subset.row(0), vec![5.0, 6.0]);
        assert!(table.subset_features(&[7]).is_err());
    }

    #[test]
    fn test_col_sum_over() {
        let table = parse("f\tS1\nA\t1\nB\t3\nC\t5\n").unwrap();
        assert_eq!(table.col_sum_over(0, &[0, 2]), 6.0);
    }
}
