//! Cross-cohort direction validation.
//!
//! Joins a discovery statistics table with an external cohort's table on a
//! shared identifier and flags rows whose effects point the same way.

use crate::data::io::{create_text, open_text};
use crate::error::{DaaError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

/// A delimited statistics table kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsTable {
    /// Name used in error messages.
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StatsTable {
    /// Build a table from columns and rows.
    pub fn new(name: &str, columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(DaaError::DimensionMismatch {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    /// Load a tab-delimited table with a header row.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(open_text(path)?);

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let n_cols = columns.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row.resize(n_cols, String::new());
            rows.push(row);
        }
        Self::new(&path.display().to_string(), columns, rows)
    }

    /// Position of a column, or `MissingColumn`.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DaaError::MissingColumn {
                column: column.to_string(),
                table: self.name.clone(),
            })
    }
}

/// Column names and labels used by the join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionConfig {
    /// Identifier shared by both tables.
    pub id_column: String,
    /// Signed effect column in the discovery table.
    pub discovery_delta: String,
    /// Signed effect column in the external table.
    pub external_delta: String,
    /// P-value column name present in either table.
    pub p_column: String,
    /// Label of the discovery cohort.
    pub discovery_label: String,
    /// Label of the external cohort.
    pub external_label: String,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            id_column: "module".to_string(),
            discovery_delta: "delta_S_minus_M".to_string(),
            external_delta: "delta_LC_minus_HC".to_string(),
            p_column: "p".to_string(),
            discovery_label: "CHB".to_string(),
            external_label: "HBVLC".to_string(),
        }
    }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Whether two effects agree in sign. Non-finite effects never match.
pub fn direction_match(discovery: f64, external: f64) -> bool {
    discovery.is_finite() && external.is_finite() && sign(discovery) == sign(external)
}

fn parse_delta(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Joined table with a `direction_match` column.
#[derive(Debug, Clone)]
pub struct DirectionTable {
    /// Output columns, `direction_match` last.
    pub columns: Vec<String>,
    /// Joined cells, without the match flag.
    pub rows: Vec<Vec<String>>,
    /// Match flag per row.
    pub matches: Vec<bool>,
}

impl DirectionTable {
    /// Number of joined rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no identifier was shared.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose effects agree in sign.
    pub fn n_matched(&self) -> usize {
        self.matches.iter().filter(|&&m| m).count()
    }

    /// Write the table as TSV.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", self.columns.join("\t"))?;
        for (row, matched) in self.rows.iter().zip(&self.matches) {
            writeln!(writer, "{}\t{}", row.join("\t"), matched)?;
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

/// Inner-join two statistics tables on the identifier column.
///
/// Rows follow the discovery table's order. All columns of both tables are
/// kept; each table's p-value column is renamed `p_<label>` and external
/// columns that would collide get a `_<external label>` suffix.
pub fn validate_direction(
    discovery: &StatsTable,
    external: &StatsTable,
    config: &DirectionConfig,
) -> Result<DirectionTable> {
    let disc_id = discovery.column_index(&config.id_column)?;
    let ext_id = external.column_index(&config.id_column)?;
    let disc_delta = discovery.column_index(&config.discovery_delta)?;
    let ext_delta = external.column_index(&config.external_delta)?;

    let rename = |column: &str, label: &str| {
        if column == config.p_column {
            format!("{}_{}", config.p_column, label)
        } else {
            column.to_string()
        }
    };

    let mut columns = vec![config.id_column.clone()];
    let mut disc_cols = Vec::new();
    for (i, c) in discovery.columns.iter().enumerate() {
        if i != disc_id {
            columns.push(rename(c, &config.discovery_label));
            disc_cols.push(i);
        }
    }
    let mut taken: HashSet<String> = columns.iter().cloned().collect();
    let mut ext_cols = Vec::new();
    for (i, c) in external.columns.iter().enumerate() {
        if i == ext_id {
            continue;
        }
        let mut name = rename(c, &config.external_label);
        if taken.contains(&name) {
            name = format!("{}_{}", name, config.external_label);
        }
        taken.insert(name.clone());
        columns.push(name);
        ext_cols.push(i);
    }
    columns.push("direction_match".to_string());

    let mut external_rows: HashMap<&str, Vec<usize>> = HashMap::new();
    for (r, row) in external.rows.iter().enumerate() {
        external_rows.entry(row[ext_id].as_str()).or_default().push(r);
    }

    let mut rows = Vec::new();
    let mut matches = Vec::new();
    let mut n_undefined = 0usize;
    for disc_row in &discovery.rows {
        let id = disc_row[disc_id].as_str();
        let Some(ext_rows) = external_rows.get(id) else {
            continue;
        };
        for &r in ext_rows {
            let ext_row = &external.rows[r];
            let a = parse_delta(&disc_row[disc_delta]);
            let b = parse_delta(&ext_row[ext_delta]);
            if !a.is_finite() || !b.is_finite() {
                n_undefined += 1;
            }

            let mut cells = vec![id.to_string()];
            cells.extend(disc_cols.iter().map(|&i| disc_row[i].clone()));
            cells.extend(ext_cols.iter().map(|&i| ext_row[i].clone()));
            rows.push(cells);
            matches.push(direction_match(a, b));
        }
    }

    if n_undefined > 0 {
        warn!(
            "{} joined rows have a missing or non-numeric effect and are marked as not matching",
            n_undefined
        );
    }
    let table = DirectionTable {
        columns,
        rows,
        matches,
    };
    info!(
        "Direction validation: {} shared identifiers, {} with matching direction",
        table.len(),
        table.n_matched()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn discovery() -> StatsTable {
        StatsTable::new(
            "discovery",
            strings(&["module", "median_M", "median_S", "delta_S_minus_M", "p", "q"]),
            vec![
                strings(&["SCFA", "0.2", "0.1", "-0.1", "0.01", "0.02"]),
                strings(&["BileAcid", "0.1", "0.3", "0.2", "0.04", "0.04"]),
                strings(&["LPS", "0.1", "0.1", "", "", ""]),
                strings(&["OnlyHere", "0.1", "0.2", "0.1", "0.5", "0.5"]),
            ],
        )
        .unwrap()
    }

    fn external() -> StatsTable {
        StatsTable::new(
            "external",
            strings(&["module", "median_LC", "median_HC", "delta_LC_minus_HC", "p", "q"]),
            vec![
                strings(&["BileAcid", "0.4", "0.5", "-0.1", "0.2", "0.3"]),
                strings(&["SCFA", "0.1", "0.3", "-0.2", "0.03", "0.06"]),
                strings(&["LPS", "0.2", "0.1", "0.1", "0.6", "0.6"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_direction_match() {
        assert!(direction_match(-0.1, -2.0));
        assert!(direction_match(0.0, 0.0));
        assert!(!direction_match(0.0, 1.0));
        assert!(!direction_match(0.5, -0.5));
        assert!(!direction_match(f64::NAN, 1.0));
        assert!(!direction_match(1.0, f64::INFINITY));
    }

    #[test]
    fn test_validate_direction() {
        let table = validate_direction(&discovery(), &external(), &DirectionConfig::default()).unwrap();

        assert_eq!(
            table.columns,
            strings(&[
                "module",
                "median_M",
                "median_S",
                "delta_S_minus_M",
                "p_CHB",
                "q",
                "median_LC",
                "median_HC",
                "delta_LC_minus_HC",
                "p_HBVLC",
                "q_HBVLC",
                "direction_match",
            ])
        );
        assert_eq!(table.len(), 3);
        let ids: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["SCFA", "BileAcid", "LPS"]);
        assert_eq!(table.matches, vec![true, false, false]);
        assert_eq!(table.n_matched(), 1);
    }

    #[test]
    fn test_write_direction_table() {
        let table = validate_direction(&discovery(), &external(), &DirectionConfig::default()).unwrap();
        let mut buf = Vec::new();
        table.write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("\tdirection_match"));
        assert_eq!(
            lines[1],
            "SCFA\t0.2\t0.1\t-0.1\t0.01\t0.02\t0.1\t0.3\t-0.2\t0.03\t0.06\ttrue"
        );
        assert!(lines[3].ends_with("\tfalse"));
    }

    #[test]
    fn test_missing_delta_column() {
        let config = DirectionConfig {
            external_delta: "delta_X".into(),
            ..Default::default()
        };
        let err = validate_direction(&discovery(), &external(), &config).unwrap_err();
        match err {
            DaaError::MissingColumn { column, table } => {
                assert_eq!(column, "delta_X");
                assert_eq!(table, "external");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_from_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.tsv");
        std::fs::write(&path, "module\tdelta_S_minus_M\tp\nA\t0.5\t0.1\nB\t-0.5\n").unwrap();
        let table = StatsTable::from_tsv(&path).unwrap();
        assert_eq!(table.columns, strings(&["module", "delta_S_minus_M", "p"]));
        assert_eq!(table.rows[1], strings(&["B", "-0.5", ""]));
    }
}
