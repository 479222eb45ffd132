//! Severity group labels and the sample → group mapping.

use super::io::open_text;
use crate::error::{DaaError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Clinical severity cohort label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    /// Mild.
    M,
    /// Significant / severe.
    S,
}

impl Group {
    /// Parse a label; only the exact (trimmed) strings `M` and `S` are recognized.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "M" => Some(Self::M),
            "S" => Some(Self::S),
            _ => None,
        }
    }

    /// The label as written in tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::M => "M",
            Self::S => "S",
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Column names used to read a sample sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupColumns {
    /// Column holding the run / sample accession.
    #[serde(default = "default_sample_column")]
    pub sample_column: String,
    /// Column holding the group label.
    #[serde(default = "default_group_column")]
    pub group_column: String,
}

fn default_sample_column() -> String {
    "run_accession".to_string()
}

fn default_group_column() -> String {
    "group".to_string()
}

impl Default for GroupColumns {
    fn default() -> Self {
        Self {
            sample_column: default_sample_column(),
            group_column: default_group_column(),
        }
    }
}

/// Mapping from run / sample accession to its group.
///
/// Rows whose label is not `M` or `S` are dropped at load time and only
/// counted; they never reach downstream tests.
#[derive(Debug, Clone, Default)]
pub struct GroupMap {
    groups: HashMap<String, Group>,
    n_unrecognized: usize,
}

impl GroupMap {
    /// Build a map from (accession, group) pairs. Later pairs win.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Group)>,
        S: Into<String>,
    {
        Self {
            groups: pairs.into_iter().map(|(id, g)| (id.into(), g)).collect(),
            n_unrecognized: 0,
        }
    }

    /// Load a sample sheet (tab-delimited, with header).
    pub fn from_tsv<P: AsRef<Path>>(path: P, columns: &GroupColumns) -> Result<Self> {
        let path = path.as_ref();
        let table_name = format!("sample sheet {}", path.display());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(open_text(path)?);

        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DaaError::MissingColumn {
                    column: name.to_string(),
                    table: table_name.clone(),
                })
        };
        let sample_idx = position(&columns.sample_column)?;
        let group_idx = position(&columns.group_column)?;

        let mut map = Self::default();
        let mut n_rows = 0usize;
        for record in reader.records() {
            let record = record?;
            let run = record.get(sample_idx).unwrap_or("").trim();
            let label = record.get(group_idx).unwrap_or("").trim();
            if run.is_empty() || label.is_empty() {
                continue;
            }
            n_rows += 1;
            match Group::parse(label) {
                Some(group) => {
                    map.groups.insert(run.to_string(), group);
                }
                None => {
                    // Last row for a run wins, so a later unknown label drops it
                    map.groups.remove(run);
                    map.n_unrecognized += 1;
                }
            }
        }

        if n_rows == 0 {
            return Err(DaaError::EmptyData(format!(
                "No {}/{} found in {}",
                columns.sample_column,
                columns.group_column,
                path.display()
            )));
        }
        if map.n_unrecognized > 0 {
            warn!(
                "{}: {} rows with a group label other than M/S were ignored",
                path.display(),
                map.n_unrecognized
            );
        }
        debug!("{}: {} samples with a usable group", path.display(), map.len());

        Ok(map)
    }

    /// Group of an accession, if known.
    pub fn get(&self, accession: &str) -> Option<Group> {
        self.groups.get(accession).copied()
    }

    /// Number of accessions with a recognized group.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no accession has a recognized group.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rows dropped because their label was not `M` or `S`.
    pub fn n_unrecognized(&self) -> usize {
        self.n_unrecognized
    }

    /// Number of accessions per group.
    pub fn counts(&self) -> (usize, usize) {
        let n_m = self.groups.values().filter(|&&g| g == Group::M).count();
        (n_m, self.groups.len() - n_m)
    }
}
