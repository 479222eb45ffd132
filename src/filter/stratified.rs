//! Row selection for stratified profiles.
//!
//! HUMAnN and MetaPhlAn tables mix community-level rows with breakdown rows
//! whose key joins a parent feature and a contributor with a delimiter
//! (`PWY-1|g__Bacteroides.s__Bacteroides_fragilis`, `k__Bacteria|p__Firmicutes`).
//! Only one layer may enter a test, otherwise each sample would be counted
//! several times over.

use crate::data::AbundanceTable;
use crate::error::{DaaError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Taxonomic rank of a MetaPhlAn clade row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomicLevel {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl TaxonomicLevel {
    /// All levels from coarsest to finest.
    pub const ALL: [TaxonomicLevel; 7] = [
        Self::Kingdom,
        Self::Phylum,
        Self::Class,
        Self::Order,
        Self::Family,
        Self::Genus,
        Self::Species,
    ];

    /// Clade name prefix of this rank.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Kingdom => "k__",
            Self::Phylum => "p__",
            Self::Class => "c__",
            Self::Order => "o__",
            Self::Family => "f__",
            Self::Genus => "g__",
            Self::Species => "s__",
        }
    }

    /// Prefix of the next finer rank. Species rows are bounded by strain
    /// (`t__`) entries.
    pub fn finer_marker(&self) -> &'static str {
        match self {
            Self::Kingdom => "p__",
            Self::Phylum => "c__",
            Self::Class => "o__",
            Self::Order => "f__",
            Self::Family => "g__",
            Self::Genus => "s__",
            Self::Species => "t__",
        }
    }

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kingdom => "kingdom",
            Self::Phylum => "phylum",
            Self::Class => "class",
            Self::Order => "order",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Species => "species",
        }
    }

    /// Parse a level name (case-insensitive).
    pub fn parse(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.name() == lower)
            .ok_or_else(|| {
                DaaError::InvalidParameter(format!(
                    "Unknown taxonomic level '{}'; expected one of kingdom, phylum, class, order, family, genus, species",
                    name
                ))
            })
    }

    /// Parse a comma-separated list of level names.
    pub fn parse_list(names: &str) -> Result<Vec<Self>> {
        names
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Whether a clade key sits exactly at this rank.
    pub fn matches(&self, key: &str, delimiter: char) -> bool {
        has_segment(key, delimiter, self.marker()) && !has_segment(key, delimiter, self.finer_marker())
    }
}

impl std::fmt::Display for TaxonomicLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn has_segment(key: &str, delimiter: char, marker: &str) -> bool {
    key.split(delimiter).any(|segment| segment.starts_with(marker))
}

/// Which layer of rows enters the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RowSelection {
    /// Rows whose key does not contain the delimiter.
    #[default]
    Unstratified,
    /// Clade rows at one taxonomic rank.
    Level(TaxonomicLevel),
}

impl TryFrom<String> for RowSelection {
    type Error = DaaError;

    fn try_from(value: String) -> Result<Self> {
        if value.trim().eq_ignore_ascii_case("unstratified") {
            Ok(Self::Unstratified)
        } else {
            TaxonomicLevel::parse(&value).map(Self::Level)
        }
    }
}

impl From<RowSelection> for String {
    fn from(value: RowSelection) -> Self {
        match value {
            RowSelection::Unstratified => "unstratified".to_string(),
            RowSelection::Level(level) => level.name().to_string(),
        }
    }
}

/// Rules deciding which rows of a raw table are features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    /// Character separating a parent feature from its contributor.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Feature keys dropped on exact match.
    #[serde(default = "default_sentinels")]
    pub sentinels: Vec<String>,
    /// Row layer to keep.
    #[serde(default)]
    pub selection: RowSelection,
}

fn default_delimiter() -> char {
    '|'
}

fn default_sentinels() -> Vec<String> {
    vec!["UNMAPPED".to_string(), "UNINTEGRATED".to_string()]
}

impl Default for RowFilter {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            sentinels: default_sentinels(),
            selection: RowSelection::default(),
        }
    }
}

impl RowFilter {
    /// Keep clade rows at one rank instead of unstratified rows.
    pub fn at_level(mut self, level: TaxonomicLevel) -> Self {
        self.selection = RowSelection::Level(level);
        self
    }

    /// Whether a key is a sentinel category.
    pub fn is_sentinel(&self, key: &str) -> bool {
        self.sentinels.iter().any(|s| s == key)
    }

    /// Whether a key passes the layer rule (ignoring sentinels).
    pub fn selects(&self, key: &str) -> bool {
        match self.selection {
            RowSelection::Unstratified => !key.contains(self.delimiter),
            RowSelection::Level(level) => level.matches(key, self.delimiter),
        }
    }
}

/// Row counts from a filtering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilterReport {
    /// Rows in the input.
    pub n_total: usize,
    /// Rows dropped by the layer rule.
    pub n_other_layer: usize,
    /// Rows dropped as sentinels.
    pub n_sentinel: usize,
    /// Rows kept.
    pub n_kept: usize,
}

/// Indices of the rows kept by `filter`, in table order.
pub fn filter_rows(table: &AbundanceTable, filter: &RowFilter) -> (Vec<usize>, RowFilterReport) {
    let mut report = RowFilterReport {
        n_total: table.n_features(),
        ..Default::default()
    };
    let mut kept = Vec::new();

    for (idx, key) in table.feature_ids().iter().enumerate() {
        if !filter.selects(key) {
            report.n_other_layer += 1;
        } else if filter.is_sentinel(key) {
            report.n_sentinel += 1;
        } else {
            kept.push(idx);
        }
    }
    report.n_kept = kept.len();

    debug!(
        "Row filter: kept {} of {} rows ({} other layer, {} sentinel)",
        report.n_kept, report.n_total, report.n_other_layer, report.n_sentinel
    );
    (kept, report)
}

/// Write one raw table per taxonomic level into `out_dir`.
///
/// Files are named `<prefix>_<level>.tsv` (`.tsv.gz` with `compress`) and
/// keep the input header and raw values unchanged.
pub fn export_levels<P: AsRef<Path>>(
    table: &AbundanceTable,
    levels: &[TaxonomicLevel],
    delimiter: char,
    out_dir: P,
    prefix: &str,
    compress: bool,
) -> Result<Vec<PathBuf>> {
    if levels.is_empty() {
        return Err(DaaError::InvalidParameter(
            "At least one taxonomic level is required".to_string(),
        ));
    }

    let out_dir = out_dir.as_ref();
    let extension = if compress { "tsv.gz" } else { "tsv" };
    let mut written = Vec::with_capacity(levels.len());

    for &level in levels {
        let rows: Vec<usize> = table
            .feature_ids()
            .iter()
            .enumerate()
            .filter(|(_, key)| level.matches(key, delimiter))
            .map(|(idx, _)| idx)
            .collect();
        let path = out_dir.join(format!("{}_{}.{}", prefix, level, extension));
        table.subset_features(&rows)?.to_tsv(&path)?;
        info!("Wrote {} {} rows to {}", rows.len(), level, path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn table(keys: &[&str]) -> AbundanceTable {
        let n = keys.len();
        AbundanceTable::new(
            DMatrix::from_fn(n, 2, |i, j| (i * 2 + j) as f64),
            keys.iter().map(|k| k.to_string()).collect(),
            vec!["S1".into(), "S2".into()],
        )
        .unwrap()
        .with_feature_column("clade_name")
    }

    #[test]
    fn test_unstratified_and_sentinels() {
        let t = table(&[
            "UNMAPPED",
            "UNINTEGRATED",
            "PWY-1",
            "PWY-1|g__Bacteroides.s__Bacteroides_fragilis",
            "PWY-2",
        ]);
        let (kept, report) = filter_rows(&t, &RowFilter::default());
        assert_eq!(kept, vec![2, 4]);
        assert_eq!(report.n_sentinel, 2);
        assert_eq!(report.n_other_layer, 1);
        assert_eq!(report.n_kept, 2);
    }

    #[test]
    fn test_level_matching() {
        let species = "k__Bacteria|p__Firmicutes|c__Clostridia|o__Eubacteriales|f__Lachnospiraceae|g__Blautia|s__Blautia_obeum";
        let strain = format!("{}|t__SGB4810", species);

        assert!(TaxonomicLevel::Species.matches(species, '|'));
        assert!(!TaxonomicLevel::Species.matches(&strain, '|'));
        assert!(!TaxonomicLevel::Genus.matches(species, '|'));
        assert!(TaxonomicLevel::Genus.matches("k__Bacteria|p__Firmicutes|c__C|o__O|f__F|g__Blautia", '|'));
        assert!(TaxonomicLevel::Kingdom.matches("k__Bacteria", '|'));
        assert!(!TaxonomicLevel::Kingdom.matches("k__Bacteria|p__Firmicutes", '|'));
        assert!(TaxonomicLevel::Phylum.matches("k__Bacteria|p__Firmicutes", '|'));
    }

    #[test]
    fn test_level_selection_filter() {
        let t = table(&[
            "k__Bacteria",
            "k__Bacteria|p__Bacteroidota",
            "k__Bacteria|p__Firmicutes",
            "UNCLASSIFIED",
        ]);
        let filter = RowFilter::default().at_level(TaxonomicLevel::Phylum);
        let (kept, report) = filter_rows(&t, &filter);
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(report.n_other_layer, 2);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(
            TaxonomicLevel::parse_list("species, Genus,phylum").unwrap(),
            vec![TaxonomicLevel::Species, TaxonomicLevel::Genus, TaxonomicLevel::Phylum]
        );
        assert!(TaxonomicLevel::parse("strain").is_err());
    }

    #[test]
    fn test_row_selection_serde() {
        let filter: RowFilter = serde_yaml::from_str("selection: species\n").unwrap();
        assert_eq!(filter.selection, RowSelection::Level(TaxonomicLevel::Species));
        assert_eq!(filter.delimiter, '|');
        assert_eq!(filter.sentinels, vec!["UNMAPPED", "UNINTEGRATED"]);

        let text = serde_yaml::to_string(&RowFilter::default()).unwrap();
        assert!(text.contains("unstratified"));
        assert!(serde_yaml::from_str::<RowFilter>("selection: strain\n").is_err());
    }

    #[test]
    fn test_export_levels() {
        let t = table(&[
            "k__Bacteria",
            "k__Bacteria|p__Firmicutes",
            "k__Bacteria|p__Firmicutes|c__C|o__O|f__F|g__G|s__S1",
            "k__Bacteria|p__Firmicutes|c__C|o__O|f__F|g__G|s__S1|t__SGB1",
        ]);
        let dir = tempfile::tempdir().unwrap();
        let written = export_levels(
            &t,
            &[TaxonomicLevel::Species, TaxonomicLevel::Phylum],
            '|',
            dir.path(),
            "metaphlan",
            false,
        )
        .unwrap();

        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("metaphlan_species.tsv"));
        let species = AbundanceTable::from_tsv(&written[0]).unwrap();
        assert_eq!(species.feature_column(), "clade_name");
        assert_eq!(species.n_features(), 1);
        assert_eq!(species.row(0), vec![4.0, 5.0]);
    }
}
