//! Module → feature membership tables.

use super::io::open_text;
use crate::error::{DaaError, Result};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// Named sets of feature keys.
///
/// Membership is many-to-many: a feature may belong to any number of
/// modules. Modules iterate in sorted name order; members keep file order
/// with duplicates removed.
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    modules: BTreeMap<String, Vec<String>>,
}

impl ModuleSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one (module, feature) membership.
    pub fn insert(&mut self, module: &str, feature: &str) {
        let members = self.modules.entry(module.to_string()).or_default();
        if !members.iter().any(|m| m == feature) {
            members.push(feature.to_string());
        }
    }

    /// Build from (module, feature) pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::new();
        for (module, feature) in pairs {
            set.insert(module, feature);
        }
        set
    }

    /// Load a long-format membership table with `module` and `feature` columns.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
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
                    table: format!("module membership {}", path.display()),
                })
        };
        let module_idx = position("module")?;
        let feature_idx = position("feature")?;

        let mut set = Self::new();
        for record in reader.records() {
            let record = record?;
            let module = record.get(module_idx).unwrap_or("").trim();
            let feature = record.get(feature_idx).unwrap_or("").trim();
            if module.is_empty() || feature.is_empty() {
                continue;
            }
            set.insert(module, feature);
        }

        debug!("{}: {} modules", path.display(), set.len());
        Ok(set)
    }

    /// Members of a module.
    pub fn get(&self, module: &str) -> Option<&[String]> {
        self.modules.get(module).map(|v| v.as_slice())
    }

    /// Iterate over (module, members) in module name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.modules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the set has no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
