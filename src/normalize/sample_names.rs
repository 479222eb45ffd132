//! Sample column name normalization.
//!
//! Merged HUMAnN and MetaPhlAn tables decorate each run accession with the
//! name of the producing step (`DRR000001_Abundance-RPKs`,
//! `DRR000001.metaphlan`). Stripping those suffixes recovers the accession
//! used by the sample sheet.

use serde::{Deserialize, Serialize};

/// Ordered list of suffixes removed from sample column names.
///
/// Each suffix is tried once, in order; a matching suffix is removed and the
/// next rule sees the shortened name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuffixRules(Vec<String>);

impl Default for SuffixRules {
    fn default() -> Self {
        Self::new([
            "_Abundance-RPKs",
            "_Coverage-RPKs",
            "_Abundance",
            "_Coverage",
            "_pathabundance",
            ".pathabundance",
            ".metaphlan",
        ])
    }
}

impl SuffixRules {
    /// Build rules from suffixes, applied in the given order.
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(suffixes.into_iter().map(Into::into).collect())
    }

    /// Rules that leave names untouched apart from trimming.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Append a rule after the existing ones.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.0.push(suffix.to_string());
        self
    }

    /// The suffixes in application order.
    pub fn suffixes(&self) -> &[String] {
        &self.0
    }

    /// Recover the run accession from a sample column name.
    pub fn apply(&self, name: &str) -> String {
        let mut run = name.trim();
        for suffix in &self.0 {
            if !suffix.is_empty() {
                if let Some(stripped) = run.strip_suffix(suffix.as_str()) {
                    run = stripped;
                }
            }
        }
        run.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = SuffixRules::default();
        assert_eq!(rules.apply("DRR1_Abundance-RPKs"), "DRR1");
        assert_eq!(rules.apply("DRR1_Coverage"), "DRR1");
        assert_eq!(rules.apply("DRR1_pathabundance"), "DRR1");
        assert_eq!(rules.apply("DRR1.pathabundance"), "DRR1");
        assert_eq!(rules.apply("DRR1.metaphlan"), "DRR1");
        assert_eq!(rules.apply(" DRR1 "), "DRR1");
        assert_eq!(rules.apply("DRR1"), "DRR1");
    }

    #[test]
    fn test_rules_chain_in_order() {
        // "_pathabundance" is only exposed once "_Abundance" is gone.
        let rules = SuffixRules::default();
        assert_eq!(rules.apply("DRR1_pathabundance_Abundance"), "DRR1");

        // Reversed order leaves the inner suffix in place.
        let reversed = SuffixRules::new(["_pathabundance", "_Abundance"]);
        assert_eq!(reversed.apply("DRR1_pathabundance_Abundance"), "DRR1_pathabundance");
    }

    #[test]
    fn test_custom_rules() {
        let rules = SuffixRules::none().with_suffix("_kneaddata");
        assert_eq!(rules.apply("CRR1_kneaddata"), "CRR1");
        assert_eq!(rules.apply("CRR1.metaphlan"), "CRR1.metaphlan");

        let parsed: SuffixRules = serde_yaml::from_str("- _x\n- .y\n").unwrap();
        assert_eq!(parsed.suffixes(), &["_x", ".y"]);
    }
}
