//! Benjamini-Hochberg false discovery rate correction.

use crate::test::PermutationResults;
use serde::{Deserialize, Serialize};

/// Result of BH correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BhCorrected {
    /// Feature IDs in original order.
    pub feature_ids: Vec<String>,
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values (q-values); NaN where the p-value was NaN.
    pub q_values: Vec<f64>,
    /// Number of non-NaN p-values.
    pub n_tests: usize,
}

impl BhCorrected {
    /// Get q-value for a specific feature.
    pub fn get_qvalue(&self, feature_id: &str) -> Option<f64> {
        let idx = self.feature_ids.iter().position(|f| f == feature_id)?;
        self.q_values.get(idx).copied()
    }

    /// Count significant results at a threshold.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.q_values.iter().filter(|&&q| q < alpha).count()
    }

    /// Get indices of significant results.
    pub fn significant_indices(&self, alpha: f64) -> Vec<usize> {
        self.q_values
            .iter()
            .enumerate()
            .filter(|(_, &q)| q < alpha)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Benjamini-Hochberg q-values, aligned with the input.
///
/// NaN p-values are left out of the family (they do not count towards m)
/// and get a NaN q-value. Walking the sorted p-values from the largest,
/// q = min(running minimum, p · m / rank) with the running minimum
/// starting at 1.0, so q never decreases in ascending-p order.
pub fn bh_qvalues(p_values: &[f64]) -> Vec<f64> {
    let mut q_values = vec![f64::NAN; p_values.len()];

    let mut indexed: Vec<(usize, f64)> = p_values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .collect();
    if indexed.is_empty() {
        return q_values;
    }
    // Stable: equal p-values keep input order
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let m = indexed.len() as f64;
    let mut running_min: f64 = 1.0;
    for (pos, &(orig_idx, p)) in indexed.iter().enumerate().rev() {
        let rank = (pos + 1) as f64;
        running_min = running_min.min(p * m / rank);
        q_values[orig_idx] = running_min;
    }

    q_values
}

/// Apply Benjamini-Hochberg FDR correction.
///
/// # Arguments
/// * `p_values` - Raw p-values (NaN for untested features)
/// * `feature_ids` - Feature identifiers (same order as p_values)
///
/// # Returns
/// BhCorrected containing q-values.
pub fn correct_bh(p_values: &[f64], feature_ids: &[String]) -> BhCorrected {
    BhCorrected {
        feature_ids: feature_ids.to_vec(),
        p_values: p_values.to_vec(),
        q_values: bh_qvalues(p_values),
        n_tests: p_values.iter().filter(|p| !p.is_nan()).count(),
    }
}

/// Apply BH correction to permutation test results.
pub fn correct_bh_permutation(perm: &PermutationResults) -> BhCorrected {
    let p_values: Vec<f64> = perm.results.iter().map(|r| r.p_value).collect();
    let feature_ids: Vec<String> = perm.results.iter().map(|r| r.feature_id.clone()).collect();
    correct_bh(&p_values, &feature_ids)
}
