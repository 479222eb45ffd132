//! Two-sided Mann-Whitney U test.
//!
//! Used for module scores, where group medians of raw scores are reported.
//! Small samples without ties use the exact null distribution of U; all
//! other cases use the normal approximation with tie and continuity
//! correction.

use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Largest smaller-group size for which the exact distribution is used.
pub const EXACT_MAX_SIZE: usize = 8;

/// How the p-value was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MannWhitneyMethod {
    Exact,
    Asymptotic,
    /// A group was empty; no test was possible.
    Undefined,
}

/// Result of one Mann-Whitney U test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MannWhitneyResult {
    /// U statistic of the first sample.
    pub u_statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    pub method: MannWhitneyMethod,
}

/// Average ranks (1-based) of the pooled values, and the sizes of tie groups.
fn rank_with_ties(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut i = 0;
    while i < order.len() {
        let start = i;
        while i + 1 < order.len() && values[order[i + 1]] == values[order[start]] {
            i += 1;
        }
        let rank = (start + i + 2) as f64 / 2.0;
        for &idx in &order[start..=i] {
            ranks[idx] = rank;
        }
        if i > start {
            ties.push(i - start + 1);
        }
        i += 1;
    }
    (ranks, ties)
}

/// P(U >= u) under the null for sample sizes n1 and n2, without ties.
///
/// The null distribution of U is the same with the group sizes swapped,
/// so the subsets counted are those of the smaller group.
fn exact_upper_tail(n1: usize, n2: usize, u: f64) -> f64 {
    let (small, large) = (n1.min(n2), n1.max(n2));
    let max_u = small * large;
    // counts[k][v]: subsets of size k of the ranks seen so far with U = v
    let mut counts = vec![vec![0.0_f64; max_u + 1]; small + 1];
    counts[0][0] = 1.0;
    for r in 0..small + large {
        for k in (1..=small.min(r + 1)).rev() {
            // Placing rank r+1 as the k-th smallest member adds r+1-k to U
            let shift = r + 1 - k;
            for v in (shift..=max_u).rev() {
                let add = counts[k - 1][v - shift];
                if add > 0.0 {
                    counts[k][v] += add;
                }
            }
        }
    }

    let dist = &counts[small];
    let total: f64 = dist.iter().sum();
    let threshold = u.ceil() as usize;
    if threshold > max_u {
        return 0.0;
    }
    dist[threshold..].iter().sum::<f64>() / total
}

/// Two-sided Mann-Whitney U test of `x` against `y`.
///
/// The p-value is NaN if either sample is empty, and 1.0 if every value
/// is tied.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<MannWhitneyResult> {
    let (n1, n2) = (x.len(), y.len());
    if n1 == 0 || n2 == 0 {
        return Ok(MannWhitneyResult {
            u_statistic: f64::NAN,
            p_value: f64::NAN,
            method: MannWhitneyMethod::Undefined,
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(DaaError::Numerical(
            "Mann-Whitney U requires finite values".to_string(),
        ));
    }

    let pooled: Vec<f64> = x.iter().chain(y.iter()).copied().collect();
    let (ranks, ties) = rank_with_ties(&pooled);
    let r1: f64 = ranks[..n1].iter().sum();
    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let u1 = r1 - n1f * (n1f + 1.0) / 2.0;
    let u_max = u1.max(n1f * n2f - u1);

    if ties.is_empty() && n1.min(n2) <= EXACT_MAX_SIZE {
        let p = (2.0 * exact_upper_tail(n1, n2, u_max)).min(1.0);
        return Ok(MannWhitneyResult {
            u_statistic: u1,
            p_value: p,
            method: MannWhitneyMethod::Exact,
        });
    }

    let n = n1f + n2f;
    let tie_term: f64 = ties
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let variance = n1f * n2f / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    let p = if variance <= 0.0 {
        1.0
    } else {
        let mu = n1f * n2f / 2.0;
        let z = (u_max - mu - 0.5) / variance.sqrt();
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| DaaError::Numerical(format!("Normal distribution: {}", e)))?;
        (2.0 * normal.sf(z)).clamp(0.0, 1.0)
    };

    Ok(MannWhitneyResult {
        u_statistic: u1,
        p_value: p,
        method: MannWhitneyMethod::Asymptotic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ranks_with_ties() {
        let (ranks, ties) = rank_with_ties(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(ties, vec![2]);
    }

    #[test]
    fn test_exact_complete_separation() {
        // 3 vs 3 fully separated: P(U >= 9) = 1/20, two-sided 0.1
        let r = mann_whitney_u(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(r.method, MannWhitneyMethod::Exact);
        assert_eq!(r.u_statistic, 0.0);
        assert_relative_eq!(r.p_value, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_two_by_two() {
        // C(4,2) = 6 arrangements, U = 4 in exactly one
        let r = mann_whitney_u(&[10.0, 11.0], &[1.0, 2.0]).unwrap();
        assert_eq!(r.u_statistic, 4.0);
        assert_relative_eq!(r.p_value, 2.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_middle_is_one() {
        let r = mann_whitney_u(&[1.0, 4.0], &[2.0, 3.0]).unwrap();
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_exact_tail_sums_to_one() {
        assert_relative_eq!(exact_upper_tail(4, 5, 0.0), 1.0, epsilon = 1e-12);
        assert_eq!(exact_upper_tail(4, 5, 21.0), 0.0);
        // P(U >= 20) = 1 / C(9, 4)
        assert_relative_eq!(exact_upper_tail(4, 5, 20.0), 1.0 / 126.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_tail_symmetric_in_sizes() {
        for u in 0..=20 {
            let u = u as f64;
            assert_relative_eq!(
                exact_upper_tail(4, 5, u),
                exact_upper_tail(5, 4, u),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_exact_large_first_group() {
        // 500 M vs 5 S fully separated: one of C(505, 5) arrangements per tail
        let x: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..5).map(|i| 1000.0 + i as f64).collect();
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.method, MannWhitneyMethod::Exact);
        assert_eq!(r.u_statistic, 0.0);
        assert_relative_eq!(r.p_value, 2.0 / 268_318_178_226.0, max_relative = 1e-9);
    }

    #[test]
    fn test_asymptotic_with_ties() {
        let x = [1.0, 2.0, 2.0, 3.0, 4.0];
        let y = [5.0, 6.0, 6.0, 7.0, 8.0];
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.method, MannWhitneyMethod::Asymptotic);
        assert_eq!(r.u_statistic, 0.0);
        // n1 = n2 = 5, two tie pairs: var = 25/12 * (11 - 12/90)
        let sigma = (25.0 / 12.0 * (11.0 - 12.0 / 90.0_f64)).sqrt();
        let z = (25.0 - 12.5 - 0.5) / sigma;
        let expected = 2.0 * Normal::new(0.0, 1.0).unwrap().sf(z);
        assert_relative_eq!(r.p_value, expected, epsilon = 1e-12);
        assert!(r.p_value < 0.02);
    }

    #[test]
    fn test_all_tied() {
        let r = mann_whitney_u(&[1.0, 1.0, 1.0], &[1.0, 1.0]).unwrap();
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_empty_group() {
        let r = mann_whitney_u(&[], &[1.0, 2.0]).unwrap();
        assert!(r.p_value.is_nan());
        assert_eq!(r.method, MannWhitneyMethod::Undefined);
    }

    #[test]
    fn test_large_samples_asymptotic() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..20).map(|i| i as f64 + 0.5).collect();
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.method, MannWhitneyMethod::Asymptotic);
        assert!(r.p_value > 0.5 && r.p_value <= 1.0);
    }
}
