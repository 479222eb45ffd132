//! Two-group summaries: means, medians, effect size and prevalence.

use crate::data::Group;
use serde::{Deserialize, Serialize};

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0.0 below two values.
pub fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let ss: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Median; NaN for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Cohen's d of S relative to M with a pooled standard deviation.
///
/// NaN if either group is empty or there are no degrees of freedom left;
/// 0.0 if the pooled standard deviation is exactly zero.
pub fn cohens_d(m: &[f64], s: &[f64]) -> f64 {
    let (n_m, n_s) = (m.len(), s.len());
    if n_m == 0 || n_s == 0 || n_m + n_s <= 2 {
        return f64::NAN;
    }
    let sd_m = sample_sd(m);
    let sd_s = sample_sd(s);
    let pooled = (((n_m - 1) as f64 * sd_m * sd_m + (n_s - 1) as f64 * sd_s * sd_s)
        / (n_m + n_s - 2) as f64)
        .sqrt();
    if pooled == 0.0 {
        return 0.0;
    }
    (mean(s) - mean(m)) / pooled
}

/// Sample positions of each group within a sample ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIndices {
    /// Positions of group M samples.
    pub m: Vec<usize>,
    /// Positions of group S samples.
    pub s: Vec<usize>,
}

impl GroupIndices {
    /// Split sample positions by group label.
    pub fn from_groups(groups: &[Group]) -> Self {
        let mut m = Vec::new();
        let mut s = Vec::new();
        for (i, g) in groups.iter().enumerate() {
            match g {
                Group::M => m.push(i),
                Group::S => s.push(i),
            }
        }
        Self { m, s }
    }

    /// Samples in group M.
    pub fn n_m(&self) -> usize {
        self.m.len()
    }

    /// Samples in group S.
    pub fn n_s(&self) -> usize {
        self.s.len()
    }

    /// Samples in both groups.
    pub fn n_total(&self) -> usize {
        self.m.len() + self.s.len()
    }

    /// Values of each group, in sample order.
    pub fn split(&self, values: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (
            self.m.iter().map(|&i| values[i]).collect(),
            self.s.iter().map(|&i| values[i]).collect(),
        )
    }
}

/// Samples per group with a strictly positive value.
pub fn prevalence(values: &[f64], idx: &GroupIndices) -> (usize, usize) {
    let count = |positions: &[usize]| positions.iter().filter(|&&i| values[i] > 0.0).count();
    (count(&idx.m), count(&idx.s))
}

/// Group summaries for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupComparison {
    pub mean_m: f64,
    pub mean_s: f64,
    /// Observed statistic: mean_s - mean_m.
    pub diff_s_minus_m: f64,
    pub cohens_d: f64,
    pub prev_m: usize,
    pub prev_s: usize,
}

/// Compare groups on CLR values, with prevalence taken from the
/// untransformed relative abundances.
pub fn compare_groups(clr: &[f64], relative: &[f64], idx: &GroupIndices) -> GroupComparison {
    let (m, s) = idx.split(clr);
    let mean_m = mean(&m);
    let mean_s = mean(&s);
    let (prev_m, prev_s) = prevalence(relative, idx);
    GroupComparison {
        mean_m,
        mean_s,
        diff_s_minus_m: mean_s - mean_m,
        cohens_d: cohens_d(&m, &s),
        prev_m,
        prev_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_sd() {
        assert!(mean(&[]).is_nan());
        assert_relative_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
        assert_eq!(sample_sd(&[]), 0.0);
        assert_eq!(sample_sd(&[4.2]), 0.0);
        // var = ((1-3)^2 + (2-3)^2 + (6-3)^2) / 2 = 7
        assert_relative_eq!(sample_sd(&[1.0, 2.0, 6.0]), 7.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_median() {
        assert!(median(&[]).is_nan());
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_cohens_d() {
        // sd_m = sd_s = 1, pooled = 1
        assert_relative_eq!(cohens_d(&[1.0, 2.0, 3.0], &[3.0, 4.0, 5.0]), 2.0, epsilon = 1e-12);
        assert!(cohens_d(&[], &[1.0, 2.0]).is_nan());
        assert!(cohens_d(&[1.0], &[2.0]).is_nan());
        assert_eq!(cohens_d(&[1.0, 1.0], &[2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_group_indices() {
        let idx = GroupIndices::from_groups(&[Group::S, Group::M, Group::S, Group::M]);
        assert_eq!(idx.m, vec![1, 3]);
        assert_eq!(idx.s, vec![0, 2]);
        assert_eq!(idx.n_total(), 4);
        let (m, s) = idx.split(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(m, vec![20.0, 40.0]);
        assert_eq!(s, vec![10.0, 30.0]);
    }

    #[test]
    fn test_compare_groups() {
        let idx = GroupIndices::from_groups(&[Group::M, Group::M, Group::S, Group::S]);
        let relative = [0.5, 0.0, 0.2, 0.1];
        let clr = [1.0, -1.0, 0.5, -0.5];
        let cmp = compare_groups(&clr, &relative, &idx);

        assert_relative_eq!(cmp.mean_m, 0.0);
        assert_relative_eq!(cmp.mean_s, 0.0);
        assert_relative_eq!(cmp.diff_s_minus_m, 0.0);
        assert_eq!((cmp.prev_m, cmp.prev_s), (1, 2));
    }

    #[test]
    fn test_compare_empty_group() {
        let idx = GroupIndices::from_groups(&[Group::M, Group::M]);
        let cmp = compare_groups(&[0.1, -0.1], &[0.2, 0.3], &idx);
        assert!(cmp.mean_s.is_nan());
        assert!(cmp.diff_s_minus_m.is_nan());
        assert!(cmp.cohens_d.is_nan());
        assert_eq!(cmp.prev_s, 0);
    }
}
