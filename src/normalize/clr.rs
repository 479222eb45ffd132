//! Centered Log-Ratio (CLR) transformation across samples.

use crate::error::{DaaError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Pseudocount added to relative abundances before taking logs.
pub const DEFAULT_PSEUDOCOUNT: f64 = 1e-9;

/// A transformed matrix with metadata about the transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformedMatrix {
    /// The transformed data (features × samples).
    #[serde(skip)]
    pub data: DMatrix<f64>,
    /// Feature identifiers.
    pub feature_ids: Vec<String>,
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
    /// Name of the transformation applied.
    pub transformation: String,
    /// Mean log value per feature (the centering term).
    pub log_means: Vec<f64>,
}

impl TransformedMatrix {
    /// Get the transformed value for a feature and sample.
    pub fn get(&self, feature: usize, sample: usize) -> f64 {
        self.data[(feature, sample)]
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row (feature) as a vector.
    pub fn row(&self, feature: usize) -> Vec<f64> {
        self.data.row(feature).iter().cloned().collect()
    }

    /// Get reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }
}

/// CLR of one feature's values across samples.
///
/// `clr_i = ln(x_i + ε) - mean_j ln(x_j + ε)`. The result sums to zero over
/// the samples given, so the sample set must be the one the feature is
/// tested on.
pub fn clr_values(values: &[f64], pseudocount: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let logs: Vec<f64> = values.iter().map(|&v| (v + pseudocount).ln()).collect();
    let mean_log = logs.iter().sum::<f64>() / logs.len() as f64;
    logs.into_iter().map(|l| l - mean_log).collect()
}

/// Apply the CLR transform to every feature (row) of a proportion matrix.
///
/// Each row is centered on its own mean log over all samples of the
/// matrix, both groups together.
///
/// # Arguments
/// * `data` - Non-negative values (features × samples), zeros allowed
/// * `feature_ids` - Feature identifiers
/// * `sample_ids` - Sample identifiers
/// * `pseudocount` - Strictly positive constant added before the log
pub fn norm_clr(
    data: &DMatrix<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
    pseudocount: f64,
) -> Result<TransformedMatrix> {
    let (n_features, n_samples) = data.shape();

    if n_features == 0 || n_samples == 0 {
        return Err(DaaError::EmptyData(
            "Cannot apply CLR to empty matrix".to_string(),
        ));
    }
    if !(pseudocount > 0.0 && pseudocount.is_finite()) {
        return Err(DaaError::InvalidParameter(format!(
            "Pseudocount must be positive and finite, got {}",
            pseudocount
        )));
    }
    if feature_ids.len() != n_features {
        return Err(DaaError::DimensionMismatch {
            expected: n_features,
            actual: feature_ids.len(),
        });
    }
    if sample_ids.len() != n_samples {
        return Err(DaaError::DimensionMismatch {
            expected: n_samples,
            actual: sample_ids.len(),
        });
    }

    for i in 0..n_features {
        for j in 0..n_samples {
            let val = data[(i, j)];
            if !(val >= 0.0) || !val.is_finite() {
                return Err(DaaError::Numerical(format!(
                    "CLR requires non-negative finite values; found {} at ({}, {})",
                    val, i, j
                )));
            }
        }
    }

    let rows: Vec<Vec<f64>> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            let values: Vec<f64> = data.row(i).iter().cloned().collect();
            clr_values(&values, pseudocount)
        })
        .collect();

    let log_means: Vec<f64> = (0..n_features)
        .map(|i| (data[(i, 0)] + pseudocount).ln() - rows[i][0])
        .collect();

    let clr_data = DMatrix::from_fn(n_features, n_samples, |i, j| rows[i][j]);

    Ok(TransformedMatrix {
        data: clr_data,
        feature_ids,
        sample_ids,
        transformation: format!("CLR (pseudocount={})", pseudocount),
        log_means,
    })
}
