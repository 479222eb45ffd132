//! Error types for the cohort-daa library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DaaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not read header from '{path}': {reason}")]
    HeaderParse { path: String, reason: String },

    #[error("Missing column '{column}' in {table}")]
    MissingColumn { column: String, table: String },

    #[error("Need both groups. Found M={n_m} S={n_s}")]
    MissingGroup { n_m: usize, n_s: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaaError {
    /// Whether this error means the run's inputs or settings are unusable.
    ///
    /// These abort a run outright; per-feature numerical trouble never
    /// surfaces as an error and degrades to NaN instead.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::HeaderParse { .. }
                | Self::MissingColumn { .. }
                | Self::MissingGroup { .. }
                | Self::EmptyData(_)
                | Self::InvalidParameter(_)
        )
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DaaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(DaaError::MissingGroup { n_m: 3, n_s: 0 }.is_configuration());
        assert!(DaaError::EmptyData("no samples".into()).is_configuration());
        assert!(DaaError::MissingColumn {
            column: "group".into(),
            table: "sample sheet".into()
        }
        .is_configuration());
        assert!(!DaaError::Numerical("overflow".into()).is_configuration());
    }

    #[test]
    fn test_missing_group_message() {
        let err = DaaError::MissingGroup { n_m: 4, n_s: 0 };
        assert_eq!(err.to_string(), "Need both groups. Found M=4 S=0");
    }
}
