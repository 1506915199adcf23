//! Error types shared by the standardizer, the PCA engine, the pipeline and its collaborators.
//!
//! Nothing in this crate catches or retries these errors. They propagate unchanged
//! to the caller, which decides how to report them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while fitting, transforming, or persisting models and datasets.
#[derive(Error, Debug)]
pub enum PcaError {
    /// Data handed to a fitted model has the wrong number of columns.
    #[error("Dimension mismatch in {context}: expected {expected} columns, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// Requested rank is outside `[1, n_features]`.
    #[error("Invalid rank {requested}: must be between 1 and the number of features ({n_features})")]
    InvalidRank { requested: usize, n_features: usize },

    /// Run settings that no dataset could satisfy.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A column has zero variance relative to its magnitude and cannot be standardized.
    #[error("Column '{column}' has zero variance (standard deviation {std_dev:e}); it cannot be standardized")]
    DegenerateColumn { column: String, std_dev: f64 },

    /// Too few rows to estimate a covariance.
    #[error("Insufficient samples: need at least {required} rows, found {found}")]
    InsufficientSamples { required: usize, found: usize },

    /// Input has zero rows or zero columns.
    #[error("Input data has zero rows or zero columns")]
    EmptyInput,

    /// A value is NaN or infinite.
    #[error("Non-finite value at row {row}, column {column}")]
    NonFiniteValue { row: usize, column: usize },

    /// Labels and values of a dataset disagree.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// The eigendecomposition backend failed.
    #[error("Eigen decomposition failed: {0}")]
    Decomposition(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path:?} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Model (de)serialization failed or a loaded model is inconsistent.
    #[error("Model serialization error: {0}")]
    Serialization(String),
}

impl PcaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PcaError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PcaError>;
