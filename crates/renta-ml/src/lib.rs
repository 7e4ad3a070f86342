//! RentaML - tree-ensemble regression for the RENTA pricing core
//!
//! A small pure-Rust ML library sized for per-property demand models:
//! a few hundred rows of tabular history, a handful of numeric features,
//! millisecond-scale single-row prediction.
//!
//! # Components
//!
//! - `matrix` - Dense f32 matrices, row-major
//! - `tree` - Decision trees and gradient boosting with row/column sampling
//! - `metrics` - RMSE / MAE

#![warn(missing_docs)]

pub mod matrix;
pub mod metrics;
pub mod tree;

pub use matrix::Matrix;
pub use tree::{BoostingParams, DecisionTree, GradientBoostingRegressor};

/// Machine learning error types
#[derive(Debug)]
pub enum MlError {
    /// Matrix dimension mismatch
    DimensionMismatch {
        /// Expected dimensions
        expected: (usize, usize),
        /// Actual dimensions
        actual: (usize, usize),
    },
    /// Invalid parameter
    InvalidParameter(String),
    /// Training failed
    TrainingFailed(String),
}

impl std::fmt::Display for MlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MlError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Dimension mismatch: expected {:?}, got {:?}",
                    expected, actual
                )
            }
            MlError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            MlError::TrainingFailed(msg) => write!(f, "Training failed: {}", msg),
        }
    }
}

impl std::error::Error for MlError {}

/// Result type for ML operations
pub type MlResult<T> = Result<T, MlError>;
