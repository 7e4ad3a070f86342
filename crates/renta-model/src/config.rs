//! Model hyperparameter configuration

use serde::{Deserialize, Serialize};

use renta_ml::BoostingParams;

/// Fraction of the (date-sorted) frame held out for validation.
pub const VALIDATION_RATIO: f64 = 0.2;

/// Hyperparameters for the demand and market-demand regressors.
///
/// Shared by both models; the sidecar persists the exact configuration a
/// given artifact was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage per round
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Row fraction sampled per tree
    pub subsample: f64,
    /// Column fraction sampled per tree
    pub colsample_bytree: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 6,
            subsample: 0.9,
            colsample_bytree: 0.9,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of boosting rounds
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set the maximum tree depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the learning rate
    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Translate to the ensemble-level parameters
    pub fn boosting_params(&self) -> BoostingParams {
        BoostingParams {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate as f32,
            max_depth: self.max_depth,
            min_samples_split: 2,
            subsample: self.subsample as f32,
            colsample: self.colsample_bytree as f32,
            seed: self.seed,
        }
    }
}
