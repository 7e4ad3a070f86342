//! Decision trees and gradient boosting
//!
//! The regressor used for both the per-property demand model and the
//! city-level market-demand model: an ensemble of variance-reduction
//! trees fit to residuals under a squared-error objective, with seeded
//! row subsampling and per-tree column sampling.
//!
//! Trees serialize with both serde (JSON artifact format) and rkyv
//! (binary fallback format); the sidecar decides which one is in use.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;
use crate::{MlError, MlResult};

/// A decision tree node
#[derive(Debug, Clone, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
enum TreeNode {
    /// Internal node with a split
    Split {
        feature_index: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// Leaf node with a prediction value
    Leaf { value: f32 },
}

/// A decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct DecisionTree {
    /// Tree nodes stored in a vector
    nodes: Vec<TreeNode>,
    /// Maximum depth of the tree
    max_depth: usize,
    /// Minimum samples required to split
    min_samples_split: usize,
}

impl DecisionTree {
    /// Create a new decision tree
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_depth,
            min_samples_split,
        }
    }

    /// Fit the tree on the full dataset, considering every feature
    pub fn fit(&mut self, x: &Matrix, y: &Matrix) -> MlResult<()> {
        let rows: Vec<usize> = (0..x.rows()).collect();
        let features: Vec<usize> = (0..x.cols()).collect();
        let mut gains = vec![0.0; x.cols()];
        self.fit_subset(x, y, &rows, &features, &mut gains)
    }

    /// Fit the tree on a row subset, restricted to a feature subset.
    ///
    /// `gains` accumulates the variance reduction achieved by each feature,
    /// weighted by the number of samples at the split; it must have one slot
    /// per column of `x`.
    pub fn fit_subset(
        &mut self,
        x: &Matrix,
        y: &Matrix,
        rows: &[usize],
        features: &[usize],
        gains: &mut [f32],
    ) -> MlResult<()> {
        if rows.is_empty() {
            return Err(MlError::TrainingFailed("no rows to fit".into()));
        }
        if gains.len() != x.cols() {
            return Err(MlError::DimensionMismatch {
                expected: (1, x.cols()),
                actual: (1, gains.len()),
            });
        }

        self.nodes.clear();
        self.build_tree(x, y, rows, features, 0, gains);
        Ok(())
    }

    /// Predict values for input data
    pub fn predict(&self, x: &Matrix) -> Matrix {
        let mut predictions = Matrix::zeros(x.rows(), 1);
        for i in 0..x.rows() {
            predictions.set(i, 0, self.predict_row(x.row(i)));
        }
        predictions
    }

    /// Predict a single sample
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        if self.nodes.is_empty() {
            return 0.0;
        }

        let mut node_idx = 0;

        loop {
            match &self.nodes[node_idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if features[*feature_index] <= *threshold {
                        node_idx = *left;
                    } else {
                        node_idx = *right;
                    }
                }
            }
        }
    }

    /// Build the tree recursively
    fn build_tree(
        &mut self,
        x: &Matrix,
        y: &Matrix,
        indices: &[usize],
        features: &[usize],
        depth: usize,
        gains: &mut [f32],
    ) -> usize {
        let node_idx = self.nodes.len();

        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || Self::is_pure(y, indices)
        {
            let value = Self::subset_mean(y, indices);
            self.nodes.push(TreeNode::Leaf { value });
            return node_idx;
        }

        if let Some(split) = self.find_best_split(x, y, indices, features) {
            gains[split.feature_index] += split.gain * indices.len() as f32;

            // Placeholder until both subtrees are built
            self.nodes.push(TreeNode::Leaf { value: 0.0 });

            let left_idx = self.build_tree(x, y, &split.left_rows, features, depth + 1, gains);
            let right_idx = self.build_tree(x, y, &split.right_rows, features, depth + 1, gains);

            self.nodes[node_idx] = TreeNode::Split {
                feature_index: split.feature_index,
                threshold: split.threshold,
                left: left_idx,
                right: right_idx,
            };

            node_idx
        } else {
            let value = Self::subset_mean(y, indices);
            self.nodes.push(TreeNode::Leaf { value });
            node_idx
        }
    }

    /// Find the split with the highest variance reduction
    fn find_best_split(
        &self,
        x: &Matrix,
        y: &Matrix,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        let parent_var = Self::subset_variance(y, indices);

        for &feature_idx in features {
            let mut values: Vec<f32> = indices.iter().map(|&i| x.get(i, feature_idx)).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            // Candidate thresholds are midpoints between consecutive values
            for w in values.windows(2) {
                let threshold = (w[0] + w[1]) / 2.0;

                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&idx| x.get(idx, feature_idx) <= threshold);

                if left_rows.is_empty() || right_rows.is_empty() {
                    continue;
                }

                let left_var = Self::subset_variance(y, &left_rows);
                let right_var = Self::subset_variance(y, &right_rows);

                let left_weight = left_rows.len() as f32 / indices.len() as f32;
                let right_weight = right_rows.len() as f32 / indices.len() as f32;

                let gain = parent_var - (left_weight * left_var + right_weight * right_var);

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_index: feature_idx,
                        threshold,
                        gain,
                        left_rows,
                        right_rows,
                    });
                }
            }
        }

        best
    }

    fn subset_mean(y: &Matrix, indices: &[usize]) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        let sum: f32 = indices.iter().map(|&i| y.get(i, 0)).sum();
        sum / indices.len() as f32
    }

    fn subset_variance(y: &Matrix, indices: &[usize]) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        let mean = Self::subset_mean(y, indices);
        let sum_sq: f32 = indices.iter().map(|&i| (y.get(i, 0) - mean).powi(2)).sum();
        sum_sq / indices.len() as f32
    }

    fn is_pure(y: &Matrix, indices: &[usize]) -> bool {
        if indices.is_empty() {
            return true;
        }
        let first = y.get(indices[0], 0);
        indices.iter().all(|&i| (y.get(i, 0) - first).abs() < 1e-8)
    }

    /// Get the number of nodes in the tree
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Outcome of a split search
struct SplitCandidate {
    feature_index: usize,
    threshold: f32,
    gain: f32,
    left_rows: Vec<usize>,
    right_rows: Vec<usize>,
}

/// Hyperparameters for [`GradientBoostingRegressor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct BoostingParams {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f32,
    /// Maximum depth per tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Fraction of rows sampled (without replacement) per tree
    pub subsample: f32,
    /// Fraction of columns sampled per tree
    pub colsample: f32,
    /// RNG seed for sampling
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 6,
            min_samples_split: 2,
            subsample: 0.9,
            colsample: 0.9,
            seed: 42,
        }
    }
}

impl BoostingParams {
    fn validate(&self) -> MlResult<()> {
        if self.n_estimators == 0 {
            return Err(MlError::InvalidParameter("n_estimators must be > 0".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(MlError::InvalidParameter("learning_rate must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.subsample) || self.subsample == 0.0 {
            return Err(MlError::InvalidParameter("subsample must be in (0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.colsample) || self.colsample == 0.0 {
            return Err(MlError::InvalidParameter("colsample must be in (0, 1]".into()));
        }
        Ok(())
    }
}

/// Gradient Boosting Regressor with a squared-error objective
#[derive(Debug, Clone, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct GradientBoostingRegressor {
    /// Ensemble of trees
    trees: Vec<DecisionTree>,
    /// Hyperparameters
    params: BoostingParams,
    /// Initial prediction (mean of training targets)
    initial_prediction: f32,
    /// Accumulated split gain per feature, filled during fit
    feature_gains: Vec<f32>,
}

impl GradientBoostingRegressor {
    /// Create a new regressor with the given hyperparameters
    pub fn new(params: BoostingParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
            initial_prediction: 0.0,
            feature_gains: Vec::new(),
        }
    }

    /// The hyperparameters this regressor was configured with
    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Fit the ensemble to training data.
    ///
    /// Residuals are recomputed over the full training set each round; the
    /// tree itself is fit on a sampled subset of rows and columns.
    pub fn fit(&mut self, x: &Matrix, y: &Matrix) -> MlResult<()> {
        self.params.validate()?;
        if x.rows() == 0 || x.cols() == 0 {
            return Err(MlError::TrainingFailed("empty feature matrix".into()));
        }
        if y.rows() != x.rows() {
            return Err(MlError::DimensionMismatch {
                expected: (x.rows(), 1),
                actual: y.shape(),
            });
        }

        self.trees.clear();
        self.feature_gains = vec![0.0; x.cols()];
        self.initial_prediction = y.mean();

        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let mut predictions = Matrix::zeros(y.rows(), 1);
        for i in 0..y.rows() {
            predictions.set(i, 0, self.initial_prediction);
        }

        for _ in 0..self.params.n_estimators {
            // Negative gradient of the squared-error loss
            let residuals = y.sub(&predictions)?;

            let rows = sample_fraction(&mut rng, x.rows(), self.params.subsample);
            let features = sample_fraction(&mut rng, x.cols(), self.params.colsample);

            let mut tree = DecisionTree::new(self.params.max_depth, self.params.min_samples_split);
            tree.fit_subset(x, &residuals, &rows, &features, &mut self.feature_gains)?;

            for i in 0..y.rows() {
                let update = self.params.learning_rate * tree.predict_row(x.row(i));
                predictions.set(i, 0, predictions.get(i, 0) + update);
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    /// Predict values for input data
    pub fn predict(&self, x: &Matrix) -> Matrix {
        let mut predictions = Matrix::zeros(x.rows(), 1);
        for i in 0..x.rows() {
            predictions.set(i, 0, self.predict_row(x.row(i)));
        }
        predictions
    }

    /// Predict a single sample
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut prediction = self.initial_prediction;
        for tree in &self.trees {
            prediction += self.params.learning_rate * tree.predict_row(features);
        }
        prediction
    }

    /// Get the number of trees
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Per-feature importance: accumulated split gain normalized to sum 1.
    ///
    /// All zeros if the ensemble never found a useful split.
    pub fn feature_importance(&self) -> Vec<f64> {
        let total: f32 = self.feature_gains.iter().filter(|g| **g > 0.0).sum();
        if total <= 0.0 {
            return vec![0.0; self.feature_gains.len()];
        }
        self.feature_gains
            .iter()
            .map(|g| (g.max(0.0) / total) as f64)
            .collect()
    }
}

/// Sample `fraction` of `0..n` without replacement, sorted, at least one.
fn sample_fraction(rng: &mut StdRng, n: usize, fraction: f32) -> Vec<usize> {
    if fraction >= 1.0 || n <= 1 {
        return (0..n).collect();
    }
    let k = ((n as f32 * fraction).round() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> (Matrix, Matrix) {
        let x = Matrix::from_rows((1..=20).map(|i| vec![i as f32]).collect());
        let y = Matrix::column(&(1..=20).map(|i| (i * 2) as f32).collect::<Vec<_>>());
        (x, y)
    }

    #[test]
    fn test_decision_tree_fits_ramp() {
        let (x, y) = ramp();
        let mut tree = DecisionTree::new(4, 2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.num_nodes() > 1);
        let predictions = tree.predict(&x);
        assert_eq!(predictions.rows(), 20);
    }

    #[test]
    fn test_gradient_boosting_accuracy() {
        let (x, y) = ramp();
        let params = BoostingParams {
            n_estimators: 50,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            colsample: 1.0,
            ..BoostingParams::default()
        };
        let mut gbr = GradientBoostingRegressor::new(params);
        gbr.fit(&x, &y).unwrap();

        assert_eq!(gbr.num_trees(), 50);
        for i in 0..x.rows() {
            let pred = gbr.predict_row(x.row(i));
            let actual = y.get(i, 0);
            assert!(
                (pred - actual).abs() < 3.0,
                "row {}: predicted {}, actual {}",
                i,
                pred,
                actual
            );
        }
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = ramp();
        let mut a = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 20,
            ..BoostingParams::default()
        });
        let mut b = a.clone();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        for i in 0..x.rows() {
            assert_eq!(a.predict_row(x.row(i)), b.predict_row(x.row(i)));
        }
    }

    #[test]
    fn test_fit_rejects_empty() {
        let mut gbr = GradientBoostingRegressor::new(BoostingParams::default());
        let x = Matrix::zeros(0, 0);
        let y = Matrix::zeros(0, 1);
        assert!(gbr.fit(&x, &y).is_err());
    }

    #[test]
    fn test_feature_importance_prefers_signal() {
        // Column 0 carries the target, column 1 is constant noise
        let x = Matrix::from_rows((1..=30).map(|i| vec![i as f32, 7.0]).collect());
        let y = Matrix::column(&(1..=30).map(|i| (i * 3) as f32).collect::<Vec<_>>());

        let mut gbr = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 20,
            subsample: 1.0,
            colsample: 1.0,
            ..BoostingParams::default()
        });
        gbr.fit(&x, &y).unwrap();

        let importance = gbr.feature_importance();
        assert_eq!(importance.len(), 2);
        assert!(importance[0] > 0.9);
        assert!(importance[1] < 0.1);
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_roundtrip() {
        let (x, y) = ramp();
        let mut gbr = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 10,
            ..BoostingParams::default()
        });
        gbr.fit(&x, &y).unwrap();

        let json = serde_json::to_vec(&gbr).unwrap();
        let restored: GradientBoostingRegressor = serde_json::from_slice(&json).unwrap();

        for i in 0..x.rows() {
            assert_eq!(gbr.predict_row(x.row(i)), restored.predict_row(x.row(i)));
        }
    }

    #[test]
    fn test_rkyv_roundtrip() {
        let (x, y) = ramp();
        let mut gbr = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 5,
            ..BoostingParams::default()
        });
        gbr.fit(&x, &y).unwrap();

        let bytes = rkyv::to_bytes::<_, 4096>(&gbr).unwrap();
        let archived = rkyv::check_archived_root::<GradientBoostingRegressor>(&bytes).unwrap();
        let restored: GradientBoostingRegressor =
            RkyvDeserialize::deserialize(archived, &mut rkyv::Infallible).unwrap();

        for i in 0..x.rows() {
            assert_eq!(gbr.predict_row(x.row(i)), restored.predict_row(x.row(i)));
        }
    }

    #[test]
    fn test_sample_fraction_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = sample_fraction(&mut rng, 100, 0.9);
        assert_eq!(sampled.len(), 90);
        assert!(sampled.windows(2).all(|w| w[0] < w[1]));
        assert!(sampled.iter().all(|&i| i < 100));

        assert_eq!(sample_fraction(&mut rng, 5, 1.0).len(), 5);
        assert_eq!(sample_fraction(&mut rng, 3, 0.01).len(), 1);
    }
}
