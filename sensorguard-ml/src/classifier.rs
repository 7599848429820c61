//! Gradient-boosted binary classifier.
//!
//! Log-loss boosting: each round fits a regression tree to the residuals
//! `y - sigmoid(log_odds)` and adds `learning_rate * tree(x)` to the log-odds.
//! Every round sees all rows and all features, so fitting is deterministic.

use crate::error::PipelineError;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A binary classifier over numeric features with labels in {0, 1}.
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), PipelineError>;

    /// Predicted labels, 0.0 or 1.0.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError>;
}

// ---------------------------------------------------------------------------
// Regression tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Least-squares regression tree, leaves hold the mean target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub max_depth: usize,
    pub min_samples_split: usize,
    root: Option<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: 2,
            root: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), PipelineError> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PipelineError::training(format!(
                "cannot fit tree on {} rows with {} targets",
                x.nrows(),
                y.len()
            )));
        }
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build(x, y, &rows, 0));
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PipelineError::prediction("tree is not fitted"))?;
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    fn build(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize], depth: usize) -> TreeNode {
        let mean = rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64;
        if depth >= self.max_depth || rows.len() < self.min_samples_split {
            return TreeNode::Leaf { value: mean };
        }
        let Some(split) = Self::best_split(x, y, rows) else {
            return TreeNode::Leaf { value: mean };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);
        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(x, y, &left, depth + 1)),
            right: Box::new(self.build(x, y, &right, depth + 1)),
        }
    }

    /// Split with the largest reduction in squared error. Features are
    /// scanned in order and only a strictly better gain replaces the
    /// current best.
    fn best_split(x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Option<BestSplit> {
        let n = rows.len() as f64;
        let total: f64 = rows.iter().map(|&i| y[i]).sum();
        let base = total * total / n;
        let mut best: Option<BestSplit> = None;

        let mut order: Vec<usize> = rows.to_vec();
        for feature in 0..x.ncols() {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
            let mut left_sum = 0.0;
            for k in 0..order.len() - 1 {
                left_sum += y[order[k]];
                let here = x[[order[k], feature]];
                let next = x[[order[k + 1], feature]];
                if here == next {
                    continue;
                }
                let n_left = (k + 1) as f64;
                let n_right = n - n_left;
                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / n_left + right_sum * right_sum / n_right - base;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Gradient boosting
// ---------------------------------------------------------------------------

/// Boosting hyperparameters searched by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub params: BoostingParams,
    initial_log_odds: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoostingClassifier {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            initial_log_odds: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        if !self.is_fitted() {
            return Err(PipelineError::prediction("classifier is not fitted"));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::prediction(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            let update = tree.predict(x)?;
            log_odds.scaled_add(self.params.learning_rate, &update);
        }
        Ok(log_odds.mapv(sigmoid))
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), PipelineError> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(PipelineError::training("cannot fit classifier on empty data"));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::training(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        self.trees.clear();

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for _ in 0..self.params.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, lo)| yi - sigmoid(*lo))
                .collect();
            let mut tree = RegressionTree::new(self.params.max_depth);
            tree.fit(x, &residuals)?;
            let update = tree.predict(x)?;
            log_odds.scaled_add(self.params.learning_rate, &update);
            self.trees.push(tree);
        }
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}
