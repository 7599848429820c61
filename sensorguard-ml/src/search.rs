//! Hyperparameter search for the boosting classifier.
//!
//! [`GridSearch`] scores every combination of the grid with stratified
//! k-fold cross-validation and keeps the one with the best mean F1.

use crate::classifier::{BoostingParams, Classifier, GradientBoostingClassifier};
use crate::error::PipelineError;
use crate::metrics::{ClassificationMetric, CrossValidationResult};
use ndarray::{Array1, Array2, Axis};
use sensorguard_core::config::ParamGridConfig;
use serde::{Deserialize, Serialize};

/// One evaluated combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTrial {
    pub params: BoostingParams,
    pub cv: CrossValidationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best_params: BoostingParams,
    pub best_score: f64,
    pub trials: Vec<SearchTrial>,
}

/// Picks hyperparameters for the classifier from training data.
pub trait HyperparameterSearch {
    fn search(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome, PipelineError>;
}

/// Candidate values per hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
}

impl From<&ParamGridConfig> for ParamGrid {
    fn from(cfg: &ParamGridConfig) -> Self {
        Self {
            n_estimators: cfg.n_estimators.clone(),
            max_depth: cfg.max_depth.clone(),
            learning_rate: cfg.learning_rate.clone(),
        }
    }
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self::from(&ParamGridConfig::default())
    }
}

impl ParamGrid {
    /// All combinations. Parameter names are iterated alphabetically with the
    /// last one varying fastest.
    pub fn combinations(&self) -> Vec<BoostingParams> {
        let mut out = Vec::with_capacity(
            self.learning_rate.len() * self.max_depth.len() * self.n_estimators.len(),
        );
        for &learning_rate in &self.learning_rate {
            for &max_depth in &self.max_depth {
                for &n_estimators in &self.n_estimators {
                    out.push(BoostingParams {
                        n_estimators,
                        max_depth,
                        learning_rate,
                    });
                }
            }
        }
        out
    }
}

/// Assign every row to a fold so each class is spread evenly: the i-th row
/// of a class goes to fold `i % k`.
pub fn stratified_folds(y: &Array1<f64>, k: usize) -> Vec<usize> {
    let (mut seen_pos, mut seen_neg) = (0usize, 0usize);
    y.iter()
        .map(|label| {
            let counter = if *label >= 0.5 { &mut seen_pos } else { &mut seen_neg };
            let fold = *counter % k;
            *counter += 1;
            fold
        })
        .collect()
}

/// Exhaustive search with stratified k-fold cross-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearch {
    pub grid: ParamGrid,
    pub folds: usize,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize) -> Self {
        Self { grid, folds }
    }

    fn cross_validate(
        &self,
        params: BoostingParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
        assignment: &[usize],
    ) -> Result<CrossValidationResult, PipelineError> {
        let mut scores = Vec::with_capacity(self.folds);
        for fold in 0..self.folds {
            let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] == fold);
            if test_idx.is_empty() || train_idx.is_empty() {
                continue;
            }
            let mut model = GradientBoostingClassifier::new(params);
            model.fit(&x.select(Axis(0), &train_idx), &y.select(Axis(0), &train_idx))?;
            let pred = model.predict(&x.select(Axis(0), &test_idx))?;
            let truth = y.select(Axis(0), &test_idx);
            scores.push(ClassificationMetric::compute(&truth, &pred).f1_score);
        }
        Ok(CrossValidationResult::from_scores(scores))
    }
}

impl HyperparameterSearch for GridSearch {
    fn search(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome, PipelineError> {
        if self.folds < 2 {
            return Err(PipelineError::training("cross-validation needs at least 2 folds"));
        }
        if y.len() < self.folds {
            return Err(PipelineError::training(format!(
                "{} rows cannot fill {} folds",
                y.len(),
                self.folds
            )));
        }
        let combinations = self.grid.combinations();
        if combinations.is_empty() {
            return Err(PipelineError::training("parameter grid is empty"));
        }

        let assignment = stratified_folds(y, self.folds);
        let mut trials = Vec::with_capacity(combinations.len());
        let mut best: Option<(BoostingParams, f64)> = None;
        for params in combinations {
            let cv = self.cross_validate(params, x, y, &assignment)?;
            tracing::debug!(
                n_estimators = params.n_estimators,
                max_depth = params.max_depth,
                learning_rate = params.learning_rate,
                mean_f1 = cv.mean_score,
                "Scored grid combination"
            );
            if best.is_none_or(|(_, score)| cv.mean_score > score) {
                best = Some((params, cv.mean_score));
            }
            trials.push(SearchTrial { params, cv });
        }

        let (best_params, best_score) =
            best.ok_or_else(|| PipelineError::training("grid search produced no trial"))?;
        tracing::info!(
            n_estimators = best_params.n_estimators,
            max_depth = best_params.max_depth,
            learning_rate = best_params.learning_rate,
            best_score,
            "Grid search finished"
        );
        Ok(SearchOutcome {
            best_params,
            best_score,
            trials,
        })
    }
}
