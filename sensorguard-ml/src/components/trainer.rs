//! Model training with hyperparameter search and quality guards.

use crate::artifact::{PreprocessingArtifact, TrainerArtifact};
use crate::classifier::{Classifier, GradientBoostingClassifier};
use crate::components::preprocessing::split_label;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::estimator::SensorModel;
use crate::metrics::ClassificationMetric;
use crate::persist;
use crate::search::{GridSearch, HyperparameterSearch, ParamGrid};
use crate::transform::FeatureTransform;
use std::path::PathBuf;

/// Minimum quality a trained model must show before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    /// Largest tolerated |train F1 - test F1|.
    pub overfitting_threshold: f64,
    /// Smallest acceptable test F1. `0.0` leaves the decision to evaluation.
    pub expected_score: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            overfitting_threshold: 0.05,
            expected_score: 0.0,
        }
    }
}

impl QualityThresholds {
    pub fn check(
        &self,
        train: &ClassificationMetric,
        test: &ClassificationMetric,
    ) -> Result<(), PipelineError> {
        let gap = (train.f1_score - test.f1_score).abs();
        if gap > self.overfitting_threshold {
            return Err(PipelineError::model_quality(format!(
                "train/test F1 gap {gap:.4} exceeds {}",
                self.overfitting_threshold
            )));
        }
        if test.f1_score < self.expected_score {
            return Err(PipelineError::model_quality(format!(
                "test F1 {:.4} is below the expected {}",
                test.f1_score, self.expected_score
            )));
        }
        Ok(())
    }
}

pub struct ModelTrainer {
    model_path: PathBuf,
    thresholds: QualityThresholds,
    search: Box<dyn HyperparameterSearch>,
}

impl ModelTrainer {
    /// Trainer using grid search with stratified k-fold cross-validation.
    pub fn new(ctx: &RunContext, thresholds: QualityThresholds, grid: ParamGrid, cv_folds: usize) -> Self {
        Self::with_search(ctx, thresholds, Box::new(GridSearch::new(grid, cv_folds)))
    }

    pub fn with_search(
        ctx: &RunContext,
        thresholds: QualityThresholds,
        search: Box<dyn HyperparameterSearch>,
    ) -> Self {
        Self {
            model_path: ctx.trainer_model_path(),
            thresholds,
            search,
        }
    }

    pub fn train(&self, input: &PreprocessingArtifact) -> Result<TrainerArtifact, PipelineError> {
        let (x_train, y_train) = split_label(&persist::load_array(&input.train_array_path)?)?;
        let (x_test, y_test) = split_label(&persist::load_array(&input.test_array_path)?)?;
        tracing::debug!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = x_train.ncols(),
            "Loaded training arrays"
        );

        let outcome = self.search.search(&x_train, &y_train)?;
        let mut classifier = GradientBoostingClassifier::new(outcome.best_params);
        classifier.fit(&x_train, &y_train)?;

        let train_metric = ClassificationMetric::compute(&y_train, &classifier.predict(&x_train)?);
        let test_metric = ClassificationMetric::compute(&y_test, &classifier.predict(&x_test)?);
        tracing::info!(
            train_f1 = train_metric.f1_score,
            test_f1 = test_metric.f1_score,
            "Trained classifier"
        );

        if let Err(e) = self.thresholds.check(&train_metric, &test_metric) {
            tracing::warn!(error = %e, "Trained model rejected");
            return Err(e);
        }

        let transform: FeatureTransform = persist::load_object(&input.transform_path)?;
        let model = SensorModel::new(input.feature_names.clone(), transform, classifier);
        model.save(&self.model_path)?;
        tracing::info!(path = %self.model_path.display(), "Saved model bundle");

        Ok(TrainerArtifact {
            model_bundle_path: self.model_path.clone(),
            train_metric,
            test_metric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::preprocessing::with_label;
    use crate::transform::{FeaturePipeline, Transformer};
    use chrono::{Local, TimeZone};
    use ndarray::{Array1, Array2};
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> RunContext {
        RunContext::at(dir.path(), Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn separable(n: usize, invert: bool) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| if i < n / 2 { -1.0 } else { 1.0 });
        let y = Array1::from_shape_fn(n, |i| {
            let positive = (i >= n / 2) != invert;
            if positive { 1.0 } else { 0.0 }
        });
        (x, y)
    }

    fn prepared(dir: &TempDir, invert_test: bool) -> PreprocessingArtifact {
        let layout = ctx(dir).preprocessing_layout();
        let (x_train, y_train) = separable(20, false);
        let (x_test, y_test) = separable(10, invert_test);
        persist::save_array(&layout.train_array_path, &with_label(&x_train, &y_train).unwrap()).unwrap();
        persist::save_array(&layout.test_array_path, &with_label(&x_test, &y_test).unwrap()).unwrap();
        let transform = FeaturePipeline::default().fit(&x_train).unwrap();
        persist::save_object(&layout.transform_path, &transform).unwrap();
        PreprocessingArtifact {
            feature_names: vec!["aa_000".into()],
            transform_path: layout.transform_path,
            train_array_path: layout.train_array_path,
            test_array_path: layout.test_array_path,
        }
    }

    fn trainer(dir: &TempDir, thresholds: QualityThresholds) -> ModelTrainer {
        let grid = ParamGrid {
            n_estimators: vec![5],
            max_depth: vec![1, 2],
            learning_rate: vec![0.1],
        };
        ModelTrainer::new(&ctx(dir), thresholds, grid, 2)
    }

    #[test]
    fn test_train_persists_bundle() {
        let dir = TempDir::new().unwrap();
        let artifact = trainer(&dir, QualityThresholds::default())
            .train(&prepared(&dir, false))
            .unwrap();

        assert_eq!(artifact.train_metric.f1_score, 1.0);
        assert_eq!(artifact.test_metric.f1_score, 1.0);
        let model = SensorModel::load(&artifact.model_bundle_path).unwrap();
        assert_eq!(model.feature_names, vec!["aa_000"]);
        assert!(model.classifier.is_fitted());
    }

    #[test]
    fn test_overfit_model_is_rejected_and_not_saved() {
        let dir = TempDir::new().unwrap();
        let result = trainer(&dir, QualityThresholds::default()).train(&prepared(&dir, true));
        assert!(matches!(result, Err(PipelineError::ModelQuality(_))));
        assert!(!ctx(&dir).trainer_model_path().exists());
    }

    #[test]
    fn test_low_test_score_is_rejected() {
        let dir = TempDir::new().unwrap();
        let thresholds = QualityThresholds {
            overfitting_threshold: 2.0,
            expected_score: 0.6,
        };
        let result = trainer(&dir, thresholds).train(&prepared(&dir, true));
        assert!(matches!(result, Err(PipelineError::ModelQuality(_))));
        assert!(!ctx(&dir).trainer_model_path().exists());
    }

    #[test]
    fn test_threshold_boundaries() {
        let metric = |f1| ClassificationMetric {
            f1_score: f1,
            precision_score: f1,
            recall_score: f1,
        };
        let thresholds = QualityThresholds::default();
        assert!(thresholds.check(&metric(0.90), &metric(0.86)).is_ok());
        assert!(thresholds.check(&metric(0.95), &metric(0.80)).is_err());
        assert!(thresholds.check(&metric(0.55), &metric(0.55)).is_ok());
    }

    #[test]
    fn test_weak_but_stable_model_passes_default_guard() {
        let metric = |f1| ClassificationMetric {
            f1_score: f1,
            precision_score: f1,
            recall_score: f1,
        };
        assert!(QualityThresholds::default().check(&metric(0.50), &metric(0.50)).is_ok());

        let strict = QualityThresholds {
            expected_score: 0.6,
            ..QualityThresholds::default()
        };
        assert!(matches!(
            strict.check(&metric(0.50), &metric(0.50)),
            Err(PipelineError::ModelQuality(_))
        ));
    }
}
