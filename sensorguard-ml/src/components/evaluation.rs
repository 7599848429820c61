//! Champion/challenger evaluation.

use crate::artifact::{EvaluationArtifact, TrainerArtifact, ValidationArtifact};
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::estimator::{SensorModel, TargetValueMapping};
use crate::frame::DataFrame;
use crate::metrics::ClassificationMetric;
use crate::persist;
use crate::registry::ModelResolver;
use std::path::PathBuf;

/// Whether a challenger beats the champion by more than `threshold`.
/// Returns the decision and the F1 improvement.
pub fn decide(champion_f1: f64, challenger_f1: f64, threshold: f64) -> (bool, f64) {
    let improved = challenger_f1 - champion_f1;
    (improved > threshold, improved)
}

pub struct ModelEvaluation {
    report_path: PathBuf,
    resolver: ModelResolver,
    target_column: String,
    acceptance_threshold: f64,
}

impl ModelEvaluation {
    pub fn new(
        ctx: &RunContext,
        resolver: ModelResolver,
        target_column: impl Into<String>,
        acceptance_threshold: f64,
    ) -> Self {
        Self {
            report_path: ctx.evaluation_report_path(),
            resolver,
            target_column: target_column.into(),
            acceptance_threshold,
        }
    }

    pub fn evaluate(
        &self,
        validation: &ValidationArtifact,
        trainer: &TrainerArtifact,
    ) -> Result<EvaluationArtifact, PipelineError> {
        let artifact = if self.resolver.exists()? {
            self.compare(validation, trainer)?
        } else {
            tracing::info!("No champion in registry, accepting trained model");
            EvaluationArtifact {
                accepted: true,
                improved_score: 0.0,
                champion_path: None,
                challenger_path: trainer.model_bundle_path.clone(),
                challenger_metric: trainer.test_metric,
                champion_metric: None,
                report_path: self.report_path.clone(),
            }
        };
        persist::write_yaml(&self.report_path, &artifact)?;
        Ok(artifact)
    }

    fn compare(
        &self,
        validation: &ValidationArtifact,
        trainer: &TrainerArtifact,
    ) -> Result<EvaluationArtifact, PipelineError> {
        let (train_path, test_path) = validation.valid_paths().ok_or_else(|| {
            PipelineError::MissingData("evaluation needs validated train/test data".into())
        })?;
        let mut arena = DataFrame::read_csv(train_path)?.vstack(&DataFrame::read_csv(test_path)?)?;
        let labels = arena.remove_column(&self.target_column).ok_or_else(|| {
            PipelineError::schema(format!("target column '{}' missing", self.target_column))
        })?;
        let y_true = TargetValueMapping::encode_all(&labels)?;

        let champion_path = self.resolver.latest_version_path()?;
        let champion = SensorModel::load(&champion_path)?;
        let challenger = SensorModel::load(&trainer.model_bundle_path)?;

        let champion_metric = ClassificationMetric::compute(&y_true, &champion.predict(&arena)?);
        let challenger_metric = ClassificationMetric::compute(&y_true, &challenger.predict(&arena)?);
        let (accepted, improved_score) = decide(
            champion_metric.f1_score,
            challenger_metric.f1_score,
            self.acceptance_threshold,
        );
        tracing::info!(
            champion_f1 = champion_metric.f1_score,
            challenger_f1 = challenger_metric.f1_score,
            improved_score,
            accepted,
            arena_rows = arena.n_rows(),
            "Compared challenger with champion"
        );

        Ok(EvaluationArtifact {
            accepted,
            improved_score,
            champion_path: Some(champion_path),
            challenger_path: trainer.model_bundle_path.clone(),
            challenger_metric,
            champion_metric: Some(champion_metric),
            report_path: self.report_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{BoostingParams, Classifier, GradientBoostingClassifier};
    use crate::transform::{FeaturePipeline, Transformer};
    use chrono::{Local, TimeZone};
    use ndarray::{Array1, Array2};
    use std::path::Path;
    use tempfile::TempDir;

    const TRAIN: &str = "class,aa_000\nneg,1\nneg,2\nneg,3\npos,90\npos,91\npos,92\n";
    const TEST: &str = "class,aa_000\nneg,4\npos,93\n";

    fn ctx(dir: &TempDir) -> RunContext {
        RunContext::at(dir.path(), Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn validated(dir: &TempDir) -> ValidationArtifact {
        let layout = ctx(dir).validation_layout();
        std::fs::create_dir_all(layout.valid_train_path.parent().unwrap()).unwrap();
        std::fs::write(&layout.valid_train_path, TRAIN).unwrap();
        std::fs::write(&layout.valid_test_path, TEST).unwrap();
        ValidationArtifact {
            status: true,
            valid_train_path: Some(layout.valid_train_path),
            valid_test_path: Some(layout.valid_test_path),
            invalid_train_path: None,
            invalid_test_path: None,
            drift_report_path: layout.drift_report_path,
        }
    }

    fn save_model(path: &Path, invert: bool) {
        let x = Array2::from_shape_vec((6, 1), vec![1.0, 2.0, 3.0, 90.0, 91.0, 92.0]).unwrap();
        let y = Array1::from_shape_fn(6, |i| if (i >= 3) != invert { 1.0 } else { 0.0 });
        let (transform, xt) = FeaturePipeline::default().fit_transform(&x).unwrap();
        let mut classifier = GradientBoostingClassifier::new(BoostingParams {
            n_estimators: 5,
            max_depth: 1,
            learning_rate: 0.1,
        });
        classifier.fit(&xt, &y).unwrap();
        SensorModel::new(vec!["aa_000".into()], transform, classifier)
            .save(path)
            .unwrap();
    }

    fn trained(dir: &TempDir) -> TrainerArtifact {
        let path = ctx(dir).trainer_model_path();
        save_model(&path, false);
        let metric = ClassificationMetric {
            f1_score: 1.0,
            precision_score: 1.0,
            recall_score: 1.0,
        };
        TrainerArtifact {
            model_bundle_path: path,
            train_metric: metric,
            test_metric: metric,
        }
    }

    #[test]
    fn test_decide_threshold() {
        let (accepted, improved) = decide(0.80, 0.83, 0.02);
        assert!(accepted);
        assert!((improved - 0.03).abs() < 1e-9);
        let (accepted, _) = decide(0.80, 0.81, 0.02);
        assert!(!accepted);
    }

    #[test]
    fn test_empty_registry_accepts() {
        let dir = TempDir::new().unwrap();
        let resolver = ModelResolver::new(dir.path().join("saved_models"), "model.bin");
        let trainer = trained(&dir);
        let artifact = ModelEvaluation::new(&ctx(&dir), resolver, "class", 0.02)
            .evaluate(&validated(&dir), &trainer)
            .unwrap();

        assert!(artifact.accepted);
        assert_eq!(artifact.improved_score, 0.0);
        assert_eq!(artifact.champion_metric, None);
        assert_eq!(artifact.challenger_metric, trainer.test_metric);
        let saved: EvaluationArtifact = persist::read_yaml(&artifact.report_path).unwrap();
        assert_eq!(saved, artifact);
    }

    #[test]
    fn test_better_challenger_wins() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("saved_models");
        save_model(&registry.join("1").join("model.bin"), true);
        let resolver = ModelResolver::new(&registry, "model.bin");

        let artifact = ModelEvaluation::new(&ctx(&dir), resolver, "class", 0.02)
            .evaluate(&validated(&dir), &trained(&dir))
            .unwrap();
        assert!(artifact.accepted);
        assert_eq!(artifact.challenger_metric.f1_score, 1.0);
        assert_eq!(artifact.champion_metric.unwrap().f1_score, 0.0);
        assert_eq!(artifact.champion_path, Some(registry.join("1").join("model.bin")));
    }

    #[test]
    fn test_equal_challenger_is_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("saved_models");
        save_model(&registry.join("3").join("model.bin"), false);
        let resolver = ModelResolver::new(&registry, "model.bin");

        let artifact = ModelEvaluation::new(&ctx(&dir), resolver, "class", 0.02)
            .evaluate(&validated(&dir), &trained(&dir))
            .unwrap();
        assert!(!artifact.accepted);
        assert_eq!(artifact.improved_score, 0.0);
        assert!(artifact.report_path.exists());
    }
}
