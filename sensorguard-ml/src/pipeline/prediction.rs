//! Batch prediction with the current champion.

use crate::error::PipelineError;
use crate::estimator::{SensorModel, TargetValueMapping};
use crate::frame::DataFrame;
use crate::registry::ModelResolver;
use sensorguard_core::SensorGuardConfig;
use std::path::Path;

/// Column appended to scored frames.
pub const PREDICTION_COLUMN: &str = "prediction";

#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    resolver: ModelResolver,
    target_column: String,
}

impl PredictionPipeline {
    pub fn new(resolver: ModelResolver, target_column: impl Into<String>) -> Self {
        Self {
            resolver,
            target_column: target_column.into(),
        }
    }

    pub fn from_config(config: &SensorGuardConfig) -> Self {
        Self::new(
            ModelResolver::new(
                &config.registry.saved_model_dir,
                &config.registry.model_file_name,
            ),
            &config.pipeline.target_column,
        )
    }

    /// Score `frame` and return it with a `prediction` column of `neg`/`pos`.
    ///
    /// A label column, if present, is dropped first.
    pub fn predict(&self, mut frame: DataFrame) -> Result<DataFrame, PipelineError> {
        if frame.remove_column(&self.target_column).is_some() {
            tracing::debug!(column = %self.target_column, "Dropped label column before scoring");
        }
        frame.remove_column(PREDICTION_COLUMN);

        if !self.resolver.exists()? {
            return Err(PipelineError::NoModelAvailable(format!(
                "no promoted model under {}",
                self.resolver.root().display()
            )));
        }
        let model_path = self.resolver.latest_version_path()?;
        let model = SensorModel::load(&model_path)?;
        let classes = model.predict(&frame)?;
        let labels = classes
            .iter()
            .map(|c| TargetValueMapping::decode(*c).to_string())
            .collect();
        frame.push_column(PREDICTION_COLUMN, labels)?;
        tracing::info!(
            rows = frame.n_rows(),
            model = %model_path.display(),
            "Scored batch"
        );
        Ok(frame)
    }

    /// Score a CSV file, optionally writing the scored frame to `output`.
    pub fn predict_csv(&self, input: &Path, output: Option<&Path>) -> Result<DataFrame, PipelineError> {
        let scored = self.predict(DataFrame::read_csv(input)?)?;
        if let Some(path) = output {
            scored.write_csv(path)?;
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{BoostingParams, Classifier, GradientBoostingClassifier};
    use crate::transform::{FeaturePipeline, Transformer};
    use ndarray::{Array1, Array2};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn promote(root: &Path) {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 90.0, 91.0]).unwrap();
        let y = Array1::from(vec![0.0, 0.0, 1.0, 1.0]);
        let (transform, xt) = FeaturePipeline::default().fit_transform(&x).unwrap();
        let mut classifier = GradientBoostingClassifier::new(BoostingParams {
            n_estimators: 5,
            max_depth: 1,
            learning_rate: 0.1,
        });
        classifier.fit(&xt, &y).unwrap();
        SensorModel::new(vec!["aa_000".into()], transform, classifier)
            .save(&root.join("1").join("model.bin"))
            .unwrap();
    }

    fn frame() -> DataFrame {
        DataFrame::from_csv_reader("class,aa_000\npos,95\nneg,na\nneg,3\n".as_bytes()).unwrap()
    }

    #[test]
    fn test_predict_appends_labels() {
        let dir = TempDir::new().unwrap();
        promote(dir.path());
        let pipeline = PredictionPipeline::new(ModelResolver::new(dir.path(), "model.bin"), "class");
        let scored = pipeline.predict(frame()).unwrap();

        assert_eq!(scored.columns(), &["aa_000", "prediction"]);
        assert_eq!(scored.column("prediction").unwrap(), vec!["pos", "neg", "neg"]);
    }

    #[test]
    fn test_no_champion_is_no_model_available() {
        let dir = TempDir::new().unwrap();
        let pipeline =
            PredictionPipeline::new(ModelResolver::new(dir.path().join("none"), "model.bin"), "class");
        assert!(matches!(
            pipeline.predict(frame()),
            Err(PipelineError::NoModelAvailable(_))
        ));
    }

    #[test]
    fn test_predict_csv_writes_output() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("saved_models");
        promote(&registry);
        let input = dir.path().join("input.csv");
        std::fs::write(&input, "aa_000\n1\n92\n").unwrap();
        let output = dir.path().join("out").join("scored.csv");

        let pipeline = PredictionPipeline::new(ModelResolver::new(&registry, "model.bin"), "class");
        pipeline.predict_csv(&input, Some(&output)).unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "aa_000,prediction\n1,neg\n92,pos\n");
    }
}
