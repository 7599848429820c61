//! Deployable model bundle and label mapping.

use crate::classifier::{Classifier, GradientBoostingClassifier};
use crate::error::PipelineError;
use crate::frame::DataFrame;
use crate::persist;
use crate::transform::{FeatureTransform, FittedTransformer};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed mapping between the label column's text and the numeric class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetValueMapping;

impl TargetValueMapping {
    pub const NEGATIVE: &'static str = "neg";
    pub const POSITIVE: &'static str = "pos";

    pub fn encode(label: &str) -> Option<f64> {
        match label.trim() {
            Self::NEGATIVE => Some(0.0),
            Self::POSITIVE => Some(1.0),
            _ => None,
        }
    }

    pub fn decode(class: f64) -> &'static str {
        if class >= 0.5 {
            Self::POSITIVE
        } else {
            Self::NEGATIVE
        }
    }

    /// Encode a whole label column, failing on the first unknown label.
    pub fn encode_all<S: AsRef<str>>(labels: &[S]) -> Result<Array1<f64>, PipelineError> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                Self::encode(label.as_ref()).ok_or_else(|| {
                    PipelineError::schema(format!(
                        "unknown target label '{}' at row {i}",
                        label.as_ref()
                    ))
                })
            })
            .collect()
    }
}

/// Fitted transform plus classifier, applied in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorModel {
    pub feature_names: Vec<String>,
    pub transform: FeatureTransform,
    pub classifier: GradientBoostingClassifier,
}

impl SensorModel {
    pub fn new(
        feature_names: Vec<String>,
        transform: FeatureTransform,
        classifier: GradientBoostingClassifier,
    ) -> Self {
        Self {
            feature_names,
            transform,
            classifier,
        }
    }

    /// Predict classes (0/1) for every row of `frame`.
    ///
    /// Columns are selected by name, so extra columns and column order do
    /// not matter; a missing feature column is an error.
    pub fn predict(&self, frame: &DataFrame) -> Result<Array1<f64>, PipelineError> {
        let x = frame
            .feature_matrix(&self.feature_names)
            .map_err(|e| PipelineError::prediction(e.to_string()))?;
        let transformed = self.transform.transform(&x)?;
        self.classifier.predict(&transformed)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        persist::save_object(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        persist::load_object(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::BoostingParams;
    use crate::transform::{FeaturePipeline, Transformer};
    use ndarray::{Array2, array};

    fn fitted_model() -> SensorModel {
        let x: Array2<f64> = array![[1.0, 100.0], [2.0, 110.0], [8.0, 900.0], [9.0, 950.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let (transform, xt) = FeaturePipeline::default().fit_transform(&x).unwrap();
        let mut classifier = GradientBoostingClassifier::new(BoostingParams {
            n_estimators: 5,
            max_depth: 2,
            learning_rate: 0.1,
        });
        classifier.fit(&xt, &y).unwrap();
        SensorModel::new(vec!["aa_000".into(), "ab_000".into()], transform, classifier)
    }

    #[test]
    fn test_mapping_roundtrip() {
        assert_eq!(TargetValueMapping::encode("neg"), Some(0.0));
        assert_eq!(TargetValueMapping::encode("pos"), Some(1.0));
        assert_eq!(TargetValueMapping::encode("maybe"), None);
        assert_eq!(TargetValueMapping::decode(1.0), "pos");
        assert_eq!(TargetValueMapping::decode(0.0), "neg");
        assert!(TargetValueMapping::encode_all(&["neg", "bad"]).is_err());
    }

    #[test]
    fn test_predict_selects_columns_by_name() {
        let model = fitted_model();
        let frame = DataFrame::new(
            vec!["ab_000".into(), "extra".into(), "aa_000".into()],
            vec![
                vec!["105".into(), "x".into(), "1.5".into()],
                vec!["na".into(), "y".into(), "9".into()],
                vec!["920".into(), "z".into(), "8.5".into()],
            ],
        )
        .unwrap();
        let pred = model.predict(&frame).unwrap();
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[2], 1.0);
    }

    #[test]
    fn test_missing_feature_is_prediction_error() {
        let model = fitted_model();
        let frame = DataFrame::new(vec!["aa_000".into()], vec![vec!["1".into()]]).unwrap();
        assert!(matches!(model.predict(&frame), Err(PipelineError::Prediction(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        let model = fitted_model();
        model.save(&path).unwrap();
        assert_eq!(SensorModel::load(&path).unwrap(), model);
    }
}
