//! Data preprocessing: label encoding, imputation + scaling, rebalancing.

use crate::artifact::{PreprocessingArtifact, ValidationArtifact};
use crate::context::{PreprocessingLayout, RunContext};
use crate::error::PipelineError;
use crate::estimator::TargetValueMapping;
use crate::frame::DataFrame;
use crate::persist;
use crate::resample::{Resampler, SmoteTomek};
use crate::transform::{FeaturePipeline, FittedTransformer, Transformer};
use ndarray::{Array1, Array2, Axis};
use std::path::Path;

/// Neighbours used by SMOTE.
const SMOTE_NEIGHBORS: usize = 5;

pub struct DataPreprocessing {
    layout: PreprocessingLayout,
    target_column: String,
    seed: u64,
}

impl DataPreprocessing {
    pub fn new(ctx: &RunContext, target_column: impl Into<String>, seed: u64) -> Self {
        Self {
            layout: ctx.preprocessing_layout(),
            target_column: target_column.into(),
            seed,
        }
    }

    pub fn preprocess(
        &self,
        input: &ValidationArtifact,
    ) -> Result<PreprocessingArtifact, PipelineError> {
        let (train_path, test_path) = input.valid_paths().ok_or_else(|| {
            PipelineError::MissingData("validation produced no valid train/test data".into())
        })?;

        let (feature_names, x_train, y_train) = self.split_target(train_path)?;
        let (_, x_test, y_test) = self.split_target(test_path)?;

        let (transform, x_train) = FeaturePipeline::default().fit_transform(&x_train)?;
        let x_test = transform.transform(&x_test)?;

        let resampled = SmoteTomek::new(SMOTE_NEIGHBORS, self.seed).fit_resample(&x_train, &y_train)?;
        tracing::info!(
            rows_before = y_train.len(),
            rows_after = resampled.y.len(),
            synthetic = resampled.n_synthetic,
            removed = resampled.n_removed,
            "Rebalanced training data"
        );

        persist::save_array(&self.layout.train_array_path, &with_label(&resampled.x, &resampled.y)?)?;
        persist::save_array(&self.layout.test_array_path, &with_label(&x_test, &y_test)?)?;
        persist::save_object(&self.layout.transform_path, &transform)?;
        tracing::info!(
            features = feature_names.len(),
            path = %self.layout.transform_path.display(),
            "Saved preprocessing transform"
        );

        Ok(PreprocessingArtifact {
            feature_names,
            transform_path: self.layout.transform_path.clone(),
            train_array_path: self.layout.train_array_path.clone(),
            test_array_path: self.layout.test_array_path.clone(),
        })
    }

    /// Feature names, raw feature matrix and encoded labels of a CSV.
    fn split_target(
        &self,
        path: &Path,
    ) -> Result<(Vec<String>, Array2<f64>, Array1<f64>), PipelineError> {
        let mut frame = DataFrame::read_csv(path)?;
        let labels = frame.remove_column(&self.target_column).ok_or_else(|| {
            PipelineError::schema(format!(
                "target column '{}' missing from {}",
                self.target_column,
                path.display()
            ))
        })?;
        let y = TargetValueMapping::encode_all(&labels)?;
        let names = frame.columns().to_vec();
        let x = frame.feature_matrix(&names)?;
        Ok((names, x, y))
    }
}

/// `[features | label]`, the layout of the persisted arrays.
pub fn with_label(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>, PipelineError> {
    let label = y.view().insert_axis(Axis(1));
    ndarray::concatenate(Axis(1), &[x.view(), label])
        .map_err(|e| PipelineError::transform(format!("cannot append label column: {e}")))
}

/// Inverse of [`with_label`].
pub fn split_label(data: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>), PipelineError> {
    let n = data.ncols();
    if n < 2 {
        return Err(PipelineError::training(format!(
            "array has {n} columns, need features and a label"
        )));
    }
    let x = data.slice(ndarray::s![.., ..n - 1]).to_owned();
    let y = data.column(n - 1).to_owned();
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> RunContext {
        RunContext::at(dir.path(), Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn validated(dir: &TempDir, train: &str, test: &str) -> ValidationArtifact {
        let layout = ctx(dir).validation_layout();
        std::fs::create_dir_all(layout.valid_train_path.parent().unwrap()).unwrap();
        std::fs::write(&layout.valid_train_path, train).unwrap();
        std::fs::write(&layout.valid_test_path, test).unwrap();
        ValidationArtifact {
            status: true,
            valid_train_path: Some(layout.valid_train_path),
            valid_test_path: Some(layout.valid_test_path),
            invalid_train_path: None,
            invalid_test_path: None,
            drift_report_path: layout.drift_report_path,
        }
    }

    fn imbalanced_train() -> String {
        let mut out = String::from("class,aa_000,ab_000\n");
        for i in 0..12 {
            out.push_str(&format!("neg,{},{}\n", i, 100 + i));
        }
        for i in 0..4 {
            out.push_str(&format!("pos,{},na\n", 50 + i));
        }
        out
    }

    const TEST: &str = "class,aa_000,ab_000\nneg,3,na\npos,51,7\nneg,5,104\n";

    #[test]
    fn test_preprocess_balances_train_only() {
        let dir = TempDir::new().unwrap();
        let input = validated(&dir, &imbalanced_train(), TEST);
        let artifact = DataPreprocessing::new(&ctx(&dir), "class", 42)
            .preprocess(&input)
            .unwrap();

        assert_eq!(artifact.feature_names, vec!["aa_000", "ab_000"]);

        let train = persist::load_array(&artifact.train_array_path).unwrap();
        let (_, y) = split_label(&train).unwrap();
        let pos = y.iter().filter(|v| **v == 1.0).count();
        let neg = y.iter().filter(|v| **v == 0.0).count();
        assert_eq!(pos, 12);
        assert!(neg <= 12);

        let test = persist::load_array(&artifact.test_array_path).unwrap();
        assert_eq!(test.dim(), (3, 3));
        assert_eq!(test.column(2).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_saved_transform_reproduces_test_array() {
        let dir = TempDir::new().unwrap();
        let input = validated(&dir, &imbalanced_train(), TEST);
        let artifact = DataPreprocessing::new(&ctx(&dir), "class", 42)
            .preprocess(&input)
            .unwrap();

        let transform: crate::transform::FeatureTransform =
            persist::load_object(&artifact.transform_path).unwrap();
        let raw = DataFrame::from_csv_reader(TEST.as_bytes())
            .unwrap()
            .feature_matrix(&artifact.feature_names)
            .unwrap();
        let once = transform.transform(&raw).unwrap();
        let twice = transform.transform(&raw).unwrap();
        assert_eq!(once, twice);

        let (x_test, _) = split_label(&persist::load_array(&artifact.test_array_path).unwrap()).unwrap();
        assert_eq!(once, x_test);
    }

    #[test]
    fn test_rejected_validation_is_missing_data() {
        let dir = TempDir::new().unwrap();
        let mut input = validated(&dir, &imbalanced_train(), TEST);
        input.status = false;
        let result = DataPreprocessing::new(&ctx(&dir), "class", 42).preprocess(&input);
        assert!(matches!(result, Err(PipelineError::MissingData(_))));
    }

    #[test]
    fn test_unknown_label_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let bad = "class,aa_000,ab_000\nneg,1,2\nmaybe,3,4\n";
        let input = validated(&dir, bad, TEST);
        let result = DataPreprocessing::new(&ctx(&dir), "class", 42).preprocess(&input);
        assert!(matches!(result, Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_label_column_layout() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![0.0, 1.0];
        let joined = with_label(&x, &y).unwrap();
        assert_eq!(joined, array![[1.0, 2.0, 0.0], [3.0, 4.0, 1.0]]);
        let (x2, y2) = split_label(&joined).unwrap();
        assert_eq!(x2, x);
        assert_eq!(y2, y);
    }
}
