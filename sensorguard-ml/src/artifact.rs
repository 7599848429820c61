//! Stage artifacts.
//!
//! An artifact is returned only when its stage finished; a failing stage
//! returns an error and no artifact.

use crate::metrics::ClassificationMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    pub feature_store_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

/// Outcome of validation. Exactly one of the valid/invalid pairs is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    pub status: bool,
    pub valid_train_path: Option<PathBuf>,
    pub valid_test_path: Option<PathBuf>,
    pub invalid_train_path: Option<PathBuf>,
    pub invalid_test_path: Option<PathBuf>,
    pub drift_report_path: PathBuf,
}

impl ValidationArtifact {
    /// Valid train/test paths, when validation accepted the data.
    pub fn valid_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.valid_train_path, &self.valid_test_path) {
            (Some(train), Some(test)) if self.status => Some((train, test)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingArtifact {
    /// Feature columns, in the order of the array columns.
    pub feature_names: Vec<String>,
    pub transform_path: PathBuf,
    pub train_array_path: PathBuf,
    pub test_array_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerArtifact {
    pub model_bundle_path: PathBuf,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
}

/// Champion/challenger decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationArtifact {
    pub accepted: bool,
    pub improved_score: f64,
    pub champion_path: Option<PathBuf>,
    pub challenger_path: PathBuf,
    pub challenger_metric: ClassificationMetric,
    pub champion_metric: Option<ClassificationMetric>,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PusherArtifact {
    pub registry_path: PathBuf,
    pub stable_path: PathBuf,
    pub version: u64,
}
