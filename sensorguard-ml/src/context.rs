//! Per-run identity and artifact layout.
//!
//! Every run gets its own directory `<artifact_dir>/<timestamp>`; each stage
//! writes only below its own subdirectory. The tree is kept after the run
//! as an audit trail.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Format of the run directory name.
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const FEATURE_STORE_FILE_NAME: &str = "sensor.csv";
pub const REPORT_FILE_NAME: &str = "report.yaml";
pub const TRAIN_ARRAY_FILE_NAME: &str = "train.bin";
pub const TEST_ARRAY_FILE_NAME: &str = "test.bin";
pub const PREPROCESSING_FILE_NAME: &str = "preprocessing.bin";
pub const MODEL_FILE_NAME: &str = "model.bin";

/// Identity of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub timestamp: DateTime<Local>,
    pub artifact_root: PathBuf,
}

impl RunContext {
    /// Context for a run starting now.
    pub fn new(artifact_dir: impl AsRef<Path>) -> Self {
        Self::at(artifact_dir, Local::now())
    }

    /// Context for a run with an explicit timestamp.
    pub fn at(artifact_dir: impl AsRef<Path>, timestamp: DateTime<Local>) -> Self {
        let artifact_root = artifact_dir
            .as_ref()
            .join(timestamp.format(TIMESTAMP_FORMAT).to_string());
        Self {
            timestamp,
            artifact_root,
        }
    }

    pub fn run_id(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn ingestion_layout(&self) -> IngestionLayout {
        let dir = self.artifact_root.join("data_ingestion");
        IngestionLayout {
            feature_store_path: dir.join("feature_store").join(FEATURE_STORE_FILE_NAME),
            train_path: dir.join("ingested").join(TRAIN_FILE_NAME),
            test_path: dir.join("ingested").join(TEST_FILE_NAME),
        }
    }

    pub fn validation_layout(&self) -> ValidationLayout {
        let dir = self.artifact_root.join("data_validation");
        ValidationLayout {
            valid_train_path: dir.join("validated").join(TRAIN_FILE_NAME),
            valid_test_path: dir.join("validated").join(TEST_FILE_NAME),
            invalid_train_path: dir.join("invalid").join(TRAIN_FILE_NAME),
            invalid_test_path: dir.join("invalid").join(TEST_FILE_NAME),
            drift_report_path: dir.join("drift_report").join(REPORT_FILE_NAME),
        }
    }

    pub fn preprocessing_layout(&self) -> PreprocessingLayout {
        let dir = self.artifact_root.join("data_preprocessing");
        PreprocessingLayout {
            train_array_path: dir.join("transformed").join(TRAIN_ARRAY_FILE_NAME),
            test_array_path: dir.join("transformed").join(TEST_ARRAY_FILE_NAME),
            transform_path: dir.join("transformed_object").join(PREPROCESSING_FILE_NAME),
        }
    }

    pub fn trainer_model_path(&self) -> PathBuf {
        self.artifact_root
            .join("model_trainer")
            .join("trained_model")
            .join(MODEL_FILE_NAME)
    }

    pub fn evaluation_report_path(&self) -> PathBuf {
        self.artifact_root
            .join("model_evaluation")
            .join(REPORT_FILE_NAME)
    }

    pub fn pusher_model_path(&self) -> PathBuf {
        self.artifact_root.join("model_pusher").join(MODEL_FILE_NAME)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionLayout {
    pub feature_store_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationLayout {
    pub valid_train_path: PathBuf,
    pub valid_test_path: PathBuf,
    pub invalid_train_path: PathBuf,
    pub invalid_test_path: PathBuf,
    pub drift_report_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingLayout {
    pub train_array_path: PathBuf,
    pub test_array_path: PathBuf,
    pub transform_path: PathBuf,
}
