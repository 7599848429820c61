//! Error types for the sensorguard-ml crate.

use sensorguard_core::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage names, used to tag wrapped failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Ingestion,
    Validation,
    Preprocessing,
    Training,
    Evaluation,
    Pusher,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ingestion => "data_ingestion",
            Self::Validation => "data_validation",
            Self::Preprocessing => "data_preprocessing",
            Self::Training => "model_trainer",
            Self::Evaluation => "model_evaluation",
            Self::Pusher => "model_pusher",
        };
        f.write_str(name)
    }
}

/// Failures while resolving models in the versioned registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No model version found under {root}")]
    NotFound { root: PathBuf },

    #[error("Model version directory {version_dir} has no model file")]
    MissingModelFile { version_dir: PathBuf },

    #[error("Registry {root} contains a non-version entry '{entry}'")]
    Malformed { root: PathBuf, entry: String },

    #[error("Failed to read registry {root}: {source}")]
    Io {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error type for pipeline and prediction operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model quality error: {0}")]
    ModelQuality(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("No model available: {0}")]
    NoModelAvailable(String),

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: StageName,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn ingestion(msg: impl Into<String>) -> Self {
        Self::Ingestion(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn model_quality(msg: impl Into<String>) -> Self {
        Self::ModelQuality(msg.into())
    }

    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// Tag this error with the stage it came from.
    pub fn in_stage(self, stage: StageName) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, with stage wrappers removed.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The stage that raised this error, if it was tagged.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
