//! # sensorguard-ml
//!
//! Batch training pipeline for sensor-failure classification.
//!
//! A run pulls labeled readings from a [`DocumentStore`](sensorguard_core::DocumentStore),
//! validates the schema and the train/test drift, preprocesses and rebalances
//! the training split, fits a gradient-boosted classifier, compares it with
//! the deployed champion and, when it wins, promotes it into the versioned
//! model registry. The [`PredictionPipeline`] scores new data with the latest
//! promoted model.
//!
//! Stages communicate only through the typed artifacts in [`artifact`]; each
//! artifact names the files its stage wrote under the run directory.

pub mod artifact;
pub mod classifier;
pub mod components;
pub mod context;
pub mod error;
pub mod estimator;
pub mod frame;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod registry;
pub mod resample;
pub mod schema;
pub mod search;
pub mod stats;
pub mod transform;

pub use artifact::{
    EvaluationArtifact, IngestionArtifact, PreprocessingArtifact, PusherArtifact,
    TrainerArtifact, ValidationArtifact,
};
pub use context::RunContext;
pub use error::{PipelineError, RegistryError, StageName};
pub use estimator::{SensorModel, TargetValueMapping};
pub use frame::DataFrame;
pub use metrics::ClassificationMetric;
pub use pipeline::{PipelineOutcome, PipelineState, PredictionPipeline, TrainingPipeline};
pub use registry::ModelResolver;
pub use schema::SchemaConfig;
