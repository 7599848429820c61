//! Orchestration of the training stages and batch prediction.

pub mod prediction;
pub mod training;

pub use prediction::{PREDICTION_COLUMN, PredictionPipeline};
pub use training::{PipelineOutcome, PipelineState, TrainingPipeline};
