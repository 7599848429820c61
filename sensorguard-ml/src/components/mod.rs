//! The five training stages plus the pusher.
//!
//! Each stage is built from the run context and its settings, consumes the
//! previous stage's artifact and returns its own.

pub mod evaluation;
pub mod ingestion;
pub mod preprocessing;
pub mod pusher;
pub mod trainer;
pub mod validation;

pub use evaluation::ModelEvaluation;
pub use ingestion::DataIngestion;
pub use preprocessing::DataPreprocessing;
pub use pusher::ModelPusher;
pub use trainer::ModelTrainer;
pub use validation::{DRIFT_SIGNIFICANCE, DataValidation, DriftReport};
