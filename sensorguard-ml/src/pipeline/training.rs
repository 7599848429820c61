//! Training pipeline orchestrator.
//!
//! Runs ingestion, validation, preprocessing, training, evaluation and,
//! when the challenger is accepted, the pusher. Stages run strictly in
//! sequence; the first error aborts the run. Overlapping runs are the
//! caller's concern (see [`sensorguard_core::RunLock`]).

use crate::artifact::{EvaluationArtifact, PusherArtifact};
use crate::components::ingestion::SplitSettings;
use crate::components::trainer::QualityThresholds;
use crate::components::{
    DataIngestion, DataPreprocessing, DataValidation, ModelEvaluation, ModelPusher, ModelTrainer,
};
use crate::context::RunContext;
use crate::error::{PipelineError, StageName};
use crate::registry::ModelResolver;
use crate::schema::SchemaConfig;
use crate::search::ParamGrid;
use sensorguard_core::SensorGuardConfig;
use sensorguard_core::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Where the orchestrator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Ingesting,
    Validating,
    Preprocessing,
    Training,
    Evaluating,
    Pushing,
    /// The challenger lost; nothing is promoted.
    Skipped,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Ingesting => write!(f, "ingesting"),
            PipelineState::Validating => write!(f, "validating"),
            PipelineState::Preprocessing => write!(f, "preprocessing"),
            PipelineState::Training => write!(f, "training"),
            PipelineState::Evaluating => write!(f, "evaluating"),
            PipelineState::Pushing => write!(f, "pushing"),
            PipelineState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_root: PathBuf,
    pub evaluation: EvaluationArtifact,
    /// Set when the challenger was promoted.
    pub pusher: Option<PusherArtifact>,
}

pub struct TrainingPipeline {
    config: SensorGuardConfig,
    store: Arc<dyn DocumentStore>,
    state: PipelineState,
}

impl TrainingPipeline {
    pub fn new(config: SensorGuardConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            store,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn resolver(&self) -> ModelResolver {
        ModelResolver::new(
            &self.config.registry.saved_model_dir,
            &self.config.registry.model_file_name,
        )
    }

    /// Run every stage under a fresh timestamped run directory.
    pub fn run_pipeline(&mut self) -> Result<PipelineOutcome, PipelineError> {
        let ctx = RunContext::new(&self.config.pipeline.artifact_dir);
        self.run_with_context(&ctx)
    }

    /// Run every stage under `ctx`. The state is back to `Idle` when this
    /// returns, whatever the result.
    pub fn run_with_context(&mut self, ctx: &RunContext) -> Result<PipelineOutcome, PipelineError> {
        tracing::info!(run_id = %ctx.run_id(), root = %ctx.artifact_root.display(), "Training pipeline started");
        let result = self.run_stages(ctx);
        match &result {
            Ok(outcome) => tracing::info!(
                promoted = outcome.pusher.is_some(),
                "Training pipeline finished"
            ),
            Err(e) => tracing::error!(
                stage = ?e.stage().map(|s| s.to_string()),
                error = %e,
                "Training pipeline failed"
            ),
        }
        self.transition(PipelineState::Idle);
        result
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "Pipeline state change");
        self.state = next;
    }

    fn run_stages(&mut self, ctx: &RunContext) -> Result<PipelineOutcome, PipelineError> {
        let pipeline = self.config.pipeline.clone();
        let registry = self.config.registry.clone();

        self.transition(PipelineState::Ingesting);
        let schema = SchemaConfig::load(&pipeline.schema_path)
            .map_err(|e| e.in_stage(StageName::Ingestion))?;
        let split = SplitSettings {
            test_ratio: pipeline.test_split_ratio,
            seed: pipeline.random_seed,
            stratify: pipeline.stratify,
            target_column: pipeline.target_column.clone(),
        };
        let ingestion = DataIngestion::new(
            ctx,
            Arc::clone(&self.store),
            &self.config.store.collection,
            schema.clone(),
            split,
        )
        .ingest()
        .map_err(|e| e.in_stage(StageName::Ingestion))?;

        self.transition(PipelineState::Validating);
        let validation = DataValidation::new(ctx, schema)
            .validate(&ingestion)
            .map_err(|e| e.in_stage(StageName::Validation))?;

        self.transition(PipelineState::Preprocessing);
        let preprocessing = DataPreprocessing::new(ctx, &pipeline.target_column, pipeline.random_seed)
            .preprocess(&validation)
            .map_err(|e| e.in_stage(StageName::Preprocessing))?;

        self.transition(PipelineState::Training);
        let thresholds = QualityThresholds {
            overfitting_threshold: pipeline.overfitting_threshold,
            expected_score: pipeline.expected_score,
        };
        let trainer = ModelTrainer::new(
            ctx,
            thresholds,
            ParamGrid::from(&pipeline.param_grid),
            pipeline.cv_folds,
        )
        .train(&preprocessing)
        .map_err(|e| e.in_stage(StageName::Training))?;

        self.transition(PipelineState::Evaluating);
        let evaluation = ModelEvaluation::new(
            ctx,
            self.resolver(),
            &pipeline.target_column,
            pipeline.acceptance_threshold,
        )
        .evaluate(&validation, &trainer)
        .map_err(|e| e.in_stage(StageName::Evaluation))?;

        let pusher = if evaluation.accepted {
            self.transition(PipelineState::Pushing);
            let pushed = ModelPusher::new(ctx, self.resolver(), &registry.stable_model_path)
                .push(&evaluation)
                .map_err(|e| e.in_stage(StageName::Pusher))?;
            Some(pushed)
        } else {
            self.transition(PipelineState::Skipped);
            tracing::info!(
                improved_score = evaluation.improved_score,
                "Challenger not accepted, skipping push"
            );
            None
        };

        Ok(PipelineOutcome {
            run_root: ctx.artifact_root.clone(),
            evaluation,
            pusher,
        })
    }
}
