//! Promotion of an accepted model into the registry.

use crate::artifact::{EvaluationArtifact, PusherArtifact};
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::registry::ModelResolver;
use sensorguard_core::persistence::atomic_copy;
use std::path::PathBuf;

pub struct ModelPusher {
    run_copy_path: PathBuf,
    resolver: ModelResolver,
    stable_path: PathBuf,
}

impl ModelPusher {
    pub fn new(ctx: &RunContext, resolver: ModelResolver, stable_path: impl Into<PathBuf>) -> Self {
        Self {
            run_copy_path: ctx.pusher_model_path(),
            resolver,
            stable_path: stable_path.into(),
        }
    }

    /// Copy the challenger into the run directory, a new registry version
    /// and the stable path. A failed promotion leaves no new version behind.
    pub fn push(&self, evaluation: &EvaluationArtifact) -> Result<PusherArtifact, PipelineError> {
        if !evaluation.accepted {
            return Err(PipelineError::InvalidState(
                "only accepted models can be pushed".into(),
            ));
        }
        let source = &evaluation.challenger_path;
        atomic_copy(source, &self.run_copy_path)?;

        let version = self.resolver.next_version()?;
        let registry_path = self.resolver.model_path_for(version);
        let promoted = atomic_copy(source, &registry_path)
            .and_then(|_| atomic_copy(source, &self.stable_path));
        if let Err(e) = promoted {
            let version_dir = self.resolver.version_dir(version);
            if let Err(cleanup) = std::fs::remove_dir_all(&version_dir) {
                tracing::warn!(
                    path = %version_dir.display(),
                    error = %cleanup,
                    "Failed to remove partial registry version"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            version,
            registry_path = %registry_path.display(),
            stable_path = %self.stable_path.display(),
            "Promoted model"
        );
        Ok(PusherArtifact {
            registry_path,
            stable_path: self.stable_path.clone(),
            version,
        })
    }
}
