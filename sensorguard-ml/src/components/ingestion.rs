//! Data ingestion: store export, feature-store snapshot, train/test split.

use crate::artifact::IngestionArtifact;
use crate::context::{IngestionLayout, RunContext};
use crate::error::PipelineError;
use crate::frame::DataFrame;
use crate::schema::SchemaConfig;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use sensorguard_core::store::{DocumentStore, ID_FIELD};
use std::sync::Arc;

/// How rows are divided between train and test.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSettings {
    pub test_ratio: f64,
    pub seed: u64,
    /// Split each class of `target_column` separately.
    pub stratify: bool,
    pub target_column: String,
}

pub struct DataIngestion {
    layout: IngestionLayout,
    store: Arc<dyn DocumentStore>,
    collection: String,
    schema: SchemaConfig,
    split: SplitSettings,
}

impl DataIngestion {
    pub fn new(
        ctx: &RunContext,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        schema: SchemaConfig,
        split: SplitSettings,
    ) -> Self {
        Self {
            layout: ctx.ingestion_layout(),
            store,
            collection: collection.into(),
            schema,
            split,
        }
    }

    pub fn ingest(&self) -> Result<IngestionArtifact, PipelineError> {
        let ratio = self.split.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::ingestion(format!(
                "test split ratio must be in (0, 1), got {ratio}"
            )));
        }

        let mut frame = self.export_to_feature_store()?;
        let dropped = frame.drop_columns(&self.schema.drop_columns);
        tracing::debug!(dropped = ?dropped, "Dropped schema columns");

        let (train_idx, test_idx) = split_indices(&frame, &self.split)?;
        let train = frame.take_rows(&train_idx);
        let test = frame.take_rows(&test_idx);
        train.write_csv(&self.layout.train_path)?;
        test.write_csv(&self.layout.test_path)?;

        tracing::info!(
            train_rows = train.n_rows(),
            test_rows = test.n_rows(),
            path = %self.layout.train_path.display(),
            "Split data into train and test"
        );

        Ok(IngestionArtifact {
            feature_store_path: self.layout.feature_store_path.clone(),
            train_path: self.layout.train_path.clone(),
            test_path: self.layout.test_path.clone(),
        })
    }

    /// Pull the collection, drop the store id and persist the raw snapshot.
    fn export_to_feature_store(&self) -> Result<DataFrame, PipelineError> {
        tracing::info!(collection = %self.collection, "Exporting collection to feature store");
        let docs = self.store.fetch_all(&self.collection)?;
        if docs.is_empty() {
            return Err(PipelineError::ingestion(format!(
                "collection '{}' is empty",
                self.collection
            )));
        }
        let mut frame = DataFrame::from_documents(&docs);
        frame.remove_column(ID_FIELD);
        frame.write_csv(&self.layout.feature_store_path)?;
        tracing::info!(
            rows = frame.n_rows(),
            columns = frame.n_columns(),
            path = %self.layout.feature_store_path.display(),
            "Feature store written"
        );
        Ok(frame)
    }
}

/// Number of test rows for `n` rows: `round(n * ratio)`, kept within
/// `[1, n - 1]` so neither side is empty when `n >= 2`.
pub fn test_size(n: usize, ratio: f64) -> usize {
    if n < 2 {
        return 0;
    }
    ((n as f64 * ratio).round() as usize).clamp(1, n - 1)
}

/// Seeded train/test row indices. Each side keeps the original row order.
pub fn split_indices(
    frame: &DataFrame,
    split: &SplitSettings,
) -> Result<(Vec<usize>, Vec<usize>), PipelineError> {
    let mut rng = ChaCha8Rng::seed_from_u64(split.seed);
    let groups: Vec<Vec<usize>> = if split.stratify {
        let labels = frame.column(&split.target_column).ok_or_else(|| {
            PipelineError::ingestion(format!(
                "cannot stratify on missing column '{}'",
                split.target_column
            ))
        })?;
        let mut classes: Vec<&str> = labels.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
            .iter()
            .map(|class| {
                (0..labels.len())
                    .filter(|&i| labels[i] == *class)
                    .collect()
            })
            .collect()
    } else {
        vec![(0..frame.n_rows()).collect()]
    };

    let mut train = Vec::with_capacity(frame.n_rows());
    let mut test = Vec::new();
    for mut group in groups {
        group.shuffle(&mut rng);
        let n_test = test_size(group.len(), split.test_ratio);
        test.extend_from_slice(&group[..n_test]);
        train.extend_from_slice(&group[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
