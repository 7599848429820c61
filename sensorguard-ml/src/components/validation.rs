//! Data validation: schema conformance and train/test drift.
//!
//! A dataset with any drifted column is rejected as a whole and routed to
//! `invalid/`; otherwise both splits go to `validated/`.

use crate::artifact::{IngestionArtifact, ValidationArtifact};
use crate::context::{RunContext, ValidationLayout};
use crate::error::PipelineError;
use crate::frame::{DataFrame, is_missing};
use crate::persist;
use crate::schema::SchemaConfig;
use crate::stats::{ks_2samp, rank_categories};
use sensorguard_core::persistence::atomic_copy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Columns whose KS p-value falls below this are drifted.
pub const DRIFT_SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_detected: bool,
}

/// Per-column drift results, keyed by column name.
pub type DriftReport = BTreeMap<String, ColumnDrift>;

pub struct DataValidation {
    layout: ValidationLayout,
    schema: SchemaConfig,
}

impl DataValidation {
    pub fn new(ctx: &RunContext, schema: SchemaConfig) -> Self {
        Self {
            layout: ctx.validation_layout(),
            schema,
        }
    }

    pub fn validate(&self, input: &IngestionArtifact) -> Result<ValidationArtifact, PipelineError> {
        let train = DataFrame::read_csv(&input.train_path)?;
        let test = DataFrame::read_csv(&input.test_path)?;

        for (label, frame) in [("train", &train), ("test", &test)] {
            self.check_column_count(label, frame)?;
            self.check_numerical_columns(label, frame)?;
        }

        let report = detect_drift(&train, &test);
        persist::write_yaml(&self.layout.drift_report_path, &report)?;
        let drifted: Vec<&str> = report
            .iter()
            .filter(|(_, d)| d.drift_detected)
            .map(|(c, _)| c.as_str())
            .collect();
        let status = drifted.is_empty();

        let artifact = if status {
            atomic_copy(&input.train_path, &self.layout.valid_train_path)?;
            atomic_copy(&input.test_path, &self.layout.valid_test_path)?;
            tracing::info!(columns = report.len(), "Data validation passed");
            ValidationArtifact {
                status,
                valid_train_path: Some(self.layout.valid_train_path.clone()),
                valid_test_path: Some(self.layout.valid_test_path.clone()),
                invalid_train_path: None,
                invalid_test_path: None,
                drift_report_path: self.layout.drift_report_path.clone(),
            }
        } else {
            atomic_copy(&input.train_path, &self.layout.invalid_train_path)?;
            atomic_copy(&input.test_path, &self.layout.invalid_test_path)?;
            tracing::warn!(drifted = ?drifted, "Data drift detected, dataset rejected");
            ValidationArtifact {
                status,
                valid_train_path: None,
                valid_test_path: None,
                invalid_train_path: Some(self.layout.invalid_train_path.clone()),
                invalid_test_path: Some(self.layout.invalid_test_path.clone()),
                drift_report_path: self.layout.drift_report_path.clone(),
            }
        };
        Ok(artifact)
    }

    fn check_column_count(&self, label: &str, frame: &DataFrame) -> Result<(), PipelineError> {
        let expected = self.schema.expected_column_count();
        if frame.n_columns() != expected {
            return Err(PipelineError::schema(format!(
                "{label} data has {} columns, schema expects {expected}",
                frame.n_columns()
            )));
        }
        Ok(())
    }

    fn check_numerical_columns(&self, label: &str, frame: &DataFrame) -> Result<(), PipelineError> {
        let missing: Vec<&String> = self
            .schema
            .numerical_columns
            .iter()
            .filter(|c| !frame.has_column(c))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema(format!(
                "{label} data is missing numerical columns {missing:?}"
            )));
        }
        if let Some(bad) = self
            .schema
            .numerical_columns
            .iter()
            .find(|c| !frame.is_numeric(c))
        {
            return Err(PipelineError::schema(format!(
                "{label} column '{bad}' is not numeric"
            )));
        }
        Ok(())
    }
}

/// Two-sample KS test for every train column that test also has.
pub fn detect_drift(train: &DataFrame, test: &DataFrame) -> DriftReport {
    let mut report = DriftReport::new();
    for column in train.columns() {
        if !test.has_column(column) {
            tracing::warn!(column = %column, "Column absent from test data, drift check skipped");
            continue;
        }
        let (a, b) = match (train.numeric_column(column), test.numeric_column(column)) {
            (Some(a), Some(b)) => (a, b),
            _ => text_samples(train, test, column),
        };
        let ks = ks_2samp(&a, &b);
        let drift_detected = ks.p_value < DRIFT_SIGNIFICANCE;
        tracing::debug!(column = %column, statistic = ks.statistic, p_value = ks.p_value, drift_detected, "KS test");
        report.insert(
            column.clone(),
            ColumnDrift {
                p_value: ks.p_value,
                drift_detected,
            },
        );
    }
    report
}

fn text_samples(train: &DataFrame, test: &DataFrame, column: &str) -> (Vec<f64>, Vec<f64>) {
    let present = |frame: &DataFrame| -> Vec<Option<String>> {
        frame
            .column(column)
            .unwrap_or_default()
            .into_iter()
            .map(|cell| (!is_missing(cell)).then(|| cell.trim().to_string()))
            .collect()
    };
    let (a, b) = (present(train), present(test));
    let a: Vec<Option<&str>> = a.iter().map(|v| v.as_deref()).collect();
    let b: Vec<Option<&str>> = b.iter().map(|v| v.as_deref()).collect();
    rank_categories(&a, &b)
}
