//! Object, array and report persistence.
//!
//! Fitted objects and numeric arrays are stored as bincode blobs, reports
//! as YAML. Every write goes through [`atomic_write`].

use crate::error::PipelineError;
use ndarray::Array2;
use sensorguard_core::persistence::atomic_write;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

pub fn save_object<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let bytes = bincode::serialize(value)?;
    atomic_write(path, &bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved object");
    Ok(())
}

pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let bytes = std::fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

pub fn save_array(path: &Path, array: &Array2<f64>) -> Result<(), PipelineError> {
    save_object(path, array)
}

pub fn load_array(path: &Path) -> Result<Array2<f64>, PipelineError> {
    load_object(path)
}

pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let text = serde_yaml::to_string(value)?;
    atomic_write(path, text.as_bytes())?;
    Ok(())
}

pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}
