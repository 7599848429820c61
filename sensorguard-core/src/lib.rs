//! # sensorguard-core
//!
//! Shared foundation for the SensorGuard workspace: layered configuration,
//! the document-store collaborator the ingestion stage reads from, atomic
//! file persistence, and the run lock that keeps training runs from
//! overlapping.

pub mod config;
pub mod error;
pub mod lock;
pub mod persistence;
pub mod store;

pub use config::{SensorGuardConfig, load_config};
pub use error::{ConfigError, LockError, StoreError};
pub use lock::{RunGuard, RunLock};
pub use store::{Document, DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
