//! Error types for the SensorGuard core library.

use std::path::PathBuf;

/// Errors raised by a document store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection failed for '{url}': {message}")]
    Connection { url: String, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed document in collection '{collection}': {message}")]
    MalformedDocument { collection: String, message: String },

    #[error("Invalid collection name: {name}")]
    InvalidCollection { name: String },
}

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration value for '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Errors from acquiring the training run lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Failed to create lock file {path}: {source}")]
    LockFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
