//! Configuration system for SensorGuard.
//!
//! Uses `figment` for layered configuration: defaults -> `sensorguard.toml`
//! in the workspace -> explicit config file -> environment.
//! Environment variables use the `SENSORGUARD_` prefix with `__` as the
//! section separator, e.g. `SENSORGUARD_STORE__URL`.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the workspace directory.
pub const CONFIG_FILE_NAME: &str = "sensorguard.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorGuardConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL. `sqlite://<path>` or a bare file path.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Database name, used as the table namespace.
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection holding the labeled sensor readings.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            database: default_database(),
            collection: default_collection(),
        }
    }
}

impl StoreConfig {
    /// Filesystem path of the SQLite database behind `url`.
    pub fn sqlite_path(&self) -> PathBuf {
        PathBuf::from(self.url.strip_prefix("sqlite://").unwrap_or(&self.url))
    }
}

fn default_store_url() -> String {
    "sqlite://data/sensorguard.db".to_string()
}

fn default_database() -> String {
    "sensorguard".to_string()
}

fn default_collection() -> String {
    "sensor_data".to_string()
}

/// Training pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which one timestamped directory per run is created.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// YAML schema describing the expected columns.
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Label column.
    #[serde(default = "default_target_column")]
    pub target_column: String,
    /// Fraction of rows routed to the test partition.
    #[serde(default = "default_test_split_ratio")]
    pub test_split_ratio: f64,
    /// Seed for the train/test shuffle and the oversampler.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Split each class separately so both partitions keep the label mix.
    #[serde(default)]
    pub stratify: bool,
    /// Folds used by the hyperparameter search.
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Maximum tolerated |train F1 - test F1|.
    #[serde(default = "default_overfitting_threshold")]
    pub overfitting_threshold: f64,
    /// Minimum test F1 a trained model must reach. `0.0` disables the check.
    #[serde(default = "default_expected_score")]
    pub expected_score: f64,
    /// Minimum F1 improvement over the champion required for promotion.
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,
    /// Hyperparameter grid for the gradient-boosted classifier.
    #[serde(default)]
    pub param_grid: ParamGridConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            schema_path: default_schema_path(),
            target_column: default_target_column(),
            test_split_ratio: default_test_split_ratio(),
            random_seed: default_random_seed(),
            stratify: false,
            cv_folds: default_cv_folds(),
            overfitting_threshold: default_overfitting_threshold(),
            expected_score: default_expected_score(),
            acceptance_threshold: default_acceptance_threshold(),
            param_grid: ParamGridConfig::default(),
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifact")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("config/schema.yaml")
}

fn default_target_column() -> String {
    "class".to_string()
}

fn default_test_split_ratio() -> f64 {
    0.2
}

fn default_random_seed() -> u64 {
    42
}

fn default_cv_folds() -> usize {
    3
}

fn default_overfitting_threshold() -> f64 {
    0.05
}

fn default_expected_score() -> f64 {
    0.0
}

fn default_acceptance_threshold() -> f64 {
    0.02
}

/// Candidate values searched for each boosting hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGridConfig {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: Vec<usize>,
    #[serde(default = "default_max_depth")]
    pub max_depth: Vec<usize>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: Vec<f64>,
}

impl Default for ParamGridConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
        }
    }
}

fn default_n_estimators() -> Vec<usize> {
    vec![50, 100, 200]
}

fn default_max_depth() -> Vec<usize> {
    vec![3, 5, 10]
}

fn default_learning_rate() -> Vec<f64> {
    vec![0.1, 0.01, 0.05]
}

/// Model registry locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Root holding integer-named version directories.
    #[serde(default = "default_saved_model_dir")]
    pub saved_model_dir: PathBuf,
    /// Version-independent copy of the latest promoted model.
    #[serde(default = "default_stable_model_path")]
    pub stable_model_path: PathBuf,
    /// File name of the bundle inside each version directory.
    #[serde(default = "default_model_file_name")]
    pub model_file_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            saved_model_dir: default_saved_model_dir(),
            stable_model_path: default_stable_model_path(),
            model_file_name: default_model_file_name(),
        }
    }
}

fn default_saved_model_dir() -> PathBuf {
    PathBuf::from("saved_models")
}

fn default_stable_model_path() -> PathBuf {
    PathBuf::from("production_model/model.bin")
}

fn default_model_file_name() -> String {
    "model.bin".to_string()
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Log file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl SensorGuardConfig {
    /// Reject values the pipeline cannot run with.
    ///
    /// The split ratio is checked by the ingestion stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.target_column.trim().is_empty() {
            return Err(invalid("pipeline.target_column", "must not be empty"));
        }
        if p.cv_folds < 2 {
            return Err(invalid("pipeline.cv_folds", "must be at least 2"));
        }
        for (key, value) in [
            ("pipeline.overfitting_threshold", p.overfitting_threshold),
            ("pipeline.expected_score", p.expected_score),
            ("pipeline.acceptance_threshold", p.acceptance_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(key, "must be a non-negative number"));
            }
        }
        let grid = &p.param_grid;
        if grid.n_estimators.is_empty() || grid.max_depth.is_empty() || grid.learning_rate.is_empty()
        {
            return Err(invalid("pipeline.param_grid", "every axis needs a value"));
        }
        if grid.n_estimators.contains(&0) || grid.max_depth.contains(&0) {
            return Err(invalid(
                "pipeline.param_grid",
                "n_estimators and max_depth must be positive",
            ));
        }
        if grid
            .learning_rate
            .iter()
            .any(|lr| !lr.is_finite() || *lr <= 0.0)
        {
            return Err(invalid("pipeline.param_grid.learning_rate", "must be positive"));
        }
        if self.store.collection.trim().is_empty() {
            return Err(invalid("store.collection", "must not be empty"));
        }
        if self.registry.model_file_name.trim().is_empty() {
            return Err(invalid("registry.model_file_name", "must not be empty"));
        }
        Ok(())
    }

    /// Anchor every relative path at `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.pipeline.artifact_dir);
        anchor(&mut self.pipeline.schema_path);
        anchor(&mut self.registry.saved_model_dir);
        anchor(&mut self.registry.stable_model_path);
        anchor(&mut self.logging.log_dir);

        let db = self.store.sqlite_path();
        if db.is_relative() {
            self.store.url = format!("sqlite://{}", base.join(db).display());
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Load configuration with layered sources.
///
/// Priority (highest first):
/// 1. Environment variables (`SENSORGUARD_` prefix)
/// 2. Explicit config file (`--config`)
/// 3. Workspace config (`<workspace>/sensorguard.toml`)
/// 4. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<SensorGuardConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SensorGuardConfig::default()));

    if let Some(ws) = workspace {
        let ws_config = ws.join(CONFIG_FILE_NAME);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("SENSORGUARD_").split("__"));

    let config: SensorGuardConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
