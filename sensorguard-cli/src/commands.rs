//! CLI subcommand handlers.

use crate::server::{self, AppState};
use crate::{Commands, ConfigAction};
use anyhow::Context;
use sensorguard_core::store::{Document, DocumentStore};
use sensorguard_core::{RunLock, SensorGuardConfig, SqliteDocumentStore};
use sensorguard_ml::frame::{DataFrame, is_missing};
use sensorguard_ml::{PredictionPipeline, TrainingPipeline};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub async fn handle_command(command: Commands, config: SensorGuardConfig) -> anyhow::Result<()> {
    match command {
        Commands::Train => handle_train(config).await,
        Commands::Predict { input, output } => handle_predict(&config, &input, output.as_deref()),
        Commands::Import { input, collection } => {
            let collection = collection.unwrap_or_else(|| config.store.collection.clone());
            handle_import(&config, &input, &collection)
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let store = open_store(&config);
            let state = AppState::new(config, store);
            server::run(state, &host, port).await?;
            Ok(())
        }
        Commands::Config { action } => handle_config(action, &config),
    }
}

/// Store handle built from the configuration.
pub fn open_store(config: &SensorGuardConfig) -> Arc<dyn DocumentStore> {
    Arc::new(SqliteDocumentStore::new(
        config.store.sqlite_path(),
        &config.store.database,
    ))
}

async fn handle_train(config: SensorGuardConfig) -> anyhow::Result<()> {
    let lock = RunLock::new(&config.pipeline.artifact_dir);
    let Some(guard) = lock.try_acquire()? else {
        anyhow::bail!("Training pipeline is already running");
    };
    let store = open_store(&config);

    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        TrainingPipeline::new(config, store).run_pipeline()
    })
    .await
    .context("training task panicked")??;

    println!("Run directory: {}", outcome.run_root.display());
    println!(
        "Challenger F1: {:.4} (improvement {:+.4})",
        outcome.evaluation.challenger_metric.f1_score, outcome.evaluation.improved_score
    );
    match outcome.pusher {
        Some(pushed) => println!(
            "Promoted as version {} -> {}",
            pushed.version,
            pushed.registry_path.display()
        ),
        None => println!("Champion kept; nothing promoted"),
    }
    Ok(())
}

fn handle_predict(
    config: &SensorGuardConfig,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let scored = PredictionPipeline::from_config(config)
        .predict_csv(input, output)
        .with_context(|| format!("Failed to score {}", input.display()))?;
    match output {
        Some(path) => println!("Wrote {} predictions to {}", scored.n_rows(), path.display()),
        None => std::io::stdout().write_all(&scored.to_csv_bytes()?)?,
    }
    Ok(())
}

fn handle_import(config: &SensorGuardConfig, input: &Path, collection: &str) -> anyhow::Result<()> {
    let frame = DataFrame::read_csv(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let docs = frame_to_documents(&frame);
    let inserted = open_store(config).insert_many(collection, &docs)?;
    println!("Inserted {inserted} documents into '{collection}'");
    Ok(())
}

/// One document per row. Numeric cells become JSON numbers; everything
/// else, including the `na` token, stays text.
pub fn frame_to_documents(frame: &DataFrame) -> Vec<Document> {
    frame
        .rows()
        .iter()
        .map(|row| {
            frame
                .columns()
                .iter()
                .zip(row)
                .map(|(column, cell)| (column.clone(), cell_value(cell)))
                .collect()
        })
        .collect()
}

fn cell_value(cell: &str) -> Value {
    if is_missing(cell) {
        return Value::String(cell.to_string());
    }
    let trimmed = cell.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    match trimmed.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}

fn handle_config(action: ConfigAction, config: &SensorGuardConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
