//! SensorGuard CLI: train, score and serve sensor-failure classifiers.

mod commands;
mod server;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// SensorGuard: batch training and serving for sensor-failure classification
#[derive(Parser, Debug)]
#[command(name = "sensorguard", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds sensorguard.toml; relative paths resolve here)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the training pipeline once
    Train,
    /// Score a CSV file with the latest promoted model
    Predict {
        /// Input CSV
        input: PathBuf,
        /// Write the scored CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a labeled CSV into the document store
    Import {
        /// Input CSV
        input: PathBuf,
        /// Target collection (defaults to store.collection)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Start the HTTP service
    Serve {
        /// Bind address (defaults to server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port (defaults to server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config =
        sensorguard_core::load_config(Some(&workspace), cli.config.as_deref())
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.resolve_paths(&workspace);

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let log_dir = &config.logging.log_dir;
    prepare_log_dir(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "sensorguard.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, config).await
}

fn prepare_log_dir(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))
}
