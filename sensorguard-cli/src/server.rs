//! HTTP service: health, on-demand training and batch prediction.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use sensorguard_core::store::DocumentStore;
use sensorguard_core::{RunLock, SensorGuardConfig};
use sensorguard_ml::frame::DataFrame;
use sensorguard_ml::{PipelineError, PredictionPipeline, TrainingPipeline};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<SensorGuardConfig>,
    store: Arc<dyn DocumentStore>,
    lock: RunLock,
}

impl AppState {
    pub fn new(config: SensorGuardConfig, store: Arc<dyn DocumentStore>) -> Self {
        let lock = RunLock::new(&config.pipeline.artifact_dir);
        Self {
            config: Arc::new(config),
            store,
            lock,
        }
    }

    pub fn lock(&self) -> &RunLock {
        &self.lock
    }
}

/// Build the router with `/`, `/train` and `/predict`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/train", get(train_handler))
        .route("/predict", post(predict_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "training": state.lock.is_running(),
    }))
}

/// Run the training pipeline once. Overlapping requests get `409`.
async fn train_handler(State(state): State<AppState>) -> Response {
    let guard = match state.lock.try_acquire() {
        Ok(Some(guard)) => guard,
        Ok(None) => {
            tracing::warn!("Rejected training request, a run is in progress");
            return (StatusCode::CONFLICT, "Training pipeline is already running").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to acquire training lock");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error Occurred! {e}"))
                .into_response();
        }
    };

    let config = SensorGuardConfig::clone(&state.config);
    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        TrainingPipeline::new(config, store).run_pipeline()
    })
    .await;

    match result {
        Ok(Ok(_)) => (StatusCode::OK, "Training successful").into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error Occurred! {e}"))
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Training task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error Occurred! training task failed")
                .into_response()
        }
    }
}

/// Score a CSV request body with the latest promoted model.
async fn predict_handler(State(state): State<AppState>, body: String) -> Response {
    let frame = match DataFrame::from_csv_reader(body.as_bytes()) {
        Ok(frame) if frame.n_columns() > 0 => frame,
        Ok(_) => return (StatusCode::BAD_REQUEST, "Request body has no CSV header").into_response(),
        Err(e) => return (StatusCode::BAD_REQUEST, format!("Malformed CSV: {e}")).into_response(),
    };

    let pipeline = PredictionPipeline::from_config(&state.config);
    let result = tokio::task::spawn_blocking(move || pipeline.predict(frame)).await;
    match result {
        Ok(Ok(scored)) => axum::Json(serde_json::json!({
            "predictions": scored.to_records(),
        }))
        .into_response(),
        Ok(Err(e)) => {
            let status = match e.root_cause() {
                PipelineError::NoModelAvailable(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, format!("Error Occurred! {e}")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Prediction task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error Occurred! prediction task failed")
                .into_response()
        }
    }
}

/// Serve until Ctrl-C.
pub async fn run(state: AppState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "SensorGuard service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
