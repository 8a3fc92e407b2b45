//! REST API server.
//!
//! Provides HTTP endpoints for:
//! - Meeting CRUD and audio upload
//! - Transcription submission and job status (with reconciliation)
//! - Proxied health check of the external service

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

use crate::tasks::TranscriptionWorker;
use crate::transcription::AsrClient;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub audio_dir: PathBuf,
    pub worker: Arc<TranscriptionWorker>,
    pub client: Arc<AsrClient>,
    /// Largest accepted request body in bytes. Bounds audio uploads,
    /// which axum would otherwise cap at 2 MB.
    pub max_body_bytes: usize,
}

pub struct ApiServer {
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    pub fn router(state: AppState) -> Router {
        let max_body_bytes = state.max_body_bytes;
        Router::new()
            .route("/", get(service_info))
            .route("/health", get(health))
            .with_state(state.clone())
            .merge(routes::meetings::router(state.clone()))
            .merge(routes::jobs::router(state))
            .layer(ServiceBuilder::new())
            .layer(DefaultBodyLimit::max(max_body_bytes))
    }

    pub async fn start(self) -> Result<()> {
        let app = Self::router(self.state);

        let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", self.port)).await?;

        info!("API server listening on http://0.0.0.0:{}", self.port);
        info!("Endpoints:");
        info!("  GET    /               - Service info");
        info!("  GET    /health         - Transcription service health");
        info!("  POST   /meetings       - Create meeting");
        info!("  GET    /meetings       - List meetings");
        info!("  GET    /meetings/:id   - Get meeting");
        info!("  PATCH  /meetings/:id   - Update meeting");
        info!("  DELETE /meetings/:id   - Delete meeting and its jobs");
        info!("  POST   /meetings/:id/audio      - Upload audio file");
        info!("  POST   /meetings/:id/transcribe - Submit transcription");
        info!("  GET    /jobs           - List transcription jobs");
        info!("  GET    /jobs/:job_id   - Get job (reconciles status)");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "protokoll",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<Value> {
    let report = state.client.health().await;
    Json(json!({
        "status": report.status,
        "service": "whisper",
        "message": report.message,
        "timestamp": report.timestamp,
    }))
}
