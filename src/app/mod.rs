//! Service wiring: config, stores, transcription worker, scheduler, API.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::api::{ApiServer, AppState};
use crate::config::Config;
use crate::db;
use crate::global;
use crate::tasks::{InProcessQueue, Scheduler, TranscriptionWorker};
use crate::transcription::AsrClient;

pub async fn run_service() -> Result<()> {
    info!("Starting protokoll service");

    let config = Config::load()?;

    let db_path = global::db_file()?;
    let audio_dir = global::audio_dir()?;
    let transcripts_dir = global::transcripts_dir()?;
    std::fs::create_dir_all(&audio_dir)?;
    std::fs::create_dir_all(&transcripts_dir)?;

    // Run migrations before accepting traffic
    drop(db::open(&db_path)?);

    let client = Arc::new(AsrClient::new(
        &config.service.base_url,
        &config.service.language,
        audio_dir.clone(),
        transcripts_dir,
    ));

    let queue = Arc::new(InProcessQueue::default());
    let worker = Arc::new(TranscriptionWorker::new(
        client.clone(),
        queue,
        db_path.clone(),
        Duration::from_secs(config.service.poll_interval_seconds),
        config.service.max_poll_attempts,
    ));

    Scheduler::new(
        client.clone(),
        audio_dir.clone(),
        config.schedule.cleanup_days,
        Duration::from_secs(config.schedule.cleanup_interval_hours * 60 * 60),
        Duration::from_secs(config.schedule.health_interval_minutes * 60),
    )
    .spawn();

    let state = AppState {
        db_path,
        audio_dir,
        worker,
        client,
        max_body_bytes: (config.server.max_upload_mb as usize) * 1024 * 1024,
    };

    ApiServer::new(config.server.port, state).start().await
}
