//! Recurring maintenance timers.
//!
//! One explicit component owns the periodic jobs instead of module-level
//! registration; intervals are injected so tests can drive them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::maintenance;
use crate::transcription::{AsrClient, HealthState};

pub struct Scheduler {
    client: Arc<AsrClient>,
    audio_dir: PathBuf,
    cleanup_days: u64,
    cleanup_interval: Duration,
    health_interval: Duration,
}

impl Scheduler {
    pub fn new(
        client: Arc<AsrClient>,
        audio_dir: PathBuf,
        cleanup_days: u64,
        cleanup_interval: Duration,
        health_interval: Duration,
    ) -> Self {
        Self {
            client,
            audio_dir,
            cleanup_days,
            cleanup_interval,
            health_interval,
        }
    }

    /// Spawn the recurring tasks. Each timer ticks immediately on start,
    /// then at its configured cadence.
    pub fn spawn(self) {
        let audio_dir = self.audio_dir.clone();
        let cleanup_days = self.cleanup_days;
        let mut cleanup_tick = tokio::time::interval(self.cleanup_interval);

        tokio::spawn(async move {
            loop {
                cleanup_tick.tick().await;
                let root = audio_dir.clone();
                let result =
                    tokio::task::spawn_blocking(move || {
                        maintenance::cleanup_audio_files(&root, cleanup_days)
                    })
                    .await;

                match result {
                    Ok(Ok(count)) => info!("Audio cleanup deleted {} files", count),
                    Ok(Err(e)) => error!("Audio cleanup failed: {:#}", e),
                    Err(e) => error!("Audio cleanup task panicked: {}", e),
                }
            }
        });

        let client = self.client;
        let mut health_tick = tokio::time::interval(self.health_interval);

        tokio::spawn(async move {
            loop {
                health_tick.tick().await;
                let report = maintenance::health_check(&client).await;
                match report.status {
                    HealthState::Healthy => {
                        info!("Transcription service healthy at {}", report.timestamp)
                    }
                    _ => error!(
                        "Transcription service {:?}: {}",
                        report.status,
                        report.message.unwrap_or_default()
                    ),
                }
            }
        });
    }
}
