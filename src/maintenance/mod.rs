//! Periodic maintenance: stale audio sweep and service health check.

use anyhow::Result;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::transcription::{AsrClient, HealthReport};

/// Delete audio files older than `days` under `audio_root`.
///
/// Best-effort sweep: unreadable entries and failed deletes are logged and
/// skipped, no locking against concurrent uploads. Returns the number of
/// files deleted.
pub fn cleanup_audio_files(audio_root: &Path, days: u64) -> Result<usize> {
    info!("Cleaning up audio files older than {} days", days);

    // A retention window that overflows or predates the epoch matches nothing.
    let cutoff = match days
        .checked_mul(24 * 60 * 60)
        .map(Duration::from_secs)
        .and_then(|age| SystemTime::now().checked_sub(age))
    {
        Some(cutoff) => cutoff,
        None => {
            warn!("Retention window of {} days is out of range, skipping sweep", days);
            return Ok(0);
        }
    };
    let mut deleted_count = 0;

    if !audio_root.exists() {
        return Ok(0);
    }

    for entry in WalkDir::new(audio_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(time) => time,
            None => {
                warn!("Skipping {:?}: no modification time", entry.path());
                continue;
            }
        };

        if modified < cutoff {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!("Deleted old file: {:?}", entry.path());
                    deleted_count += 1;
                }
                Err(e) => warn!("Failed to delete {:?}: {}", entry.path(), e),
            }
        }
    }

    Ok(deleted_count)
}

/// Probe the transcription service. No side effects on job state.
pub async fn health_check(client: &AsrClient) -> HealthReport {
    info!("Performing health check on transcription service");
    client.health().await
}
