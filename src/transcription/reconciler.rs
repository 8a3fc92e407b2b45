//! Job reconciler: the transcription state machine.
//!
//! On every status query the persisted job status is compared against the
//! task queue's signal and advanced:
//!
//! pending → processing → completed
//! pending → processing → failed
//! pending → timeout          (async poll budget exhausted)
//!
//! Reconciliation is idempotent: a repeated, unchanged signal performs no
//! writes and leaves `updated_at` alone.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::db::{self, JobRepository, MeetingRepository, MeetingUpdate, TranscriptionJob, TranscriptionStatus};
use crate::error::CoreError;
use crate::tasks::TaskQueue;

use super::client::AsrJobStatus;

/// Result payload carried by a SUCCESS signal. The transcript may arrive
/// inline or as a side-file written by the submission step.
#[derive(Debug, Clone, Default)]
pub struct SuccessPayload {
    pub text: Option<String>,
    pub transcript_file: Option<PathBuf>,
}

/// Task-queue view of a job, as reported on each status query.
#[derive(Debug, Clone)]
pub enum TaskSignal {
    Pending,
    Started,
    Success(SuccessPayload),
    Failure(String),
}

impl TaskSignal {
    /// Translate an `/asr?id=` status answer into a queue signal.
    pub fn from_asr(status: &AsrJobStatus) -> Self {
        match status.status.as_str() {
            "PENDING" => Self::Pending,
            "STARTED" => Self::Started,
            "SUCCESS" => Self::Success(SuccessPayload {
                text: status.text.clone(),
                transcript_file: None,
            }),
            "FAILURE" => Self::Failure(
                status
                    .text
                    .clone()
                    .unwrap_or_else(|| "transcription failed".to_string()),
            ),
            other => {
                warn!("Unknown task signal '{}', treating as pending", other);
                Self::Pending
            }
        }
    }
}

/// Advance the persisted job according to an external signal.
///
/// Returns the job after reconciliation, or `None` when no job with this
/// correlation id exists.
pub fn reconcile(
    conn: &Connection,
    correlation_id: &str,
    signal: &TaskSignal,
) -> Result<Option<TranscriptionJob>> {
    let Some(job) = JobRepository::get(conn, correlation_id)? else {
        return Ok(None);
    };

    match signal {
        TaskSignal::Pending => Ok(Some(job)),

        TaskSignal::Started => {
            if job.status == TranscriptionStatus::Pending {
                info!("Job {} started processing", correlation_id);
                JobRepository::update_status(conn, correlation_id, TranscriptionStatus::Processing)
            } else {
                Ok(Some(job))
            }
        }

        TaskSignal::Success(payload) => {
            if job.status == TranscriptionStatus::Completed {
                // Already applied; do not rewrite the transcript.
                return Ok(Some(job));
            }

            let Some(transcript) = resolve_transcript(payload) else {
                // No readable transcript: leave the job as-is and let a
                // later query with a usable payload complete it.
                warn!(
                    "SUCCESS signal for job {} carried no readable transcript",
                    correlation_id
                );
                return Ok(Some(job));
            };

            MeetingRepository::update(
                conn,
                job.meeting_id,
                &MeetingUpdate {
                    transcript: Some(transcript),
                    status: Some(TranscriptionStatus::Completed),
                    ..Default::default()
                },
            )
            .context("Failed to write transcript to meeting")?;

            info!(
                "Job {} completed, transcript written to meeting {}",
                correlation_id, job.meeting_id
            );

            JobRepository::update_status(conn, correlation_id, TranscriptionStatus::Completed)
        }

        TaskSignal::Failure(error) => {
            if job.status == TranscriptionStatus::Failed {
                return Ok(Some(job));
            }

            warn!("Job {} failed: {}", correlation_id, error);
            JobRepository::update_status(conn, correlation_id, TranscriptionStatus::Failed)
        }
    }
}

fn resolve_transcript(payload: &SuccessPayload) -> Option<String> {
    if let Some(text) = &payload.text {
        return Some(text.clone());
    }

    let path = payload.transcript_file.as_deref()?;
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Transcript side-file {:?} unreadable: {}", path, e);
            None
        }
    }
}

/// Poll the task queue until the job reaches a terminal state.
///
/// Query errors count against the attempt budget rather than aborting.
/// Exhausting the budget marks the job timed out — the meeting keeps its
/// last status — and surfaces `CoreError::Timeout` to the caller.
pub async fn poll_job(
    queue: &dyn TaskQueue,
    db_path: &Path,
    correlation_id: &str,
    interval: Duration,
    max_attempts: u32,
) -> Result<TranscriptionJob> {
    for attempt in 0..max_attempts {
        if attempt > 0 {
            sleep(interval).await;
        }

        match queue.query_status(correlation_id).await {
            Ok(signal) => {
                let conn = db::open(db_path)?;
                let job = reconcile(&conn, correlation_id, &signal)?
                    .ok_or_else(|| CoreError::NotFound(format!("job {}", correlation_id)))?;

                if job.status.is_terminal() {
                    return Ok(job);
                }
            }
            Err(e) => {
                warn!(
                    "Status query {}/{} for job {} failed: {:#}",
                    attempt + 1,
                    max_attempts,
                    correlation_id,
                    e
                );
            }
        }
    }

    let conn = db::open(db_path)?;
    JobRepository::update_status(&conn, correlation_id, TranscriptionStatus::Timeout)?;

    Err(CoreError::Timeout {
        attempts: max_attempts,
    }
    .into())
}
