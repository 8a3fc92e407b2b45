//! Background task plumbing: the task-queue abstraction, the in-process
//! signal ledger, and the transcription submission worker.

pub mod scheduler;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::db::{self, JobRepository, MeetingRepository};
use crate::error::CoreError;
use crate::transcription::{
    poll_job, reconcile, AsrClient, Submission, SuccessPayload, TaskSignal,
};

pub use scheduler::Scheduler;

/// Status-tracking substrate for background transcription work.
///
/// `query_status` answers with the queue's current view of a job;
/// `record` stores a signal so later queries see it.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn query_status(&self, correlation_id: &str) -> Result<TaskSignal>;
    async fn record(&self, correlation_id: &str, signal: TaskSignal);
}

/// In-process queue backend: a ledger of the last signal seen per job.
/// Unknown jobs read as pending.
#[derive(Default)]
pub struct InProcessQueue {
    signals: Mutex<HashMap<String, TaskSignal>>,
}

#[async_trait]
impl TaskQueue for InProcessQueue {
    async fn query_status(&self, correlation_id: &str) -> Result<TaskSignal> {
        let signals = self.signals.lock().await;
        Ok(signals
            .get(correlation_id)
            .cloned()
            .unwrap_or(TaskSignal::Pending))
    }

    async fn record(&self, correlation_id: &str, signal: TaskSignal) {
        let mut signals = self.signals.lock().await;
        signals.insert(correlation_id.to_string(), signal);
    }
}

/// Queue view backed by the external service's status endpoint.
///
/// Each query asks the service and mirrors the answer into the in-process
/// ledger, so callers that only read the ledger see the latest signal.
pub struct AsrQueue {
    client: Arc<AsrClient>,
    ledger: Arc<InProcessQueue>,
}

impl AsrQueue {
    pub fn new(client: Arc<AsrClient>, ledger: Arc<InProcessQueue>) -> Self {
        Self { client, ledger }
    }
}

#[async_trait]
impl TaskQueue for AsrQueue {
    async fn query_status(&self, correlation_id: &str) -> Result<TaskSignal> {
        let status = self.client.fetch_status(correlation_id).await?;
        let signal = TaskSignal::from_asr(&status);
        self.ledger.record(correlation_id, signal.clone()).await;
        Ok(signal)
    }

    async fn record(&self, correlation_id: &str, signal: TaskSignal) {
        self.ledger.record(correlation_id, signal).await;
    }
}

/// Submission pipeline: hands audio to the transcription client, records
/// the resulting job, and drives completion processing.
pub struct TranscriptionWorker {
    client: Arc<AsrClient>,
    queue: Arc<InProcessQueue>,
    db_path: PathBuf,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl TranscriptionWorker {
    pub fn new(
        client: Arc<AsrClient>,
        queue: Arc<InProcessQueue>,
        db_path: PathBuf,
        poll_interval: Duration,
        max_poll_attempts: u32,
    ) -> Self {
        Self {
            client,
            queue,
            db_path,
            poll_interval,
            max_poll_attempts,
        }
    }

    /// Submit transcription for a meeting's uploaded audio.
    ///
    /// A failed submission is recorded in the return value, never raised:
    /// no job row is created and the meeting is untouched. For the
    /// synchronous service shape the completion step runs immediately; for
    /// the asynchronous shape a bounded poll task is spawned.
    pub async fn submit(&self, meeting_id: i64) -> Result<Submission> {
        let audio_file = {
            let conn = db::open(&self.db_path)?;
            let meeting = MeetingRepository::get(&conn, meeting_id)?
                .ok_or_else(|| CoreError::NotFound(format!("meeting {}", meeting_id)))?;
            meeting.audio_file
        };

        let Some(audio_file) = audio_file else {
            return Ok(Submission::Failed {
                reason: format!("meeting {} has no audio file", meeting_id),
            });
        };

        let submission = self.client.submit(meeting_id, &audio_file).await;

        match &submission {
            Submission::Completed {
                correlation_id,
                transcript,
            } => {
                let conn = db::open(&self.db_path)?;
                JobRepository::create(&conn, meeting_id, correlation_id)?;

                let signal = TaskSignal::Success(SuccessPayload {
                    text: Some(transcript.clone()),
                    transcript_file: Some(self.client.transcript_file_path(meeting_id)),
                });
                self.queue.record(correlation_id, signal.clone()).await;
                reconcile(&conn, correlation_id, &signal)?;
            }
            Submission::Accepted { correlation_id } => {
                let conn = db::open(&self.db_path)?;
                JobRepository::create(&conn, meeting_id, correlation_id)?;

                self.queue.record(correlation_id, TaskSignal::Pending).await;
                self.spawn_poll(correlation_id.clone());
            }
            Submission::Failed { reason } => {
                info!(
                    "Transcription submission for meeting {} failed: {}",
                    meeting_id, reason
                );
            }
        }

        Ok(submission)
    }

    /// Reconcile a job against the queue's current signal. Used by status
    /// queries from the API layer.
    pub async fn reconcile_job(
        &self,
        correlation_id: &str,
    ) -> Result<Option<crate::db::TranscriptionJob>> {
        let signal = self.queue.query_status(correlation_id).await?;
        let conn = db::open(&self.db_path)?;
        reconcile(&conn, correlation_id, &signal)
    }

    fn spawn_poll(&self, correlation_id: String) {
        let queue = AsrQueue::new(self.client.clone(), self.queue.clone());
        let db_path = self.db_path.clone();
        let interval = self.poll_interval;
        let max_attempts = self.max_poll_attempts;

        tokio::spawn(async move {
            match poll_job(&queue, &db_path, &correlation_id, interval, max_attempts).await {
                Ok(job) => info!(
                    "Job {} reached terminal state {}",
                    correlation_id,
                    job.status.as_str()
                ),
                Err(e) => error!("Polling for job {} ended: {:#}", correlation_id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_process_queue_defaults_to_pending() {
        let queue = InProcessQueue::default();
        let signal = queue.query_status("job_unknown").await.unwrap();
        assert!(matches!(signal, TaskSignal::Pending));
    }

    #[tokio::test]
    async fn test_in_process_queue_returns_recorded_signal() {
        let queue = InProcessQueue::default();
        queue.record("job_1", TaskSignal::Started).await;

        let signal = queue.query_status("job_1").await.unwrap();
        assert!(matches!(signal, TaskSignal::Started));

        queue
            .record("job_1", TaskSignal::Failure("boom".to_string()))
            .await;
        let signal = queue.query_status("job_1").await.unwrap();
        assert!(matches!(signal, TaskSignal::Failure(_)));
    }
}
