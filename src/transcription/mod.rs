//! Transcription pipeline: client for the external speech-to-text
//! service plus the job reconciler that advances persisted job state.

pub mod client;
pub mod reconciler;

pub use client::{AsrClient, HealthReport, HealthState};
pub use reconciler::{poll_job, reconcile, SuccessPayload, TaskSignal};

/// Outcome of submitting a meeting's audio for transcription.
///
/// The external service has two contracts observed in the wild: the newer
/// one answers with the finished transcript inline, the older one answers
/// with a job id to poll. Both are first-class variants here; a failed
/// submission is a value, not an error, so callers can record it without
/// crashing the request handler.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Synchronous shape: the service returned the transcript directly.
    Completed {
        correlation_id: String,
        transcript: String,
    },
    /// Asynchronous shape: the service issued a job id to poll.
    Accepted { correlation_id: String },
    /// Submission did not reach the service or was rejected.
    Failed { reason: String },
}

impl Submission {
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Completed { correlation_id, .. } | Self::Accepted { correlation_id } => {
                Some(correlation_id)
            }
            Self::Failed { .. } => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Accepted { .. } => "submitted",
            Self::Failed { .. } => "failed",
        }
    }
}
