//! HTTP client for the external speech-to-text service.
//!
//! The service exposes `POST /asr` (multipart audio upload), `GET /asr?id=`
//! (status of an asynchronous job) and `GET /health`. It is treated as a
//! best-effort dependency: transport failures and non-200 answers become
//! `Submission::Failed` values at the submission boundary.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

use super::Submission;
use crate::error::CoreError;

/// JSON acknowledgement from the asynchronous service variant.
#[derive(Debug, Deserialize)]
struct AsrSubmitAck {
    id: String,
}

/// Status payload from `GET /asr?id=`.
#[derive(Debug, Clone, Deserialize)]
pub struct AsrJobStatus {
    pub status: String,
    pub text: Option<String>,
}

/// Result of a health probe, stamped with the probe time.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub message: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Error,
}

pub struct AsrClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
    audio_root: PathBuf,
    transcripts_root: PathBuf,
}

impl AsrClient {
    pub fn new(
        base_url: &str,
        language: &str,
        audio_root: PathBuf,
        transcripts_root: PathBuf,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            audio_root,
            transcripts_root,
        }
    }

    /// Submit a meeting's audio file for transcription.
    ///
    /// `audio_path` is resolved against the configured audio root and must
    /// name an existing file inside it. Every failure mode comes back as
    /// `Submission::Failed` so the caller can persist it.
    pub async fn submit(&self, meeting_id: i64, audio_path: &str) -> Submission {
        info!(
            "Submitting transcription for meeting {}, audio: {}",
            meeting_id, audio_path
        );

        let full_path = match self.resolve_audio_path(audio_path) {
            Ok(path) => path,
            Err(reason) => {
                error!("{}", reason);
                return Submission::Failed { reason };
            }
        };

        if !full_path.is_file() {
            let reason = format!("Audio file not found: {}", full_path.display());
            error!("{}", reason);
            return Submission::Failed { reason };
        }

        match self.post_audio(&full_path).await {
            Ok(body) => self.interpret_response(meeting_id, body).await,
            Err(e) => {
                let reason = format!("Error submitting transcription: {:#}", e);
                error!("{}", reason);
                Submission::Failed { reason }
            }
        }
    }

    async fn post_audio(&self, full_path: &Path) -> Result<String> {
        let file_data = fs::read(full_path)
            .await
            .context("Failed to read audio file")?;

        let filename = full_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        let form = Form::new()
            .part("audio_file", Part::bytes(file_data).file_name(filename))
            .text("task", "transcribe")
            .text("language", self.language.clone())
            .text("output", "txt");

        let response = self
            .client
            .post(format!("{}/asr", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Failed to reach transcription service")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("service returned {}: {}", status, body);
        }

        Ok(body)
    }

    /// A 200 body is either a JSON job acknowledgement (asynchronous
    /// variant) or the finished transcript as plain text (synchronous
    /// variant). The service issues no id in the synchronous case, so we
    /// mint a local `job_`-prefixed one.
    async fn interpret_response(&self, meeting_id: i64, body: String) -> Submission {
        if let Ok(ack) = serde_json::from_str::<AsrSubmitAck>(&body) {
            info!("Transcription job accepted by service: {}", ack.id);
            return Submission::Accepted {
                correlation_id: ack.id,
            };
        }

        let correlation_id = format!("job_{}", uuid::Uuid::new_v4());
        debug!(
            "Synchronous transcript received ({} chars), correlation id {}",
            body.len(),
            correlation_id
        );

        if let Err(e) = self.write_transcript_file(meeting_id, &body).await {
            let reason = format!("Failed to persist transcript: {:#}", e);
            error!("{}", reason);
            return Submission::Failed { reason };
        }

        Submission::Completed {
            correlation_id,
            transcript: body,
        }
    }

    /// Poll the status of an asynchronous job.
    pub async fn fetch_status(&self, correlation_id: &str) -> Result<AsrJobStatus> {
        let response = self
            .client
            .get(format!("{}/asr", self.base_url))
            .query(&[("id", correlation_id)])
            .send()
            .await
            .map_err(|e| CoreError::ExternalService(format!("service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::ExternalService(format!("status query returned {}", status)).into());
        }

        response
            .json::<AsrJobStatus>()
            .await
            .context("Failed to parse status response")
    }

    /// Probe the service's health endpoint. No job-state side effects.
    pub async fn health(&self) -> HealthReport {
        let timestamp = chrono::Utc::now().to_rfc3339();

        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => HealthReport {
                status: HealthState::Healthy,
                message: None,
                timestamp,
            },
            Ok(response) => {
                let code = response.status();
                let body = response.text().await.unwrap_or_default();
                HealthReport {
                    status: HealthState::Unhealthy,
                    message: Some(format!("health check failed with {}: {}", code, body)),
                    timestamp,
                }
            }
            Err(e) => HealthReport {
                status: HealthState::Error,
                message: Some(format!("health check error: {}", e)),
                timestamp,
            },
        }
    }

    /// Side-file path for a meeting's transcript, named deterministically.
    pub fn transcript_file_path(&self, meeting_id: i64) -> PathBuf {
        self.transcripts_root
            .join(format!("meeting_{}_transcript.txt", meeting_id))
    }

    async fn write_transcript_file(&self, meeting_id: i64, transcript: &str) -> Result<()> {
        fs::create_dir_all(&self.transcripts_root)
            .await
            .context("Failed to create transcripts directory")?;

        let path = self.transcript_file_path(meeting_id);
        fs::write(&path, transcript)
            .await
            .context("Failed to write transcript file")?;

        info!("Transcript saved to {:?}", path);
        Ok(())
    }

    fn resolve_audio_path(&self, audio_path: &str) -> std::result::Result<PathBuf, String> {
        let relative = Path::new(audio_path);

        if relative.is_absolute() {
            return Err(format!("Audio path must be relative: {}", audio_path));
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(format!("Audio path escapes audio root: {}", audio_path));
        }

        Ok(self.audio_root.join(relative))
    }
}
