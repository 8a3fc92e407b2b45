//! Transcription job persistence.
//!
//! Jobs track one attempt to transcribe a meeting's audio. The `job_id`
//! column holds the external correlation handle and is the join key for
//! status lookups against the task queue.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::meetings::{MeetingRepository, MeetingUpdate};
use super::{now_timestamp, TranscriptionStatus};

/// A transcription job record from the database.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionJob {
    pub id: i64,
    pub meeting_id: i64,
    pub job_id: String,
    pub status: TranscriptionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Repository for transcription job records.
pub struct JobRepository;

impl JobRepository {
    /// Insert a new job (status = pending) and stamp the owning meeting
    /// back to pending.
    pub fn create(conn: &Connection, meeting_id: i64, job_id: &str) -> Result<TranscriptionJob> {
        let now = now_timestamp();

        conn.execute(
            "INSERT INTO transcription_jobs (meeting_id, job_id, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                meeting_id,
                job_id,
                TranscriptionStatus::Pending.as_str(),
                now,
                now,
            ],
        )
        .context("Failed to insert transcription job")?;

        MeetingRepository::update(
            conn,
            meeting_id,
            &MeetingUpdate {
                status: Some(TranscriptionStatus::Pending),
                ..Default::default()
            },
        )?;

        Self::get(conn, job_id)?.context("Job vanished after insert")
    }

    /// Get a job by its external correlation id.
    pub fn get(conn: &Connection, job_id: &str) -> Result<Option<TranscriptionJob>> {
        conn.query_row(
            "SELECT id, meeting_id, job_id, status, created_at, updated_at \
             FROM transcription_jobs WHERE job_id = ?1",
            params![job_id],
            row_to_job,
        )
        .optional()
        .context("Failed to query transcription job")
    }

    /// List all jobs, newest first.
    pub fn list(conn: &Connection) -> Result<Vec<TranscriptionJob>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, meeting_id, job_id, status, created_at, updated_at \
                 FROM transcription_jobs ORDER BY created_at DESC, id DESC",
            )
            .context("Failed to prepare jobs list query")?;

        let rows = stmt
            .query_map([], row_to_job)
            .context("Failed to list transcription jobs")?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }

        Ok(jobs)
    }

    /// Set the job status, mirroring it onto the owning meeting.
    ///
    /// Returns `None` when no job with this correlation id exists. A write
    /// with the already-persisted status is a no-op so `updated_at` only
    /// moves on real transitions.
    pub fn update_status(
        conn: &Connection,
        job_id: &str,
        status: TranscriptionStatus,
    ) -> Result<Option<TranscriptionJob>> {
        let Some(job) = Self::get(conn, job_id)? else {
            return Ok(None);
        };

        if job.status == status {
            return Ok(Some(job));
        }

        conn.execute(
            "UPDATE transcription_jobs SET status = ?1, updated_at = ?2 WHERE job_id = ?3",
            params![status.as_str(), now_timestamp(), job_id],
        )
        .context("Failed to update transcription job status")?;

        // Timeout stays on the job: the meeting keeps its last status.
        if status != TranscriptionStatus::Timeout {
            MeetingRepository::update(
                conn,
                job.meeting_id,
                &MeetingUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )?;
        }

        Self::get(conn, job_id)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranscriptionJob> {
    let status: String = row.get(3)?;
    Ok(TranscriptionJob {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        job_id: row.get(2)?,
        status: TranscriptionStatus::parse(&status)
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
