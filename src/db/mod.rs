//! SQLite persistence layer.
//!
//! Raw SQL with rusqlite, no ORM. Every logical operation opens a
//! connection, uses it, and drops it — no long-held handles. Timestamps
//! are ISO-8601 strings assigned here, never by callers.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod jobs;
pub mod meetings;

pub use jobs::{JobRepository, TranscriptionJob};
pub use meetings::{Meeting, MeetingCreate, MeetingRepository, MeetingUpdate};

/// Lifecycle status shared by meetings and transcription jobs.
///
/// A meeting mirrors the furthest-progressed job that owns it. `Timeout`
/// is terminal for jobs whose status polls were exhausted; it is never
/// mirrored onto the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Timeout,
}

impl TranscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            _ => anyhow::bail!("Invalid transcription status: {}", s),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

/// Current time as the store's canonical timestamp format.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Open a connection to the database at `path`, running migrations.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            link TEXT,
            audio_file TEXT,
            transcript TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_date ON meetings(date DESC)",
        [],
    )
    .context("Failed to create meetings date index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transcription_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meeting_id INTEGER NOT NULL,
            job_id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (meeting_id) REFERENCES meetings (id)
        )",
        [],
    )
    .context("Failed to create transcription_jobs table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_jobs_meeting_id ON transcription_jobs(meeting_id)",
        [],
    )
    .context("Failed to create jobs meeting_id index")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('meetings', 'transcription_jobs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TranscriptionStatus::Pending,
            TranscriptionStatus::Processing,
            TranscriptionStatus::Completed,
            TranscriptionStatus::Failed,
            TranscriptionStatus::Timeout,
        ] {
            assert_eq!(TranscriptionStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!(TranscriptionStatus::parse("cancelled").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TranscriptionStatus::Pending.is_terminal());
        assert!(!TranscriptionStatus::Processing.is_terminal());
        assert!(TranscriptionStatus::Completed.is_terminal());
        assert!(TranscriptionStatus::Failed.is_terminal());
        assert!(TranscriptionStatus::Timeout.is_terminal());
    }
}
