//! Meeting record persistence.
//!
//! CRUD operations for the `meetings` table. Raw SQL with rusqlite,
//! partial updates touch only the fields the caller provided.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{now_timestamp, TranscriptionStatus};

/// A meeting record from the database.
#[derive(Debug, Clone, Serialize)]
pub struct Meeting {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub link: Option<String>,
    pub audio_file: Option<String>,
    pub transcript: Option<String>,
    pub status: TranscriptionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create a meeting.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingCreate {
    pub title: String,
    pub date: String,
    pub link: Option<String>,
}

/// Partial update: unset fields are left untouched, never nulled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub date: Option<String>,
    pub link: Option<String>,
    pub audio_file: Option<String>,
    pub transcript: Option<String>,
    pub status: Option<TranscriptionStatus>,
}

impl MeetingUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.link.is_none()
            && self.audio_file.is_none()
            && self.transcript.is_none()
            && self.status.is_none()
    }
}

/// Repository for meeting records.
pub struct MeetingRepository;

impl MeetingRepository {
    /// Insert a new meeting (status = pending). Returns the full record.
    pub fn create(conn: &Connection, meeting: &MeetingCreate) -> Result<Meeting> {
        let now = now_timestamp();

        conn.execute(
            "INSERT INTO meetings (title, date, link, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meeting.title,
                meeting.date,
                meeting.link,
                TranscriptionStatus::Pending.as_str(),
                now,
                now,
            ],
        )
        .context("Failed to insert meeting")?;

        let id = conn.last_insert_rowid();
        Self::get(conn, id)?.context("Meeting vanished after insert")
    }

    /// Get a meeting by ID.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<Meeting>> {
        conn.query_row(
            "SELECT id, title, date, link, audio_file, transcript, status, created_at, updated_at \
             FROM meetings WHERE id = ?1",
            params![id],
            row_to_meeting,
        )
        .optional()
        .context("Failed to query meeting")
    }

    /// List all meetings, newest date first.
    pub fn list(conn: &Connection) -> Result<Vec<Meeting>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, title, date, link, audio_file, transcript, status, created_at, updated_at \
                 FROM meetings ORDER BY date DESC, id DESC",
            )
            .context("Failed to prepare meetings list query")?;

        let rows = stmt
            .query_map([], row_to_meeting)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }

    /// Apply a partial update and bump `updated_at`.
    ///
    /// Returns the updated record, or `None` when the meeting does not
    /// exist. An all-empty update returns the current record unchanged.
    pub fn update(
        conn: &Connection,
        id: i64,
        update: &MeetingUpdate,
    ) -> Result<Option<Meeting>> {
        let Some(current) = Self::get(conn, id)? else {
            return Ok(None);
        };

        if update.is_empty() {
            return Ok(Some(current));
        }

        let mut fields = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(title) = &update.title {
            fields.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(date) = &update.date {
            fields.push("date = ?");
            values.push(Box::new(date.clone()));
        }
        if let Some(link) = &update.link {
            fields.push("link = ?");
            values.push(Box::new(link.clone()));
        }
        if let Some(audio_file) = &update.audio_file {
            fields.push("audio_file = ?");
            values.push(Box::new(audio_file.clone()));
        }
        if let Some(transcript) = &update.transcript {
            fields.push("transcript = ?");
            values.push(Box::new(transcript.clone()));
        }
        if let Some(status) = &update.status {
            fields.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }

        fields.push("updated_at = ?");
        values.push(Box::new(now_timestamp()));

        values.push(Box::new(id));
        let sql = format!(
            "UPDATE meetings SET {} WHERE id = ?",
            fields.join(", ")
        );

        let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.execute(&sql, value_refs.as_slice())
            .context("Failed to update meeting")?;

        Self::get(conn, id)
    }

    /// Delete a meeting and its transcription jobs.
    ///
    /// Jobs go first so no orphaned rows survive. Returns `false` when the
    /// meeting does not exist.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        if Self::get(conn, id)?.is_none() {
            return Ok(false);
        }

        conn.execute(
            "DELETE FROM transcription_jobs WHERE meeting_id = ?1",
            params![id],
        )
        .context("Failed to delete transcription jobs")?;

        conn.execute("DELETE FROM meetings WHERE id = ?1", params![id])
            .context("Failed to delete meeting")?;

        Ok(true)
    }
}

fn row_to_meeting(row: &rusqlite::Row<'_>) -> rusqlite::Result<Meeting> {
    let status: String = row.get(6)?;
    Ok(Meeting {
        id: row.get(0)?,
        title: row.get(1)?,
        date: row.get(2)?,
        link: row.get(3)?,
        audio_file: row.get(4)?,
        transcript: row.get(5)?,
        status: TranscriptionStatus::parse(&status)
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn sample_create(title: &str) -> MeetingCreate {
        MeetingCreate {
            title: title.to_string(),
            date: "2025-06-01T10:00:00+00:00".to_string(),
            link: None,
        }
    }

    #[test]
    fn test_create_meeting_starts_pending_and_empty() {
        let conn = setup_db();
        let meeting = MeetingRepository::create(&conn, &sample_create("Standup")).unwrap();

        assert!(meeting.id > 0);
        assert_eq!(meeting.title, "Standup");
        assert_eq!(meeting.status, TranscriptionStatus::Pending);
        assert!(meeting.transcript.is_none());
        assert!(meeting.audio_file.is_none());
        assert_eq!(meeting.created_at, meeting.updated_at);
    }

    #[test]
    fn test_get_nonexistent_meeting() {
        let conn = setup_db();
        assert!(MeetingRepository::get(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let conn = setup_db();
        let meeting = MeetingRepository::create(&conn, &sample_create("Planning")).unwrap();

        let updated = MeetingRepository::update(
            &conn,
            meeting.id,
            &MeetingUpdate {
                transcript: Some("X".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.title, "Planning");
        assert_eq!(updated.date, meeting.date);
        assert_eq!(updated.link, meeting.link);
        assert_eq!(updated.transcript, Some("X".to_string()));
    }

    #[test]
    fn test_update_bumps_updated_at() {
        let conn = setup_db();
        let meeting = MeetingRepository::create(&conn, &sample_create("Review")).unwrap();

        // RFC 3339 with sub-second precision, so even back-to-back writes differ
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = MeetingRepository::update(
            &conn,
            meeting.id,
            &MeetingUpdate {
                transcript: Some("notes".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

        assert_ne!(updated.updated_at, meeting.updated_at);
        assert_eq!(updated.created_at, meeting.created_at);
    }

    #[test]
    fn test_empty_update_is_noop() {
        let conn = setup_db();
        let meeting = MeetingRepository::create(&conn, &sample_create("Sync")).unwrap();

        let updated = MeetingRepository::update(&conn, meeting.id, &MeetingUpdate::default())
            .unwrap()
            .unwrap();

        assert_eq!(updated.updated_at, meeting.updated_at);
    }

    #[test]
    fn test_update_missing_meeting() {
        let conn = setup_db();
        let result = MeetingRepository::update(
            &conn,
            42,
            &MeetingUpdate {
                title: Some("Ghost".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_missing_meeting_signals_not_found() {
        let conn = setup_db();
        assert!(!MeetingRepository::delete(&conn, 42).unwrap());
    }

    #[test]
    fn test_delete_cascades_jobs() {
        let conn = setup_db();
        let meeting = MeetingRepository::create(&conn, &sample_create("Retro")).unwrap();

        crate::db::JobRepository::create(&conn, meeting.id, "job_a").unwrap();
        crate::db::JobRepository::create(&conn, meeting.id, "job_b").unwrap();

        assert!(MeetingRepository::delete(&conn, meeting.id).unwrap());

        let remaining: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM transcription_jobs WHERE meeting_id = ?1",
                params![meeting.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(MeetingRepository::get(&conn, meeting.id).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let conn = setup_db();
        let mut early = sample_create("Early");
        early.date = "2025-01-01T09:00:00+00:00".to_string();
        let mut late = sample_create("Late");
        late.date = "2025-12-01T09:00:00+00:00".to_string();

        MeetingRepository::create(&conn, &early).unwrap();
        MeetingRepository::create(&conn, &late).unwrap();

        let meetings = MeetingRepository::list(&conn).unwrap();
        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].title, "Late");
    }
}
