//! Meeting CRUD, audio upload and transcription submission endpoints.

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::db::{self, MeetingCreate, MeetingRepository, MeetingUpdate};
use crate::error::CoreError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/meetings", post(create_meeting).get(list_meetings))
        .route(
            "/meetings/:id",
            get(get_meeting).patch(update_meeting).delete(delete_meeting),
        )
        .route("/meetings/:id/audio", post(upload_audio))
        .route("/meetings/:id/transcribe", post(submit_transcription))
        .with_state(state)
}

fn validate_create(body: &MeetingCreate) -> Result<(), CoreError> {
    if body.title.trim().is_empty() {
        return Err(CoreError::Validation("title must not be empty".to_string()));
    }
    if chrono::DateTime::parse_from_rfc3339(&body.date).is_err() {
        return Err(CoreError::Validation(format!(
            "date is not ISO-8601: {}",
            body.date
        )));
    }
    Ok(())
}

async fn create_meeting(
    State(state): State<AppState>,
    Json(body): Json<MeetingCreate>,
) -> ApiResult<Json<Value>> {
    validate_create(&body)?;

    let db_path = state.db_path.clone();
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::create(&conn, &body)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    info!("Created meeting {}: {}", meeting.id, meeting.title);
    Ok(Json(json!({ "meeting": meeting })))
}

async fn list_meetings(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let db_path = state.db_path.clone();
    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::list(&conn)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({ "meetings": meetings })))
}

async fn get_meeting(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let db_path = state.db_path.clone();
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::get(&conn, id)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    match meeting {
        Some(m) => Ok(Json(json!({ "meeting": m }))),
        None => Err(ApiError::not_found(format!("meeting {} not found", id))),
    }
}

async fn update_meeting(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(update): Json<MeetingUpdate>,
) -> ApiResult<Json<Value>> {
    if let Some(date) = &update.date {
        if chrono::DateTime::parse_from_rfc3339(date).is_err() {
            return Err(CoreError::Validation(format!("date is not ISO-8601: {}", date)).into());
        }
    }

    let db_path = state.db_path.clone();
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::update(&conn, id, &update)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    match meeting {
        Some(m) => Ok(Json(json!({ "meeting": m }))),
        None => Err(ApiError::not_found(format!("meeting {} not found", id))),
    }
}

async fn delete_meeting(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let db_path = state.db_path.clone();
    let deleted = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::delete(&conn, id)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    if !deleted {
        return Err(ApiError::not_found(format!("meeting {} not found", id)));
    }

    info!("Deleted meeting {} and its jobs", id);
    Ok(Json(json!({ "deleted": true, "id": id })))
}

/// Accept an uploaded audio file, store it under the audio root, and
/// record its relative path on the meeting.
async fn upload_audio(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let db_path = state.db_path.clone();
    let exists = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        Ok::<_, anyhow::Error>(MeetingRepository::get(&conn, id)?.is_some())
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    if !exists {
        return Err(ApiError::not_found(format!("meeting {} not found", id)));
    }

    // The recording arrives in a field named audio_file; skip anything else.
    let mut audio_field = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("audio_file") {
            let original_name = field.file_name().unwrap_or("audio.wav").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {}", e)))?;
            audio_field = Some((original_name, data));
            break;
        }
    }
    let (original_name, data) =
        audio_field.ok_or_else(|| ApiError::bad_request("no audio_file field in upload"))?;

    if data.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }

    let relative = format!("meeting_{}_{}", id, sanitize_filename(&original_name));
    let target = state.audio_dir.join(&relative);

    tokio::fs::create_dir_all(&state.audio_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to create audio directory: {}", e)))?;
    tokio::fs::write(&target, &data)
        .await
        .map_err(|e| ApiError::internal(format!("failed to store audio file: {}", e)))?;

    let db_path = state.db_path.clone();
    let stored = relative.clone();
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::update(
            &conn,
            id,
            &MeetingUpdate {
                audio_file: Some(stored),
                ..Default::default()
            },
        )
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    info!("Stored audio for meeting {}: {}", id, relative);
    Ok(Json(json!({
        "meeting": meeting,
        "audio_file": relative,
        "size_bytes": data.len(),
    })))
}

async fn submit_transcription(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let submission = state
        .worker
        .submit(id)
        .await
        .map_err(|e| match e.downcast_ref::<CoreError>() {
            Some(CoreError::NotFound(_)) => ApiError::not_found(e.to_string()),
            _ => ApiError::internal(e.to_string()),
        })?;

    Ok(Json(json!({
        "meeting_id": id,
        "status": submission.status(),
        "job_id": submission.correlation_id(),
    })))
}

fn sanitize_filename(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or("audio.wav");
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\a.wav"), "a.wav");
    }

    #[test]
    fn test_sanitize_filename_replaces_odd_chars() {
        assert_eq!(sanitize_filename("team call (v2).wav"), "team_call__v2_.wav");
        assert_eq!(sanitize_filename("a.wav"), "a.wav");
    }

    #[test]
    fn test_validate_create() {
        let good = MeetingCreate {
            title: "Standup".to_string(),
            date: "2025-06-01T10:00:00+00:00".to_string(),
            link: None,
        };
        assert!(validate_create(&good).is_ok());

        let blank_title = MeetingCreate {
            title: " ".to_string(),
            ..good.clone()
        };
        assert!(validate_create(&blank_title).is_err());

        let bad_date = MeetingCreate {
            date: "tomorrow".to_string(),
            ..good
        };
        assert!(validate_create(&bad_date).is_err());
    }
}
