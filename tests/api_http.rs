//! HTTP surface tests: the axum router served on an ephemeral port,
//! exercised with a real client.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use protokoll::api::{ApiServer, AppState};
use protokoll::tasks::{InProcessQueue, TranscriptionWorker};
use protokoll::transcription::AsrClient;

struct TestServer {
    _dir: tempfile::TempDir,
    base: String,
    audio_dir: PathBuf,
}

async fn spawn_server(asr_router: axum::Router) -> TestServer {
    // Mock ASR service
    let asr_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let asr_addr: SocketAddr = asr_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(asr_listener, asr_router).await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("meetings.db");
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();

    let client = Arc::new(AsrClient::new(
        &format!("http://{}", asr_addr),
        "de",
        audio_dir.clone(),
        dir.path().join("transcripts"),
    ));
    let worker = Arc::new(TranscriptionWorker::new(
        client.clone(),
        Arc::new(InProcessQueue::default()),
        db_path.clone(),
        Duration::from_millis(10),
        3,
    ));

    let state = AppState {
        db_path,
        audio_dir: audio_dir.clone(),
        worker,
        client,
        max_body_bytes: 64 * 1024 * 1024,
    };

    let app = ApiServer::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        _dir: dir,
        base: format!("http://{}", addr),
        audio_dir,
    }
}

fn sync_asr() -> axum::Router {
    axum::Router::new().route("/asr", axum::routing::post(|| async { "hello world" }))
}

async fn create_meeting(http: &reqwest::Client, base: &str) -> i64 {
    let body: Value = http
        .post(format!("{}/meetings", base))
        .json(&json!({ "title": "Standup", "date": "2025-06-01T10:00:00+00:00" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["meeting"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn meeting_crud_round_trip() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let id = create_meeting(&http, &server.base).await;

    // Fresh meeting: pending, no transcript, no audio
    let body: Value = http
        .get(format!("{}/meetings/{}", server.base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meeting"]["status"], "pending");
    assert!(body["meeting"]["transcript"].is_null());
    assert!(body["meeting"]["audio_file"].is_null());

    // Partial update keeps other fields
    let body: Value = http
        .patch(format!("{}/meetings/{}", server.base, id))
        .json(&json!({ "transcript": "X" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meeting"]["transcript"], "X");
    assert_eq!(body["meeting"]["title"], "Standup");

    // List contains it
    let body: Value = http
        .get(format!("{}/meetings", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meetings"].as_array().unwrap().len(), 1);

    // Delete, then 404
    let response = http
        .delete(format!("{}/meetings/{}", server.base, id))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = http
        .get(format!("{}/meetings/{}", server.base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_bad_payloads() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/meetings", server.base))
        .json(&json!({ "title": "", "date": "2025-06-01T10:00:00+00:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http
        .post(format!("{}/meetings", server.base))
        .json(&json!({ "title": "Standup", "date": "next tuesday" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_missing_meeting_is_not_found() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let response = http
        .delete(format!("{}/meetings/999", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_then_transcribe_flows_to_completed() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let id = create_meeting(&http, &server.base).await;

    let part = reqwest::multipart::Part::bytes(b"RIFF....".to_vec()).file_name("a.wav");
    let form = reqwest::multipart::Form::new().part("audio_file", part);
    let body: Value = http
        .post(format!("{}/meetings/{}/audio", server.base, id))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let stored = body["audio_file"].as_str().unwrap().to_string();
    assert!(server.audio_dir.join(&stored).is_file());

    let body: Value = http
        .post(format!("{}/meetings/{}/transcribe", server.base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "completed");
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("job_"));

    // Job status query reconciles and answers with the persisted job
    let body: Value = http
        .get(format!("{}/jobs/{}", server.base, job_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["job"]["status"], "completed");

    let body: Value = http
        .get(format!("{}/meetings/{}", server.base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meeting"]["transcript"], "hello world");
    assert_eq!(body["meeting"]["status"], "completed");
}

#[tokio::test]
async fn upload_accepts_multi_megabyte_recordings() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let id = create_meeting(&http, &server.base).await;

    // Well past axum's stock 2 MB body cap
    let recording = vec![0u8; 3 * 1024 * 1024];
    let part = reqwest::multipart::Part::bytes(recording).file_name("long_meeting.wav");
    let form = reqwest::multipart::Form::new().part("audio_file", part);
    let response = http
        .post(format!("{}/meetings/{}/audio", server.base, id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["size_bytes"].as_u64().unwrap(), 3 * 1024 * 1024);
    let stored = body["audio_file"].as_str().unwrap();
    assert!(server.audio_dir.join(stored).is_file());
}

#[tokio::test]
async fn upload_picks_the_audio_file_field() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let id = create_meeting(&http, &server.base).await;

    // An unrelated leading field must not be stored as the recording
    let part = reqwest::multipart::Part::bytes(b"RIFF....".to_vec()).file_name("real.wav");
    let form = reqwest::multipart::Form::new()
        .text("note", "weekly sync")
        .part("audio_file", part);
    let body: Value = http
        .post(format!("{}/meetings/{}/audio", server.base, id))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let stored = body["audio_file"].as_str().unwrap();
    assert!(stored.ends_with("real.wav"));
    assert_eq!(
        std::fs::read(server.audio_dir.join(stored)).unwrap(),
        b"RIFF...."
    );
}

#[tokio::test]
async fn upload_without_audio_file_field_is_rejected() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let id = create_meeting(&http, &server.base).await;

    let form = reqwest::multipart::Form::new().text("note", "no recording here");
    let response = http
        .post(format!("{}/meetings/{}/audio", server.base, id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transcribe_without_audio_reports_failed() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let id = create_meeting(&http, &server.base).await;

    let body: Value = http
        .post(format!("{}/meetings/{}/transcribe", server.base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "failed");
    assert!(body["job_id"].is_null());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let server = spawn_server(sync_asr()).await;
    let http = reqwest::Client::new();

    let response = http
        .get(format!("{}/jobs/job_nope", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_endpoint_reports_service_state() {
    let asr = axum::Router::new().route("/health", axum::routing::get(|| async { "ok" }));
    let server = spawn_server(asr).await;
    let http = reqwest::Client::new();

    let body: Value = http
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}
