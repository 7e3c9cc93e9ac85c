use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use session_desk::backend::{HttpSessionBackend, SessionBackend};
use session_desk::config::AppConfig;
use session_desk::error::AppError;
use session_desk::services::{MaterialStaging, StagedFile};

async fn serve(app: Router) -> HttpSessionBackend {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = AppConfig::new(format!("http://{}/api/", addr), "trainer-token".to_string(), "127.0.0.1:0").unwrap();
    HttpSessionBackend::new(&config).unwrap()
}

fn stub_backend() -> Router {
    Router::new()
        .route("/api/trainer/courses", get(|| async { "<html>maintenance</html>" }))
        .route(
            "/api/courses/{course_id}/sessions",
            get(|headers: HeaderMap| async move {
                if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer trainer-token") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "no token" })));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "sessions": [
                            { "_id": "x1", "batchId": "b1", "title": "Ownership", "recordingDuration": 45.5 },
                            { "_id": "x2", "batchId": "b1", "status": "postponed" },
                            { "_id": "x3", "batchId": { "_id": "b1" }, "title": "Traits" },
                        ]
                    })),
                )
            }),
        )
        .route(
            "/api/sessions/{session_id}/materials",
            post(|_body: Bytes| async { Json::<Value>(json!({ "session": { "sessionMaterials": [] } })) }),
        )
}

#[tokio::test]
async fn test_unreadable_response_is_a_fetch_failure() {
    let backend = serve(stub_backend()).await;

    let result = backend.assigned_courses().await;
    assert!(matches!(result, Err(AppError::Fetch(_))));
}

#[tokio::test]
async fn test_malformed_session_does_not_hide_the_others() {
    let backend = serve(stub_backend()).await;

    let sessions = backend.sessions_for_course("c1").await.unwrap();
    let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["x1", "x3"]);
    assert_eq!(sessions[0].recording_duration, Some(45.5));
}

#[tokio::test]
async fn test_upload_without_url_fails_its_slot() {
    let backend = serve(stub_backend()).await;
    let mut staging = MaterialStaging::default();
    let slot = staging.add_slot();
    staging
        .stage_file(slot, StagedFile::new("notes.pdf", vec![1u8, 2, 3]))
        .unwrap();

    let result = staging
        .resolve_all("x1", &backend, &CancellationToken::new())
        .await;

    match result {
        Err(AppError::Upload { slot: failed, message }) => {
            assert_eq!(failed, slot);
            assert!(message.contains("no material URL"));
        }
        other => panic!("expected an upload failure, got {:?}", other),
    }
    assert!(staging.staged_file(slot).is_some());
}
