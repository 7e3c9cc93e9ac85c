mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use session_desk::error::AppError;
use session_desk::models::{Material, MaterialType};
use session_desk::services::{MaterialStaging, SlotEdit, StagedFile};

use common::FakeBackend;

fn pdf(name: &str) -> StagedFile {
    StagedFile::new(name, vec![0u8; 16])
}

/// Four slots: files on 0, 2 and 3, a typed-in link on 1.
fn four_slots() -> MaterialStaging {
    let mut staging = MaterialStaging::default();
    for _ in 0..4 {
        staging.add_slot();
    }
    staging.update_slot(1, SlotEdit::Kind(MaterialType::Link)).unwrap();
    staging
        .update_slot(1, SlotEdit::Url("https://example.com/reading".to_string()))
        .unwrap();
    staging.stage_file(0, pdf("zero.pdf")).unwrap();
    staging.stage_file(2, pdf("two.pdf")).unwrap();
    staging.stage_file(3, pdf("three.pdf")).unwrap();
    staging
}

#[tokio::test]
async fn test_removed_slot_file_is_never_uploaded() {
    let backend = FakeBackend::seeded();
    let mut staging = MaterialStaging::default();
    staging.add_slot();
    staging.add_slot();
    staging.stage_file(0, pdf("dropped.pdf")).unwrap();
    staging.stage_file(1, pdf("kept.pdf")).unwrap();

    staging.remove_slot(0).unwrap();
    assert_eq!(staging.staged_file(0).unwrap().file_name, "kept.pdf");

    let resolved = staging
        .resolve_all("x1", &backend, &CancellationToken::new())
        .await
        .unwrap();

    let attempts = backend.state.lock().unwrap().upload_attempts.clone();
    assert_eq!(attempts, vec!["kept.pdf"]);
    assert_eq!(resolved.as_slice().len(), 1);
    assert_eq!(resolved.as_slice()[0].url, "https://cdn.test/x1/kept.pdf");
}

#[tokio::test]
async fn test_uploads_run_in_slot_order() {
    let backend = FakeBackend::seeded();
    let mut staging = four_slots();

    let resolved = staging
        .resolve_all("x1", &backend, &CancellationToken::new())
        .await
        .unwrap();

    let attempts = backend.state.lock().unwrap().upload_attempts.clone();
    assert_eq!(attempts, vec!["zero.pdf", "two.pdf", "three.pdf"]);

    let urls: Vec<&str> = resolved.as_slice().iter().map(|m| m.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.test/x1/zero.pdf",
            "https://example.com/reading",
            "https://cdn.test/x1/two.pdf",
            "https://cdn.test/x1/three.pdf",
        ]
    );
    assert!(staging.pending().is_empty());
}

#[tokio::test]
async fn test_failed_upload_stops_pipeline_and_names_slot() {
    let backend = FakeBackend::seeded();
    backend.with_state(|state| {
        state.fail_uploads.insert("two.pdf".to_string());
    });
    let mut staging = four_slots();

    let result = staging
        .resolve_all("x1", &backend, &CancellationToken::new())
        .await;

    match result {
        Err(AppError::Upload { slot, .. }) => assert_eq!(slot, 2),
        other => panic!("expected upload failure, got {:?}", other),
    }
    let attempts = backend.state.lock().unwrap().upload_attempts.clone();
    assert_eq!(attempts, vec!["zero.pdf", "two.pdf"]);

    // Slot 0 keeps its URL; slots 2 and 3 are still pending.
    assert_eq!(staging.slots()[0].url, "https://cdn.test/x1/zero.pdf");
    let pending: Vec<usize> = staging.pending().iter().map(|p| p.slot).collect();
    assert_eq!(pending, vec![2, 3]);
}

#[tokio::test]
async fn test_retry_only_uploads_what_is_still_pending() {
    let backend = FakeBackend::seeded();
    backend.with_state(|state| {
        state.fail_uploads.insert("two.pdf".to_string());
    });
    let mut staging = four_slots();
    let cancel = CancellationToken::new();

    assert!(staging.resolve_all("x1", &backend, &cancel).await.is_err());

    backend.with_state(|state| state.fail_uploads.clear());
    let resolved = staging.resolve_all("x1", &backend, &cancel).await.unwrap();

    let attempts = backend.state.lock().unwrap().upload_attempts.clone();
    assert_eq!(attempts, vec!["zero.pdf", "two.pdf", "two.pdf", "three.pdf"]);
    assert!(resolved.as_slice().iter().all(Material::is_resolved));
}

#[tokio::test]
async fn test_cancelled_token_uploads_nothing() {
    let backend = FakeBackend::seeded();
    let mut staging = four_slots();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = staging.resolve_all("x1", &backend, &cancel).await;

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert!(backend.state.lock().unwrap().upload_attempts.is_empty());
    assert_eq!(staging.pending().len(), 3);
}

#[tokio::test]
async fn test_cancel_aborts_upload_in_flight() {
    let backend = FakeBackend::seeded();
    backend.with_state(|state| state.upload_delay = Some(Duration::from_secs(30)));
    let mut staging = four_slots();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        staging.resolve_all("x1", &backend, &cancel),
    )
    .await
    .expect("cancellation should end the pipeline");

    assert!(matches!(result, Err(AppError::Cancelled)));
    let state = backend.state.lock().unwrap();
    assert_eq!(state.upload_attempts, vec!["zero.pdf"]);
    assert!(backend_has_no_uploaded_material(&state));
}

fn backend_has_no_uploaded_material(state: &common::FakeState) -> bool {
    state
        .sessions
        .values()
        .flatten()
        .flat_map(|s| s.session_materials.iter())
        .all(|m| !m.url.starts_with("https://cdn.test/"))
}

#[tokio::test]
async fn test_link_slot_with_staged_file_is_uploaded_too() {
    let backend = FakeBackend::seeded();
    let mut staging = MaterialStaging::default();
    let slot = staging.add_slot();
    staging.stage_file(slot, pdf("slides.pdf")).unwrap();
    staging.update_slot(slot, SlotEdit::Kind(MaterialType::Link)).unwrap();

    let resolved = staging
        .resolve_all("x1", &backend, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolved.as_slice()[0].title, "slides.pdf");
    assert_eq!(resolved.as_slice()[0].url, "https://cdn.test/x1/slides.pdf");
}
