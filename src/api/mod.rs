use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path};
use axum::routing::{delete, patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Batch, Course, Session};
use crate::services::attendance::{AttendancePartition, SheetView};
use crate::services::committer::EditorView;
use crate::services::{
    AttendanceReconciler, HierarchyLoader, Loaded, SessionEditor, SessionForm, SlotEdit,
    StagedFile,
};
use crate::state::{AppState, OpenEditor};

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAttendanceRequest {
    batch_id: String,
    session_id: String,
}

#[derive(Serialize)]
struct SheetResponse {
    id: Uuid,
    #[serde(flatten)]
    sheet: SheetView,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenEditorRequest {
    session_id: String,
    #[serde(default)]
    course_id: Option<String>,
}

#[derive(Serialize)]
struct EditorResponse {
    id: Uuid,
    #[serde(flatten)]
    editor: EditorView,
}

#[derive(Serialize)]
struct SaveResponse {
    session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    sessions: Option<Loaded<Session>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{course_id}/batches", get(list_batches))
        .route(
            "/courses/{course_id}/batches/{batch_id}/sessions",
            get(list_batch_sessions),
        )
        .route("/sessions/{session_id}", delete(delete_session))
        .route("/attendance", post(open_attendance))
        .route("/attendance/{id}", get(show_attendance).delete(close_attendance))
        .route("/attendance/{id}/toggle/{student_id}", post(toggle_student))
        .route("/attendance/{id}/select-all", post(select_all))
        .route("/attendance/{id}/clear-all", post(clear_all))
        .route("/attendance/{id}/submit", post(submit_attendance))
        .route("/editors", post(open_editor))
        .route("/editors/{id}", get(show_editor).delete(close_editor))
        .route("/editors/{id}/fields", patch(update_fields))
        .route("/editors/{id}/slots", post(add_slot))
        .route(
            "/editors/{id}/slots/{index}",
            patch(update_slot).delete(remove_slot),
        )
        .route(
            "/editors/{id}/slots/{index}/file",
            post(stage_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/editors/{id}/save", post(save_editor))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_courses(State(state): State<AppState>) -> Json<Loaded<Course>> {
    let loader = HierarchyLoader::new(state.backend.clone());
    Json(loader.list_assigned_courses().await)
}

async fn list_batches(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Json<Loaded<Batch>> {
    let loader = HierarchyLoader::new(state.backend.clone());
    Json(loader.list_batches(&course_id).await)
}

async fn list_batch_sessions(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(String, String)>,
) -> Json<Loaded<Session>> {
    let loader = HierarchyLoader::new(state.backend.clone());
    Json(loader.sessions_for_batch(&course_id, &batch_id).await)
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.backend.delete_session(&session_id).await?;
    info!("Deleted session {}", session_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn open_attendance(
    State(state): State<AppState>,
    Json(req): Json<OpenAttendanceRequest>,
) -> Json<SheetResponse> {
    let reconciler = AttendanceReconciler::new(state.backend.clone());
    let sheet = reconciler.open(&req.batch_id, &req.session_id).await;
    let view = sheet.view();
    let (id, _) = state.sheets.insert(Mutex::new(sheet)).await;

    Json(SheetResponse { id, sheet: view })
}

async fn sheet_response(state: &AppState, id: Uuid) -> Result<Json<SheetResponse>, AppError> {
    let sheet = state.sheets.get(&id).await?;
    let view = sheet.lock().await.view();
    Ok(Json(SheetResponse { id, sheet: view }))
}

async fn show_attendance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SheetResponse>, AppError> {
    sheet_response(&state, id).await
}

async fn close_attendance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sheets.remove(&id).await.ok_or(AppError::NotFound)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_student(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(Uuid, String)>,
) -> Result<Json<SheetResponse>, AppError> {
    state.sheets.get(&id).await?.lock().await.toggle(&student_id)?;
    sheet_response(&state, id).await
}

async fn select_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SheetResponse>, AppError> {
    state.sheets.get(&id).await?.lock().await.select_all()?;
    sheet_response(&state, id).await
}

async fn clear_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SheetResponse>, AppError> {
    state.sheets.get(&id).await?.lock().await.clear_all()?;
    sheet_response(&state, id).await
}

/// Closes the sheet on success; on failure it stays open with the selection.
async fn submit_attendance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AttendancePartition>, AppError> {
    let sheet = state.sheets.get(&id).await?;
    let reconciler = AttendanceReconciler::new(state.backend.clone());

    let partition = {
        let mut sheet = sheet.lock().await;
        reconciler.submit(&mut sheet).await?
    };
    state.sheets.remove(&id).await;

    Ok(Json(partition))
}

async fn open_editor(
    State(state): State<AppState>,
    Json(req): Json<OpenEditorRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    let session = state
        .backend
        .session_detail(&req.session_id)
        .await
        .map_err(|e| AppError::Fetch(e.to_string()))?;

    let editor = SessionEditor::new(&session);
    let view = editor.view();
    let (id, _) = state
        .editors
        .insert(OpenEditor::new(editor, req.course_id))
        .await;
    info!("Opened editor {} for session {}", id, session.id);

    Ok(Json(EditorResponse { id, editor: view }))
}

async fn editor_response(state: &AppState, id: Uuid) -> Result<Json<EditorResponse>, AppError> {
    let open = state.editors.get(&id).await?;
    let view = open.editor.lock().await.view();
    Ok(Json(EditorResponse { id, editor: view }))
}

async fn show_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditorResponse>, AppError> {
    editor_response(&state, id).await
}

/// Discards the draft and aborts a save that is still running.
async fn close_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let open = state.editors.remove(&id).await.ok_or(AppError::NotFound)?;
    open.cancel.cancel();
    info!("Closed editor {}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn update_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<SessionForm>,
) -> Result<Json<EditorResponse>, AppError> {
    state.editors.get(&id).await?.editor.lock().await.apply_form(form)?;
    editor_response(&state, id).await
}

async fn add_slot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditorResponse>, AppError> {
    state
        .editors
        .get(&id)
        .await?
        .editor
        .lock()
        .await
        .staging_mut()
        .add_slot();
    editor_response(&state, id).await
}

async fn update_slot(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(edit): Json<SlotEdit>,
) -> Result<Json<EditorResponse>, AppError> {
    state
        .editors
        .get(&id)
        .await?
        .editor
        .lock()
        .await
        .staging_mut()
        .update_slot(index, edit)?;
    editor_response(&state, id).await
}

async fn remove_slot(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<EditorResponse>, AppError> {
    state
        .editors
        .get(&id)
        .await?
        .editor
        .lock()
        .await
        .staging_mut()
        .remove_slot(index)?;
    editor_response(&state, id).await
}

async fn stage_file(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    mut multipart: Multipart,
) -> Result<Json<EditorResponse>, AppError> {
    let mut staged = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;

        let file = StagedFile::new(&file_name, bytes);
        staged = Some(match content_type {
            Some(content_type) => file.with_content_type(&content_type),
            None => file,
        });
    }

    let file = staged.ok_or_else(|| AppError::BadRequest("No file field in upload".to_string()))?;
    state
        .editors
        .get(&id)
        .await?
        .editor
        .lock()
        .await
        .staging_mut()
        .stage_file(index, file)?;
    editor_response(&state, id).await
}

/// Saves the draft. The editor closes on success and the active batch's
/// sessions are reloaded; on failure the draft stays open for a retry.
async fn save_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveResponse>, AppError> {
    let open = state.editors.get(&id).await?;

    let (session, batch_id) = {
        let mut editor = open.editor.lock().await;
        let session = editor.save(state.backend.as_ref()).await?;
        (session, editor.batch_id().map(str::to_string))
    };
    state.editors.remove(&id).await;

    let sessions = match (open.course_id.as_deref(), batch_id.as_deref()) {
        (Some(course_id), Some(batch_id)) => {
            let loader = HierarchyLoader::new(state.backend.clone());
            Some(loader.sessions_for_batch(course_id, batch_id).await)
        }
        _ => None,
    };

    Ok(Json(SaveResponse { session, sessions }))
}
