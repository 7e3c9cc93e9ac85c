#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use session_desk::backend::SessionBackend;
use session_desk::backend::dto::{AttendanceRequest, SessionUpdateRequest};
use session_desk::error::AppError;
use session_desk::models::{
    AttendanceEntry, AttendanceStatus, Batch, Course, IdRef, Material, MaterialType, RosterEntry,
    Session,
};
use session_desk::services::StagedFile;

/// In-memory stand-in for the platform backend. It keeps server-side state
/// the way the real one does and records every mutating call.
#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub courses: Vec<Course>,
    pub batches: HashMap<String, Vec<Batch>>,
    pub sessions: HashMap<String, Vec<Session>>,
    pub rosters: HashMap<String, Vec<RosterEntry>>,

    pub fail_reads: bool,
    pub fail_session_detail: bool,
    pub fail_attendance: bool,
    pub fail_update: bool,
    pub fail_uploads: HashSet<String>,
    pub upload_delay: Option<Duration>,

    pub upload_attempts: Vec<String>,
    pub attendance_requests: Vec<AttendanceRequest>,
    pub update_bodies: Vec<serde_json::Value>,
    pub deleted: Vec<String>,
}

pub fn student(id: &str) -> RosterEntry {
    RosterEntry {
        id: id.to_string(),
        first_name: id.to_string(),
        last_name: "Student".to_string(),
        email: format!("{}@example.com", id.to_lowercase()),
    }
}

pub fn session(value: serde_json::Value) -> Session {
    serde_json::from_value(value).expect("valid session fixture")
}

impl FakeBackend {
    /// One course `c1`, one batch `b1` with students S1..S3 and two sessions:
    /// `x1` (batch given as a bare id) and `x2` (batch embedded).
    pub fn seeded() -> Self {
        let backend = FakeBackend::default();
        {
            let mut state = backend.state.lock().unwrap();
            state.courses.push(Course {
                id: "c1".to_string(),
                name: "Rust Fundamentals".to_string(),
                duration: None,
            });
            state.batches.insert(
                "c1".to_string(),
                vec![Batch {
                    id: "b1".to_string(),
                    course_id: Some(IdRef::from("c1")),
                    name: "Morning".to_string(),
                    students: vec![student("S1"), student("S2"), student("S3")],
                }],
            );
            state.rosters.insert(
                "b1".to_string(),
                vec![student("S1"), student("S2"), student("S3")],
            );
            state.sessions.insert(
                "c1".to_string(),
                vec![
                    session(json!({
                        "_id": "x1",
                        "batchId": "b1",
                        "title": "Ownership",
                        "sessionNumber": 5,
                        "date": "2024-05-01T00:00:00.000Z",
                        "status": "scheduled",
                        "sessionMaterials": [
                            { "type": "link", "title": "Book", "url": "https://doc.rust-lang.org/book/" }
                        ],
                    })),
                    session(json!({
                        "_id": "x2",
                        "batchId": { "_id": "b1", "batchName": "Morning" },
                        "title": "Borrowing",
                        "status": "completed",
                    })),
                    session(json!({
                        "_id": "x3",
                        "batchId": "b2",
                        "title": "Other batch",
                    })),
                ],
            );
        }
        backend
    }

    pub fn with_state(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn stored_session(&self, session_id: &str) -> Session {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .values()
            .flatten()
            .find(|s| s.id == session_id)
            .cloned()
            .expect("session exists")
    }
}

fn read_failure() -> AppError {
    AppError::Backend {
        status: 503,
        body: "unavailable".to_string(),
    }
}

fn find_session<'a>(state: &'a mut FakeState, session_id: &str) -> Result<&'a mut Session, AppError> {
    state
        .sessions
        .values_mut()
        .flatten()
        .find(|s| s.id == session_id)
        .ok_or(AppError::Backend {
            status: 404,
            body: "session not found".to_string(),
        })
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn assigned_courses(&self) -> Result<Vec<Course>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(read_failure());
        }
        Ok(state.courses.clone())
    }

    async fn batches_for_course(&self, course_id: &str) -> Result<Vec<Batch>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(read_failure());
        }
        Ok(state.batches.get(course_id).cloned().unwrap_or_default())
    }

    async fn sessions_for_course(&self, course_id: &str) -> Result<Vec<Session>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(read_failure());
        }
        Ok(state.sessions.get(course_id).cloned().unwrap_or_default())
    }

    async fn batch_roster(&self, batch_id: &str) -> Result<Vec<RosterEntry>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(read_failure());
        }
        Ok(state.rosters.get(batch_id).cloned().unwrap_or_default())
    }

    async fn session_detail(&self, session_id: &str) -> Result<Session, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reads || state.fail_session_detail {
            return Err(read_failure());
        }
        find_session(&mut state, session_id).cloned()
    }

    async fn submit_attendance(
        &self,
        _batch_id: &str,
        session_id: &str,
        request: &AttendanceRequest,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.attendance_requests.push(request.clone());
        if state.fail_attendance {
            return Err(AppError::Backend {
                status: 500,
                body: "attendance rejected".to_string(),
            });
        }

        let entries: Vec<AttendanceEntry> = request
            .present_students
            .iter()
            .map(|id| (id, AttendanceStatus::Present))
            .chain(request.absent_students.iter().map(|id| (id, AttendanceStatus::Absent)))
            .map(|(id, status)| AttendanceEntry {
                student_id: IdRef::Embedded { id: id.clone() },
                status,
            })
            .collect();
        find_session(&mut state, session_id)?.attendance = entries;
        Ok(())
    }

    async fn upload_material(&self, session_id: &str, file: &StagedFile) -> Result<Vec<Material>, AppError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.upload_attempts.push(file.file_name.clone());
            state.upload_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_uploads.contains(&file.file_name) {
            return Err(AppError::Backend {
                status: 413,
                body: "file too large".to_string(),
            });
        }

        let session = find_session(&mut state, session_id)?;
        session.session_materials.push(Material {
            kind: MaterialType::Document,
            title: file.file_name.clone(),
            url: format!("https://cdn.test/{}/{}", session_id, file.file_name),
        });
        Ok(session.session_materials.clone())
    }

    async fn update_session(
        &self,
        session_id: &str,
        request: &SessionUpdateRequest,
    ) -> Result<Session, AppError> {
        let mut state = self.state.lock().unwrap();
        state
            .update_bodies
            .push(serde_json::to_value(request).expect("serializable request"));
        if state.fail_update {
            return Err(AppError::Backend {
                status: 500,
                body: "update rejected".to_string(),
            });
        }

        let session = find_session(&mut state, session_id)?;
        session.title = request.title.clone();
        if request.session_number.is_some() {
            session.session_number = request.session_number;
        }
        if request.recording_duration.is_some() {
            session.recording_duration = request.recording_duration;
        }
        if request.description.is_some() {
            session.description = request.description.clone();
        }
        if request.date.is_some() {
            session.date = request.date.clone();
        }
        session.status = request.status;
        session.session_materials = request.session_materials.clone();
        Ok(session.clone())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(session_id.to_string());
        for sessions in state.sessions.values_mut() {
            sessions.retain(|s| s.id != session_id);
        }
        Ok(())
    }
}
