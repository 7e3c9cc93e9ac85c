use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Batch, Course, Material, RosterEntry, Session, SessionStatus};

#[derive(Debug, Deserialize)]
pub struct CoursesResponse {
    #[serde(default)]
    pub courses: Vec<Course>,
}

#[derive(Debug, Deserialize)]
pub struct BatchesResponse {
    #[serde(default)]
    pub batches: Vec<Batch>,
}

/// Sessions are kept as raw JSON until [`SessionsResponse::into_sessions`],
/// so one malformed record does not hide the rest of the course.
#[derive(Debug, Deserialize)]
pub struct SessionsResponse {
    #[serde(default)]
    pub sessions: Vec<serde_json::Value>,
}

impl SessionsResponse {
    pub fn into_sessions(self) -> Vec<Session> {
        self.sessions
            .into_iter()
            .filter_map(|raw| {
                let id = raw
                    .get("_id")
                    .or_else(|| raw.get("id"))
                    .and_then(|id| id.as_str())
                    .unwrap_or("<unknown>")
                    .to_string();
                serde_json::from_value::<Session>(raw)
                    .map_err(|e| warn!("Skipping session {} with unreadable fields: {}", id, e))
                    .ok()
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchDetailResponse {
    pub batch: BatchRoster,
}

#[derive(Debug, Deserialize)]
pub struct BatchRoster {
    #[serde(default)]
    pub students: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Deserialize)]
pub struct MaterialUploadResponse {
    pub session: UploadedMaterials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMaterials {
    #[serde(default)]
    pub session_materials: Vec<Material>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub present_students: Vec<String>,
    pub absent_students: Vec<String>,
}

/// Body of the session-update call. Unset optionals are left out of the JSON
/// so the stored value survives an unrelated edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdateRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_duration: Option<f64>,
    pub session_materials: Vec<Material>,
}
