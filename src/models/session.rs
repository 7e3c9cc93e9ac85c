use serde::{Deserialize, Serialize};

use super::course::IdRef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Live,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    #[default]
    Document,
    Video,
    Image,
    Link,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "type", default)]
    pub kind: MaterialType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl Material {
    /// A material is resolved once it carries a URL the backend can serve.
    pub fn is_resolved(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    #[serde(alias = "student")]
    pub student_id: IdRef,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "batch")]
    pub batch_id: Option<IdRef>,
    #[serde(default, alias = "sessionTitle")]
    pub title: String,
    #[serde(default)]
    pub session_number: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub recording_duration: Option<f64>,
    #[serde(default)]
    pub session_materials: Vec<Material>,
    #[serde(default)]
    pub attendance: Vec<AttendanceEntry>,
}

impl Session {
    /// Bare batch id, whichever form the backend used.
    pub fn batch_key(&self) -> Option<&str> {
        self.batch_id.as_ref().map(IdRef::id)
    }

    pub fn has_attendance(&self) -> bool {
        !self.attendance.is_empty()
    }

    pub fn present_student_ids(&self) -> impl Iterator<Item = &str> {
        self.attendance
            .iter()
            .filter(|entry| entry.status == AttendanceStatus::Present)
            .map(|entry| entry.student_id.id())
    }
}
