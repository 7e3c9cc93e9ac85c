use serde::{Deserialize, Serialize};

/// Reference to another record. The backend sends either the bare id or the
/// populated document, depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    Bare(String),
    Embedded {
        #[serde(alias = "_id")]
        id: String,
    },
}

impl IdRef {
    pub fn id(&self) -> &str {
        match self {
            IdRef::Bare(id) => id,
            IdRef::Embedded { id } => id,
        }
    }
}

impl From<&str> for IdRef {
    fn from(id: &str) -> Self {
        IdRef::Bare(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CourseDuration {
    Span { value: f64, unit: String },
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "courseName", alias = "title")]
    pub name: String,
    #[serde(default)]
    pub duration: Option<CourseDuration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl RosterEntry {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "course")]
    pub course_id: Option<IdRef>,
    #[serde(default, alias = "batchName")]
    pub name: String,
    #[serde(default)]
    pub students: Vec<RosterEntry>,
}
