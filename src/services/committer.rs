use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::SessionBackend;
use crate::backend::dto::SessionUpdateRequest;
use crate::error::AppError;
use crate::models::{Session, SessionStatus};
use crate::services::staging::{MaterialStaging, PendingFile, ResolvedMaterials};

/// Scalar fields of the edit form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFields {
    pub title: String,
    pub session_number: Option<u32>,
    pub description: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub meeting_link: String,
    pub status: SessionStatus,
    pub recording_url: String,
    pub recording_duration: Option<f64>,
}

impl SessionFields {
    pub fn from_session(session: &Session) -> Self {
        Self {
            title: session.title.clone(),
            session_number: session.session_number,
            description: session.description.clone().unwrap_or_default(),
            date: session.date.as_deref().map(form_date).unwrap_or_default(),
            start_time: session.start_time.clone().unwrap_or_default(),
            end_time: session.end_time.clone().unwrap_or_default(),
            meeting_link: session.meeting_link.clone().unwrap_or_default(),
            status: session.status,
            recording_url: session.recording_url.clone().unwrap_or_default(),
            recording_duration: session.recording_duration,
        }
    }

    /// Applies the provided form values. Nothing is changed when any of them
    /// fails to parse.
    pub fn apply(&mut self, form: SessionForm) -> Result<(), AppError> {
        let session_number = form
            .session_number
            .map(|input| input.parse::<u32>("sessionNumber"))
            .transpose()?;
        let recording_duration = form
            .recording_duration
            .map(|input| input.parse::<f64>("recordingDuration"))
            .transpose()?;

        if let Some(title) = form.title {
            self.title = title;
        }
        if let Some(value) = session_number {
            self.session_number = value;
        }
        if let Some(description) = form.description {
            self.description = description;
        }
        if let Some(date) = form.date {
            self.date = date;
        }
        if let Some(start_time) = form.start_time {
            self.start_time = start_time;
        }
        if let Some(end_time) = form.end_time {
            self.end_time = end_time;
        }
        if let Some(meeting_link) = form.meeting_link {
            self.meeting_link = meeting_link;
        }
        if let Some(status) = form.status {
            self.status = status;
        }
        if let Some(recording_url) = form.recording_url {
            self.recording_url = recording_url;
        }
        if let Some(value) = recording_duration {
            self.recording_duration = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("session title is required".to_string()));
        }
        Ok(())
    }

    /// Builds the update body. Blank numbers and blank schedule fields are
    /// left out so they do not overwrite stored values.
    pub fn to_request(&self, materials: ResolvedMaterials) -> SessionUpdateRequest {
        SessionUpdateRequest {
            title: self.title.trim().to_string(),
            session_number: self.session_number,
            description: Some(self.description.clone()),
            date: non_blank(&self.date),
            start_time: non_blank(&self.start_time),
            end_time: non_blank(&self.end_time),
            meeting_link: Some(self.meeting_link.trim().to_string()),
            status: self.status,
            recording_url: Some(self.recording_url.trim().to_string()),
            recording_duration: self.recording_duration,
            session_materials: materials.into_inner(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Reduces a stored date (RFC 3339 timestamp or plain date) to `YYYY-MM-DD`.
fn form_date(raw: &str) -> String {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

/// Numeric form input. Browsers send either a number or the raw text of the
/// input; blank text means "no value".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(serde_json::Number),
    Text(String),
}

impl NumberInput {
    fn parse<T: FromStr>(self, field: &str) -> Result<Option<T>, AppError> {
        let text = match self {
            NumberInput::Number(number) => number.to_string(),
            NumberInput::Text(text) => text,
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse().map(Some).map_err(|_| {
            AppError::BadRequest(format!("{} has an invalid value {:?}", field, text))
        })
    }
}

/// Partial form submission; absent keys leave the draft untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForm {
    pub title: Option<String>,
    pub session_number: Option<NumberInput>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub meeting_link: Option<String>,
    pub status: Option<SessionStatus>,
    pub recording_url: Option<String>,
    pub recording_duration: Option<NumberInput>,
}

/// Sends one session-update request carrying the scalar fields and the
/// resolved material list.
pub async fn commit(
    backend: &dyn SessionBackend,
    session_id: &str,
    fields: &SessionFields,
    materials: ResolvedMaterials,
    cancel: &CancellationToken,
) -> Result<Session, AppError> {
    let request = fields.to_request(materials);

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        result = backend.update_session(session_id, &request) => result,
    };

    result.map_err(|e| {
        warn!("Session update failed for {}: {}", session_id, e);
        AppError::Commit(e.to_string())
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub fields: SessionFields,
    pub materials: Vec<crate::models::Material>,
    pub pending_files: Vec<PendingFile>,
}

/// Draft of one session edit: scalar fields, material slots with their
/// staged files, and the token that aborts a save when the form closes.
pub struct SessionEditor {
    session_id: String,
    batch_id: Option<String>,
    fields: SessionFields,
    staging: MaterialStaging,
    cancel: CancellationToken,
}

impl SessionEditor {
    pub fn new(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            batch_id: session.batch_key().map(str::to_string),
            fields: SessionFields::from_session(session),
            staging: MaterialStaging::from_materials(session.session_materials.clone()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref()
    }

    pub fn fields(&self) -> &SessionFields {
        &self.fields
    }

    pub fn apply_form(&mut self, form: SessionForm) -> Result<(), AppError> {
        self.fields.apply(form)
    }

    pub fn staging(&self) -> &MaterialStaging {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut MaterialStaging {
        &mut self.staging
    }

    /// Token shared with in-flight saves; cancelling it aborts them.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Uploads staged files, then commits. On failure the draft keeps every
    /// edit and every URL already obtained.
    pub async fn save(&mut self, backend: &dyn SessionBackend) -> Result<Session, AppError> {
        self.fields.validate()?;
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let resolved = self
            .staging
            .resolve_all(&self.session_id, backend, &self.cancel)
            .await?;
        let session = commit(backend, &self.session_id, &self.fields, resolved, &self.cancel).await?;

        info!("Saved session {}", self.session_id);
        Ok(session)
    }

    pub fn view(&self) -> EditorView {
        EditorView {
            session_id: self.session_id.clone(),
            batch_id: self.batch_id.clone(),
            fields: self.fields.clone(),
            materials: self.staging.slots().to_vec(),
            pending_files: self.staging.pending(),
        }
    }
}
