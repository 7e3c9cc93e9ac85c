pub mod dto;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Batch, Course, Material, RosterEntry, Session};
use crate::services::staging::StagedFile;

/// Operations the platform's REST backend offers to the session workflow.
/// Every call is made on behalf of the configured trainer token.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn assigned_courses(&self) -> Result<Vec<Course>, AppError>;
    async fn batches_for_course(&self, course_id: &str) -> Result<Vec<Batch>, AppError>;
    async fn sessions_for_course(&self, course_id: &str) -> Result<Vec<Session>, AppError>;
    async fn batch_roster(&self, batch_id: &str) -> Result<Vec<RosterEntry>, AppError>;
    async fn session_detail(&self, session_id: &str) -> Result<Session, AppError>;
    async fn submit_attendance(
        &self,
        batch_id: &str,
        session_id: &str,
        request: &dto::AttendanceRequest,
    ) -> Result<(), AppError>;
    /// Uploads one file and returns the session's material list as stored
    /// after the upload; the last entry describes the new file.
    async fn upload_material(&self, session_id: &str, file: &StagedFile) -> Result<Vec<Material>, AppError>;
    async fn update_session(
        &self,
        session_id: &str,
        request: &dto::SessionUpdateRequest,
    ) -> Result<Session, AppError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError>;
}

pub struct HttpSessionBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpSessionBackend {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        let response = self.authorized(builder).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend { status, body });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        let body_text = response.text().await?;

        serde_json::from_str::<T>(&body_text).map_err(|e| {
            tracing::error!("Failed to parse response of {}: {}", path, e);
            AppError::Fetch(format!("unreadable backend response from {}: {}", path, e))
        })
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn assigned_courses(&self) -> Result<Vec<Course>, AppError> {
        let response: dto::CoursesResponse = self.get_json("/trainer/courses").await?;
        Ok(response.courses)
    }

    async fn batches_for_course(&self, course_id: &str) -> Result<Vec<Batch>, AppError> {
        let response: dto::BatchesResponse = self
            .get_json(&format!("/courses/{}/batches", course_id))
            .await?;
        Ok(response.batches)
    }

    async fn sessions_for_course(&self, course_id: &str) -> Result<Vec<Session>, AppError> {
        let response: dto::SessionsResponse = self
            .get_json(&format!("/courses/{}/sessions", course_id))
            .await?;
        Ok(response.into_sessions())
    }

    async fn batch_roster(&self, batch_id: &str) -> Result<Vec<RosterEntry>, AppError> {
        let response: dto::BatchDetailResponse =
            self.get_json(&format!("/batches/{}", batch_id)).await?;
        Ok(response.batch.students)
    }

    async fn session_detail(&self, session_id: &str) -> Result<Session, AppError> {
        let response: dto::SessionResponse =
            self.get_json(&format!("/sessions/{}", session_id)).await?;
        Ok(response.session)
    }

    async fn submit_attendance(
        &self,
        batch_id: &str,
        session_id: &str,
        request: &dto::AttendanceRequest,
    ) -> Result<(), AppError> {
        let url = self.url(&format!(
            "/batches/{}/sessions/{}/attendance",
            batch_id, session_id
        ));
        self.send(self.client.put(url).json(request)).await?;
        Ok(())
    }

    async fn upload_material(&self, session_id: &str, file: &StagedFile) -> Result<Vec<Material>, AppError> {
        let part = reqwest::multipart::Part::stream_with_length(file.bytes.clone(), file.bytes.len() as u64)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.url(&format!("/sessions/{}/materials", session_id));
        let response = self.send(self.client.post(url).multipart(form)).await?;
        let parsed: dto::MaterialUploadResponse = response.json().await?;

        Ok(parsed.session.session_materials)
    }

    async fn update_session(
        &self,
        session_id: &str,
        request: &dto::SessionUpdateRequest,
    ) -> Result<Session, AppError> {
        let url = self.url(&format!("/sessions/{}", session_id));
        let response = self.send(self.client.put(url).json(request)).await?;
        let parsed: dto::SessionResponse = response.json().await?;
        Ok(parsed.session)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        let url = self.url(&format!("/sessions/{}", session_id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}
