use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Upload failed for material slot {slot}: {message}")]
    Upload { slot: usize, message: String },

    #[error("Saving session failed: {0}")]
    Commit(String),

    #[error("Submitting attendance failed: {0}")]
    Attendance(String),

    #[error("Backend error {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Notice returned to the front end. `slot` is set when a single material
/// upload failed so the form can point at it.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut slot = None;
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Cancelled => (
                StatusCode::CONFLICT,
                "Action was cancelled because the form was closed".to_string(),
            ),
            AppError::Upload { slot: index, message } => {
                slot = Some(index);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("Upload failed for material {}: {}", index + 1, message),
                )
            }
            e @ (AppError::Fetch(_) | AppError::Commit(_) | AppError::Attendance(_)) => {
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            e @ (AppError::Backend { .. } | AppError::Http(_)) => {
                error!("backend error: {}", e);
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            AppError::Config(msg) => {
                error!("configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service is misconfigured".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message,
            slot,
        });

        (status, body).into_response()
    }
}
