use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::SessionBackend;
use crate::error::AppError;
use crate::models::{Batch, Course, Session};

/// A list that may have degraded to empty. `notice` carries the reason so the
/// front end can show it without blocking navigation.
#[derive(Debug, Clone, Serialize)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl<T> Loaded<T> {
    fn from_result(what: &str, result: Result<Vec<T>, AppError>) -> Self {
        match result {
            Ok(items) => Self { items, notice: None },
            Err(e) => {
                warn!("Failed to load {}: {}", what, e);
                Self {
                    items: Vec::new(),
                    notice: Some(AppError::Fetch(format!("could not load {}", what)).to_string()),
                }
            }
        }
    }
}

/// Resolves the course → batch → session tree of the signed-in trainer.
pub struct HierarchyLoader {
    backend: Arc<dyn SessionBackend>,
}

impl HierarchyLoader {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    pub async fn list_assigned_courses(&self) -> Loaded<Course> {
        let loaded = Loaded::from_result("courses", self.backend.assigned_courses().await);
        info!("Loaded {} assigned courses", loaded.items.len());
        loaded
    }

    pub async fn list_batches(&self, course_id: &str) -> Loaded<Batch> {
        Loaded::from_result(
            "batches",
            self.backend.batches_for_course(course_id).await,
        )
    }

    pub async fn list_sessions(&self, course_id: &str) -> Loaded<Session> {
        Loaded::from_result(
            "sessions",
            self.backend.sessions_for_course(course_id).await,
        )
    }

    /// Sessions of one batch, fetched at course level and partitioned here.
    pub async fn sessions_for_batch(&self, course_id: &str, batch_id: &str) -> Loaded<Session> {
        let loaded = self.list_sessions(course_id).await;
        Loaded {
            items: sessions_of(loaded.items, batch_id),
            notice: loaded.notice,
        }
    }
}

/// Keeps the sessions whose batch reference, bare or embedded, names `batch_id`.
pub fn sessions_of(sessions: Vec<Session>, batch_id: &str) -> Vec<Session> {
    sessions
        .into_iter()
        .filter(|session| session.batch_key() == Some(batch_id))
        .collect()
}
