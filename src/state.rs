use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::backend::SessionBackend;
use crate::error::AppError;
use crate::services::{AttendanceSheet, SessionEditor};

struct Entry<T> {
    value: Arc<T>,
    touched: Instant,
}

/// Open modals, keyed by the handle given to the front end. Each entry is
/// owned by one modal; nothing else reads or writes it. Entries the front
/// end stopped touching are dropped by [`Registry::evict_idle`].
pub struct Registry<T> {
    entries: Mutex<HashMap<Uuid, Entry<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Registry<T> {
    pub async fn insert(&self, entry: T) -> (Uuid, Arc<T>) {
        let id = Uuid::new_v4();
        let value = Arc::new(entry);
        self.entries.lock().await.insert(
            id,
            Entry {
                value: value.clone(),
                touched: Instant::now(),
            },
        );
        (id, value)
    }

    /// Looks an entry up and marks it as recently used.
    pub async fn get(&self, id: &Uuid) -> Result<Arc<T>, AppError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(id).ok_or(AppError::NotFound)?;
        entry.touched = Instant::now();
        Ok(entry.value.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<T>> {
        self.entries.lock().await.remove(id).map(|entry| entry.value)
    }

    /// Removes every entry untouched for at least `max_idle` and returns them.
    /// Entries a request is still holding are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<(Uuid, Arc<T>)> {
        let mut entries = self.entries.lock().await;
        let idle: Vec<Uuid> = entries
            .iter()
            .filter(|(_, entry)| {
                entry.touched.elapsed() >= max_idle && Arc::strong_count(&entry.value) == 1
            })
            .map(|(id, _)| *id)
            .collect();

        idle.into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.value)))
            .collect()
    }
}

pub struct OpenEditor {
    /// Course the session list is refreshed from after a save.
    pub course_id: Option<String>,
    pub cancel: CancellationToken,
    pub editor: Mutex<SessionEditor>,
}

impl OpenEditor {
    pub fn new(editor: SessionEditor, course_id: Option<String>) -> Self {
        Self {
            course_id,
            cancel: editor.cancel_token(),
            editor: Mutex::new(editor),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn SessionBackend>,
    pub sheets: Arc<Registry<Mutex<AttendanceSheet>>>,
    pub editors: Arc<Registry<OpenEditor>>,
}

impl AppState {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            sheets: Arc::new(Registry::default()),
            editors: Arc::new(Registry::default()),
        }
    }

    /// Drops sheets and editors the front end abandoned. Evicted editors are
    /// cancelled so a save still in flight stops.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let sheets = self.sheets.evict_idle(max_idle).await;
        let editors = self.editors.evict_idle(max_idle).await;
        for (id, open) in &editors {
            open.cancel.cancel();
            info!("Evicted idle editor {}", id);
        }
        for (id, _) in &sheets {
            info!("Evicted idle attendance sheet {}", id);
        }
        sheets.len() + editors.len()
    }
}

/// Periodically evicts abandoned modals from [`AppState`].
pub struct IdleReaper {
    state: AppState,
    interval: Duration,
    max_idle: Duration,
}

impl IdleReaper {
    pub fn new(state: AppState, interval: Duration, max_idle: Duration) -> Self {
        Self {
            state,
            interval,
            max_idle,
        }
    }

    pub async fn start(self) {
        info!(
            "Starting idle modal reaper (interval: {:?}, max idle: {:?})",
            self.interval, self.max_idle
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = self.state.evict_idle(self.max_idle).await;
            if evicted > 0 {
                info!("Evicted {} idle modals", evicted);
            }
        }
    }
}
