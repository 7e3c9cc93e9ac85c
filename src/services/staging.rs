//! Material slots of a session edit form plus the files attached to them.
//!
//! Files are held in a side table keyed by slot index and only uploaded when
//! the form is saved. [`MaterialStaging::resolve_all`] uploads them one at a
//! time in slot order and swaps in the URLs the backend hands back.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::SessionBackend;
use crate::error::AppError;
use crate::models::{Material, MaterialType};

#[derive(Clone)]
pub struct StagedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl StagedFile {
    /// Builds a staged file from a client-supplied name. Directory parts are
    /// stripped and the content type is guessed from the extension.
    pub fn new(file_name: &str, bytes: impl Into<Bytes>) -> Self {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_name)
            .to_string();
        let content_type = mime_guess::from_path(&base)
            .first_or_octet_stream()
            .to_string();

        Self {
            file_name: base,
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }
}

impl fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One field edit on a material slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum SlotEdit {
    #[serde(rename = "type")]
    Kind(MaterialType),
    Title(String),
    Url(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFile {
    pub slot: usize,
    pub file_name: String,
    pub size: usize,
}

/// Material list that came out of a completed [`MaterialStaging::resolve_all`];
/// none of its entries points at a local file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMaterials(Vec<Material>);

impl ResolvedMaterials {
    pub fn as_slice(&self) -> &[Material] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Material> {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterialStaging {
    slots: Vec<Material>,
    staged: BTreeMap<usize, StagedFile>,
}

impl MaterialStaging {
    pub fn from_materials(slots: Vec<Material>) -> Self {
        Self {
            slots,
            staged: BTreeMap::new(),
        }
    }

    pub fn slots(&self) -> &[Material] {
        &self.slots
    }

    pub fn staged_file(&self, index: usize) -> Option<&StagedFile> {
        self.staged.get(&index)
    }

    pub fn pending(&self) -> Vec<PendingFile> {
        self.staged
            .iter()
            .map(|(slot, file)| PendingFile {
                slot: *slot,
                file_name: file.file_name.clone(),
                size: file.bytes.len(),
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<(), AppError> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "material slot {} does not exist",
                index
            )))
        }
    }

    /// Appends an empty document slot and returns its index.
    pub fn add_slot(&mut self) -> usize {
        self.slots.push(Material::default());
        self.slots.len() - 1
    }

    /// Removes a slot together with its staged file. Files staged on later
    /// slots move down with their slot.
    pub fn remove_slot(&mut self, index: usize) -> Result<Material, AppError> {
        self.check_index(index)?;
        let removed = self.slots.remove(index);

        let staged = std::mem::take(&mut self.staged);
        self.staged = staged
            .into_iter()
            .filter(|(slot, _)| *slot != index)
            .map(|(slot, file)| if slot > index { (slot - 1, file) } else { (slot, file) })
            .collect();

        Ok(removed)
    }

    /// URLs can only be typed in for link slots; the other types get theirs
    /// from an upload. Changing the type keeps any staged file.
    pub fn update_slot(&mut self, index: usize, edit: SlotEdit) -> Result<(), AppError> {
        self.check_index(index)?;
        let slot = &mut self.slots[index];

        match edit {
            SlotEdit::Kind(kind) => slot.kind = kind,
            SlotEdit::Title(title) => slot.title = title,
            SlotEdit::Url(url) => {
                if slot.kind != MaterialType::Link {
                    return Err(AppError::BadRequest(
                        "only link materials accept a URL; attach a file instead".to_string(),
                    ));
                }
                slot.url = url;
            }
        }
        Ok(())
    }

    /// Attaches a file to a slot, replacing any file staged there before.
    /// An empty title is filled with the file name; the URL is left alone.
    pub fn stage_file(&mut self, index: usize, file: StagedFile) -> Result<Option<StagedFile>, AppError> {
        self.check_index(index)?;

        let slot = &mut self.slots[index];
        if slot.title.trim().is_empty() {
            slot.title = file.file_name.clone();
        }
        debug!("Staged {:?} on material slot {}", file, index);

        Ok(self.staged.insert(index, file))
    }

    /// Uploads every staged file in slot order, one request at a time.
    ///
    /// The first failure stops the pipeline and is reported with its slot
    /// index. Slots uploaded before it keep their new URL and lose their staged
    /// file, so a retry only uploads what is still pending. Nothing already
    /// uploaded is deleted again. `cancel` is checked before each upload and
    /// aborts an upload in flight.
    pub async fn resolve_all(
        &mut self,
        session_id: &str,
        backend: &dyn SessionBackend,
        cancel: &CancellationToken,
    ) -> Result<ResolvedMaterials, AppError> {
        let queue: Vec<usize> = self.staged.keys().copied().collect();
        let mut uploaded: Vec<String> = Vec::new();

        for index in queue {
            if cancel.is_cancelled() {
                report_orphans(session_id, &uploaded);
                return Err(AppError::Cancelled);
            }

            let Some(file) = self.staged.get(&index) else {
                continue;
            };
            debug!("Uploading {} for material slot {}", file.file_name, index);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report_orphans(session_id, &uploaded);
                    return Err(AppError::Cancelled);
                }
                result = backend.upload_material(session_id, file) => result,
            };

            let outcome = match result {
                Ok(materials) => uploaded_url(materials)
                    .ok_or_else(|| "upload response carried no material URL".to_string()),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(url) => {
                    self.slots[index].url = url.clone();
                    self.staged.remove(&index);
                    uploaded.push(url);
                }
                Err(message) => {
                    warn!("Upload for material slot {} of session {} failed: {}", index, session_id, message);
                    report_orphans(session_id, &uploaded);
                    return Err(AppError::Upload { slot: index, message });
                }
            }
        }

        if !uploaded.is_empty() {
            info!("Uploaded {} materials for session {}", uploaded.len(), session_id);
        }
        Ok(ResolvedMaterials(self.slots.clone()))
    }
}

fn uploaded_url(materials: Vec<Material>) -> Option<String> {
    materials
        .into_iter()
        .last()
        .filter(Material::is_resolved)
        .map(|material| material.url)
}

fn report_orphans(session_id: &str, uploaded: &[String]) {
    if !uploaded.is_empty() {
        warn!(
            session_id,
            orphaned = ?uploaded,
            "Save stopped after {} uploads; files stay on the backend until the form is saved",
            uploaded.len()
        );
    }
}
