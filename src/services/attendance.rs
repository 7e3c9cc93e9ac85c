//! Attendance for one session, kept as a present-set over the batch roster.
//!
//! Absentees are never tracked on their own: at submit time they are the
//! roster minus the present-set, so the backend always receives a total
//! partition of the roster and a resubmission replaces the previous one.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::SessionBackend;
use crate::backend::dto::AttendanceRequest;
use crate::error::AppError;
use crate::models::RosterEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendancePartition {
    pub present: Vec<String>,
    pub absent: Vec<String>,
}

impl From<AttendancePartition> for AttendanceRequest {
    fn from(partition: AttendancePartition) -> Self {
        AttendanceRequest {
            present_students: partition.present,
            absent_students: partition.absent,
        }
    }
}

/// Splits the roster into present and absent ids, both in roster order.
/// Ids in `present` that are not on the roster are ignored.
pub fn partition(roster: &[RosterEntry], present: &HashSet<String>) -> AttendancePartition {
    let (present, absent): (Vec<&RosterEntry>, Vec<&RosterEntry>) = roster
        .iter()
        .partition(|student| present.contains(&student.id));

    AttendancePartition {
        present: present.into_iter().map(|s| s.id.clone()).collect(),
        absent: absent.into_iter().map(|s| s.id.clone()).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetPhase {
    Unloaded,
    LoadedEmpty,
    LoadedExisting,
    Editing,
    Submitting,
    Submitted,
}

/// Whether the submit action creates the session's first attendance record
/// or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    Mark,
    Update,
}

#[derive(Debug, Clone)]
pub struct AttendanceSheet {
    batch_id: String,
    session_id: String,
    roster: Vec<RosterEntry>,
    present: HashSet<String>,
    phase: SheetPhase,
    mode: SubmitMode,
    /// Set when the stored attendance could not be read. Submitting would
    /// overwrite a record the sheet never saw.
    prior_unknown: bool,
    notices: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMark {
    pub id: String,
    pub name: String,
    pub email: String,
    pub present: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetView {
    pub batch_id: String,
    pub session_id: String,
    pub phase: SheetPhase,
    pub mode: SubmitMode,
    pub submittable: bool,
    pub students: Vec<StudentMark>,
    pub present_count: usize,
    pub absent_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

impl AttendanceSheet {
    pub fn new(batch_id: &str, session_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            session_id: session_id.to_string(),
            roster: Vec::new(),
            present: HashSet::new(),
            phase: SheetPhase::Unloaded,
            mode: SubmitMode::Mark,
            prior_unknown: false,
            notices: Vec::new(),
        }
    }

    /// Seeds the sheet from the roster and the session's stored attendance.
    /// `prior_present` is `None` when the session has no attendance yet.
    pub fn seed(&mut self, roster: Vec<RosterEntry>, prior_present: Option<HashSet<String>>) {
        self.roster = roster;
        self.prior_unknown = false;
        match prior_present {
            Some(present) => {
                self.present = present;
                self.phase = SheetPhase::LoadedExisting;
                self.mode = SubmitMode::Update;
            }
            None => {
                self.present.clear();
                self.phase = SheetPhase::LoadedEmpty;
                self.mode = SubmitMode::Mark;
            }
        }
    }

    pub fn phase(&self) -> SheetPhase {
        self.phase
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn can_submit(&self) -> bool {
        !self.roster.is_empty() && !self.prior_unknown
    }

    pub fn is_present(&self, student_id: &str) -> bool {
        self.present.contains(student_id)
    }

    fn ensure_editable(&mut self) -> Result<(), AppError> {
        match self.phase {
            SheetPhase::LoadedEmpty | SheetPhase::LoadedExisting | SheetPhase::Editing => {
                self.phase = SheetPhase::Editing;
                Ok(())
            }
            SheetPhase::Unloaded => Err(AppError::Conflict("attendance is not loaded yet".to_string())),
            SheetPhase::Submitting => Err(AppError::Conflict("attendance is being submitted".to_string())),
            SheetPhase::Submitted => Err(AppError::Conflict("attendance was already submitted".to_string())),
        }
    }

    /// Flips one student's membership in the present-set and returns the new
    /// membership.
    pub fn toggle(&mut self, student_id: &str) -> Result<bool, AppError> {
        if !self.roster.iter().any(|s| s.id == student_id) {
            return Err(AppError::BadRequest(format!(
                "student {} is not on the roster",
                student_id
            )));
        }
        self.ensure_editable()?;

        if self.present.remove(student_id) {
            Ok(false)
        } else {
            self.present.insert(student_id.to_string());
            Ok(true)
        }
    }

    pub fn select_all(&mut self) -> Result<(), AppError> {
        self.ensure_editable()?;
        self.present = self.roster.iter().map(|s| s.id.clone()).collect();
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<(), AppError> {
        self.ensure_editable()?;
        self.present.clear();
        Ok(())
    }

    pub fn partition(&self) -> AttendancePartition {
        partition(&self.roster, &self.present)
    }

    fn begin_submit(&mut self) -> Result<AttendancePartition, AppError> {
        if self.roster.is_empty() {
            return Err(AppError::BadRequest(
                "cannot submit attendance without a roster".to_string(),
            ));
        }
        if self.prior_unknown {
            return Err(AppError::Conflict(
                "existing attendance could not be loaded; reopen the sheet before submitting".to_string(),
            ));
        }
        self.ensure_editable()?;
        self.phase = SheetPhase::Submitting;
        Ok(self.partition())
    }

    pub fn view(&self) -> SheetView {
        let students: Vec<StudentMark> = self
            .roster
            .iter()
            .map(|s| StudentMark {
                id: s.id.clone(),
                name: s.display_name(),
                email: s.email.clone(),
                present: self.present.contains(&s.id),
            })
            .collect();
        let present_count = students.iter().filter(|s| s.present).count();

        SheetView {
            batch_id: self.batch_id.clone(),
            session_id: self.session_id.clone(),
            phase: self.phase,
            mode: self.mode,
            submittable: self.can_submit(),
            absent_count: students.len() - present_count,
            present_count,
            students,
            notices: self.notices.clone(),
        }
    }
}

pub struct AttendanceReconciler {
    backend: Arc<dyn SessionBackend>,
}

impl AttendanceReconciler {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Loads the roster and any stored attendance. Fetch failures degrade to
    /// an empty roster or an empty present-set with a notice.
    pub async fn open(&self, batch_id: &str, session_id: &str) -> AttendanceSheet {
        let mut sheet = AttendanceSheet::new(batch_id, session_id);

        let roster = match self.backend.batch_roster(batch_id).await {
            Ok(roster) => roster,
            Err(e) => {
                warn!("Failed to load roster of batch {}: {}", batch_id, e);
                sheet
                    .notices
                    .push(AppError::Fetch("could not load the batch roster".to_string()).to_string());
                Vec::new()
            }
        };

        let prior = match self.backend.session_detail(session_id).await {
            Ok(session) if session.has_attendance() => Ok(Some(
                session
                    .present_student_ids()
                    .map(str::to_string)
                    .collect::<HashSet<_>>(),
            )),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Failed to load attendance of session {}: {}", session_id, e);
                sheet.notices.push(
                    AppError::Fetch("could not load existing attendance".to_string()).to_string(),
                );
                Err(())
            }
        };

        match prior {
            Ok(prior_present) => sheet.seed(roster, prior_present),
            Err(()) => {
                sheet.seed(roster, None);
                sheet.prior_unknown = true;
            }
        }
        info!(
            "Opened attendance for session {} ({:?}, {} students)",
            session_id,
            sheet.phase,
            sheet.roster.len()
        );
        sheet
    }

    /// Sends the full partition. On failure the selection is kept so the
    /// user can resubmit without re-ticking.
    pub async fn submit(&self, sheet: &mut AttendanceSheet) -> Result<AttendancePartition, AppError> {
        let partition = sheet.begin_submit()?;
        let request = AttendanceRequest::from(partition.clone());

        match self
            .backend
            .submit_attendance(&sheet.batch_id, &sheet.session_id, &request)
            .await
        {
            Ok(()) => {
                sheet.phase = SheetPhase::Submitted;
                info!(
                    "Attendance submitted for session {}: {} present, {} absent",
                    sheet.session_id,
                    partition.present.len(),
                    partition.absent.len()
                );
                Ok(partition)
            }
            Err(e) => {
                sheet.phase = SheetPhase::Editing;
                warn!("Attendance submit failed for session {}: {}", sheet.session_id, e);
                Err(AppError::Attendance(e.to_string()))
            }
        }
    }
}
