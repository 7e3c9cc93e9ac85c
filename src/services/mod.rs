pub mod attendance;
pub mod committer;
pub mod hierarchy;
pub mod staging;

pub use attendance::{AttendanceReconciler, AttendanceSheet, partition};
pub use committer::{SessionEditor, SessionFields, SessionForm, commit};
pub use hierarchy::{HierarchyLoader, Loaded, sessions_of};
pub use staging::{MaterialStaging, ResolvedMaterials, SlotEdit, StagedFile};
