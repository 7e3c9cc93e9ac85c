pub mod course;
pub mod session;

pub use course::{Batch, Course, CourseDuration, IdRef, RosterEntry};
pub use session::{
    AttendanceEntry, AttendanceStatus, Material, MaterialType, Session, SessionStatus,
};
