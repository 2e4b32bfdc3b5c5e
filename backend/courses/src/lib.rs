//! # Courses
//!
//! Domain model shared by the backend crates.
//!
//! ## Catalog
//! - A course owns its content in one of two layouts: ordered sections of ordered videos, or a flat
//!   ordered video list
//! - Either way, the flattened video order is the index space used by progress tracking
//!
//! ## Ledger
//! - One enrollment per (user, course) pair
//! - Progress holds the current video index, the set of completed indices and the completion flag
//! - Completed indices only ever grow, completion never reverts
//!
//! ## Engine
//! - Pure derivations over a course and its enrollments: percentages, completion, certificates and
//!   dashboard aggregates
//! - No I/O lives in this crate, the server crate owns storage

pub mod course;
pub mod enrollment;
pub mod error;
pub mod ids;
pub mod progress;
pub mod stats;
pub mod user;

pub use course::{
    Course, CourseContent, CourseUpdate, NewCourse, Section, SectionInput, SectionUpdate, Video,
    VideoInput, VideoUpdate,
};
pub use enrollment::{Certificate, Enrollment, Progress, ProgressPatch};
pub use error::DomainError;
pub use ids::{CourseId, EnrollmentId, SectionId, UserId, VideoId};
pub use progress::{
    ProgressState, is_course_complete, percentage, progress_percentage, progress_state,
    total_video_count,
};
pub use stats::{AdminStats, StudentStats, admin_stats, month_start, student_stats};
pub use user::{Caller, Role, User};
