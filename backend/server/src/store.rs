//! # Store
//!
//! Document store seam. Every read hits the backing store, nothing is cached in process.
//!
//! ## Atomicity
//! - Enrollment creation claims the (user, course) pair atomically, a second claim is [`StoreError::Duplicate`]
//! - Progress merges are a single atomic set union plus index overwrite, never a read-modify-write
//! - Completion is a separate set-only write that reports whether it made the transition, so
//!   concurrent reports can only move it forward and exactly one of them observes the change
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courses::{Course, CourseId, Enrollment, EnrollmentId, ProgressPatch, User, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("duplicate record")]
    Duplicate,
}

/// A validated report. Only the index and completed videos are written, completion is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMerge {
    pub patch: ProgressPatch,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn put_user(&self, user: &User) -> Result<(), StoreError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn put_session(&self, token: &str, user: UserId) -> Result<(), StoreError>;
    async fn session_user(&self, token: &str) -> Result<Option<UserId>, StoreError>;

    async fn put_course(&self, course: &Course) -> Result<(), StoreError>;
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StoreError>;
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;
    /// `false` when there was nothing to delete.
    async fn delete_course(&self, id: CourseId) -> Result<bool, StoreError>;

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError>;
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError>;
    async fn list_enrollments_for_user(&self, user: UserId)
    -> Result<Vec<Enrollment>, StoreError>;
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, StoreError>;
    /// Returns the merged record, `None` for an unknown enrollment.
    async fn merge_progress(
        &self,
        id: EnrollmentId,
        merge: &ProgressMerge,
    ) -> Result<Option<Enrollment>, StoreError>;
    /// `true` only for the call that moved the enrollment to completed.
    async fn mark_completed(
        &self,
        id: EnrollmentId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
