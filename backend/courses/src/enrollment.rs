use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    course::Course,
    error::DomainError,
    ids::{CourseId, EnrollmentId, UserId},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_video_index: u32,
    pub completed_videos: BTreeSet<u32>,
    pub is_completed: bool,
}

impl Progress {
    /// Set union on completed videos, overwrite on the current index. Completion is left to the
    /// engine.
    pub fn merge(&mut self, patch: &ProgressPatch) {
        self.completed_videos
            .extend(patch.completed_videos.iter().copied());
        if let Some(index) = patch.current_video_index {
            self.current_video_index = index;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user: UserId,
    pub course: CourseId,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once, by the first transition to completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn new(user: UserId, course: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId::new(),
            user,
            course,
            progress: Progress::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Marks the enrollment completed. `false` when it already was.
    pub fn complete(&mut self, at: DateTime<Utc>) -> bool {
        if self.progress.is_completed {
            return false;
        }

        self.progress.is_completed = true;
        self.completed_at = Some(at);
        self.updated_at = at;
        true
    }
}

/// Client progress report. `is_completed` is only a signal, see [`crate::is_course_complete`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    #[serde(default)]
    pub current_video_index: Option<u32>,
    #[serde(default)]
    pub completed_videos: Vec<u32>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

impl ProgressPatch {
    pub fn validate(&self, total_videos: usize) -> Result<(), DomainError> {
        if let Some(index) = self
            .completed_videos
            .iter()
            .find(|&&index| index as usize >= total_videos)
        {
            return Err(DomainError::invalid(format!(
                "completed video index {index} is out of range for a course with {total_videos} videos"
            )));
        }

        if let Some(index) = self.current_video_index {
            let limit = total_videos.max(1);
            if index as usize >= limit {
                return Err(DomainError::invalid(format!(
                    "current video index {index} is out of range for a course with {total_videos} videos"
                )));
            }
        }

        Ok(())
    }

    pub fn signals_completion(&self) -> bool {
        self.is_completed == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub enrollment_id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub course_title: String,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    pub fn issue(enrollment: &Enrollment, course: &Course) -> Result<Self, DomainError> {
        if !enrollment.progress.is_completed {
            return Err(DomainError::forbidden("course not completed"));
        }

        Ok(Self {
            enrollment_id: enrollment.id,
            user_id: enrollment.user,
            course_id: course.id,
            course_title: course.title.clone(),
            issued_at: enrollment.completed_at.unwrap_or(enrollment.updated_at),
        })
    }
}
