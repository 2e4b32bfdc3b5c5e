//! # Completion Engine
//!
//! Deterministic derivations over a course and an enrollment's progress.
//!
//! ## Rules
//! - Only indices inside the course's current index space count towards progress
//! - Percentage is `round(100 * completed / max(total, 1))`, so a course without videos is at 0%
//! - Completion is reached at 100%, or when the client signals completion while the last video is
//!   among the completed ones
//! - A course without videos can never be completed through coverage
//! - Once completed, always completed
use serde::Serialize;

use crate::{
    course::Course,
    enrollment::{Enrollment, Progress},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotStarted,
    InProgress,
    Completed,
}

pub fn total_video_count(course: &Course) -> usize {
    course.content.video_count()
}

fn counted(progress: &Progress, total: usize) -> usize {
    progress
        .completed_videos
        .iter()
        .filter(|&&index| (index as usize) < total)
        .count()
}

pub fn percentage(completed: usize, total: usize) -> u8 {
    let ratio = 100.0 * completed as f64 / total.max(1) as f64;

    ratio.round().clamp(0.0, 100.0) as u8
}

pub fn progress_percentage(enrollment: &Enrollment, course: &Course) -> u8 {
    let total = total_video_count(course);

    percentage(counted(&enrollment.progress, total), total)
}

pub fn is_course_complete(progress: &Progress, total: usize, completion_signal: bool) -> bool {
    if progress.is_completed {
        return true;
    }
    if total == 0 {
        return false;
    }

    let finished_last = progress.completed_videos.contains(&((total - 1) as u32));

    percentage(counted(progress, total), total) == 100 || (completion_signal && finished_last)
}

pub fn progress_state(progress: &Progress) -> ProgressState {
    if progress.is_completed {
        ProgressState::Completed
    } else if progress.completed_videos.is_empty() && progress.current_video_index == 0 {
        ProgressState::NotStarted
    } else {
        ProgressState::InProgress
    }
}
