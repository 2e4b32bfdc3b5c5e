use chrono::{DateTime, Utc};
use courses::{
    Caller, Certificate, Course, CourseContent, CourseId, DomainError, Enrollment, EnrollmentId,
    Progress, ProgressPatch, ProgressState, UserId, is_course_complete, progress_percentage,
    progress_state, total_video_count,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    catalog::load_course,
    error::AppError,
    notify::{Template, notify},
    state::State,
    store::{ProgressMerge, StoreError},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollment {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressUpdate {
    pub progress: ProgressPatch,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub category: String,
    pub thumbnail: Option<String>,
    pub duration: f64,
    pub total_videos: usize,
    pub content: CourseContent,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            category: course.category.clone(),
            thumbnail: course.thumbnail.clone(),
            duration: course.duration,
            total_videos: total_video_count(course),
            content: course.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    pub id: EnrollmentId,
    pub user: UserId,
    pub course_id: CourseId,
    pub course: Option<CourseSummary>,
    pub course_unavailable: bool,
    pub progress: Progress,
    pub progress_percentage: u8,
    pub state: ProgressState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnrollmentView {
    pub fn new(enrollment: Enrollment, course: Option<&Course>) -> Self {
        Self {
            progress_percentage: course
                .map(|course| progress_percentage(&enrollment, course))
                .unwrap_or(0),
            state: progress_state(&enrollment.progress),
            course: course.map(CourseSummary::from),
            course_unavailable: course.is_none(),
            id: enrollment.id,
            user: enrollment.user,
            course_id: enrollment.course,
            progress: enrollment.progress,
            created_at: enrollment.created_at,
            updated_at: enrollment.updated_at,
            completed_at: enrollment.completed_at,
        }
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, DomainError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DomainError::invalid(format!("{field} is required")))
}

async fn load_enrollment(state: &State, id: EnrollmentId) -> Result<Enrollment, AppError> {
    state
        .store
        .get_enrollment(id)
        .await?
        .ok_or_else(|| DomainError::not_found("enrollment").into())
}

/// Pairs each enrollment with its course, `None` when the course was deleted.
pub async fn with_courses(
    state: &State,
    enrollments: Vec<Enrollment>,
) -> Result<Vec<(Enrollment, Option<Course>)>, AppError> {
    let mut paired = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let course = state.store.get_course(enrollment.course).await?;
        paired.push((enrollment, course));
    }

    Ok(paired)
}

fn sorted_views(entries: Vec<(Enrollment, Option<Course>)>) -> Vec<EnrollmentView> {
    let mut views: Vec<EnrollmentView> = entries
        .into_iter()
        .map(|(enrollment, course)| EnrollmentView::new(enrollment, course.as_ref()))
        .collect();
    views.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

    views
}

pub async fn create_enrollment(
    state: &State,
    caller: &Caller,
    request: CreateEnrollment,
) -> Result<EnrollmentView, AppError> {
    let user_id = UserId::parse(&required("userId", request.user_id)?)?;
    let course_id = CourseId::parse(&required("courseId", request.course_id)?)?;
    caller.require_self_or_admin(user_id)?;

    let now = Utc::now();
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| DomainError::not_found("user"))?;
    let course = load_course(state, course_id).await?;

    if !caller.is_admin() && !user.subscription_active(now) {
        return Err(DomainError::forbidden("subscription has expired").into());
    }

    let enrollment = Enrollment::new(user_id, course_id, now);
    match state.store.insert_enrollment(&enrollment).await {
        Ok(()) => {}
        Err(StoreError::Duplicate) => {
            return Err(DomainError::Conflict("Already enrolled in this course".to_string()).into());
        }
        Err(e) => return Err(e.into()),
    }
    info!(
        enrollment_id = %enrollment.id,
        user_id = %user_id,
        course_id = %course_id,
        "Enrollment created"
    );

    notify(
        state.notifier.as_ref(),
        Template::EnrollmentCreated,
        &user,
        &course,
    )
    .await;

    Ok(EnrollmentView::new(enrollment, Some(&course)))
}

pub async fn get_enrollment(
    state: &State,
    caller: &Caller,
    id: EnrollmentId,
) -> Result<EnrollmentView, AppError> {
    let enrollment = load_enrollment(state, id).await?;
    caller.require_self_or_admin(enrollment.user)?;
    let course = state.store.get_course(enrollment.course).await?;

    Ok(EnrollmentView::new(enrollment, course.as_ref()))
}

pub async fn list_for_user(
    state: &State,
    caller: &Caller,
    user: UserId,
) -> Result<Vec<EnrollmentView>, AppError> {
    caller.require_self_or_admin(user)?;

    let enrollments = state.store.list_enrollments_for_user(user).await?;

    Ok(sorted_views(with_courses(state, enrollments).await?))
}

pub async fn list_for_course(
    state: &State,
    caller: &Caller,
    course_id: CourseId,
) -> Result<Vec<EnrollmentView>, AppError> {
    let course = load_course(state, course_id).await?;
    course.authorize(caller)?;

    let entries = state
        .store
        .list_enrollments()
        .await?
        .into_iter()
        .filter(|e| e.course == course_id)
        .map(|e| (e, Some(course.clone())))
        .collect();

    Ok(sorted_views(entries))
}

pub async fn update_progress(
    state: &State,
    caller: &Caller,
    id: EnrollmentId,
    patch: ProgressPatch,
) -> Result<EnrollmentView, AppError> {
    let enrollment = load_enrollment(state, id).await?;
    if !caller.is_admin() && caller.id != enrollment.user {
        return Err(DomainError::forbidden("not allowed to update this enrollment").into());
    }

    let course = state
        .store
        .get_course(enrollment.course)
        .await?
        .ok_or_else(|| DomainError::NotFound("course is no longer available".to_string()))?;
    let total = total_video_count(&course);
    patch.validate(total)?;

    let now = Utc::now();
    let signalled = patch.signals_completion();
    let merge = ProgressMerge { patch, at: now };
    let mut merged = state
        .store
        .merge_progress(id, &merge)
        .await?
        .ok_or_else(|| DomainError::not_found("enrollment"))?;

    if !merged.progress.is_completed
        && is_course_complete(&merged.progress, total, signalled)
    {
        if !state.store.mark_completed(id, now).await? {
            let current = state.store.get_enrollment(id).await?;
            return Ok(EnrollmentView::new(current.unwrap_or(merged), Some(&course)));
        }
        merged.complete(now);
        info!(enrollment_id = %id, course_id = %course.id, "Course completed");

        match state.store.get_user(merged.user).await {
            Ok(Some(user)) => {
                notify(
                    state.notifier.as_ref(),
                    Template::CourseCompleted,
                    &user,
                    &course,
                )
                .await
            }
            Ok(None) => warn!(user_id = %merged.user, "Completion notice skipped, user missing"),
            Err(e) => warn!(user_id = %merged.user, "Completion notice skipped: {e}"),
        }
    }

    Ok(EnrollmentView::new(merged, Some(&course)))
}

pub async fn certificate(
    state: &State,
    caller: &Caller,
    id: EnrollmentId,
) -> Result<Certificate, AppError> {
    let enrollment = load_enrollment(state, id).await?;
    caller.require_self_or_admin(enrollment.user)?;
    let course = load_course(state, enrollment.course).await?;

    Ok(Certificate::issue(&enrollment, &course)?)
}
