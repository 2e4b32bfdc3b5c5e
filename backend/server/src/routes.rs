use std::sync::Arc;

use axum::{
    extract::{Path, State as Extract},
    http::StatusCode,
    response::Response,
};
use courses::{
    CourseId, CourseUpdate, EnrollmentId, NewCourse, SectionId, SectionInput, SectionUpdate,
    UserId, VideoId, VideoInput, VideoUpdate,
};
use serde_json::json;

use crate::{
    auth::Authenticated,
    catalog, dashboard,
    enrollments::{self, CreateEnrollment, ProgressUpdate},
    error::AppError,
    state::State,
    utils::{Payload, respond, respond_list},
};

type Shared = Extract<Arc<State>>;

pub async fn health_handler(Extract(state): Shared) -> Result<Response, AppError> {
    state.store.ping().await?;

    Ok(respond(StatusCode::OK, json!({})))
}

pub async fn list_courses_handler(Extract(state): Shared) -> Result<Response, AppError> {
    Ok(respond_list(catalog::list_courses(&state).await?))
}

pub async fn courses_by_category_handler(
    Extract(state): Shared,
    Path(category): Path<String>,
) -> Result<Response, AppError> {
    Ok(respond_list(
        catalog::list_courses_by_category(&state, &category).await?,
    ))
}

pub async fn get_course_handler(
    Extract(state): Shared,
    Path(course_id): Path<String>,
) -> Result<Response, AppError> {
    let course = catalog::get_course(&state, CourseId::parse(&course_id)?).await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn create_course_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Payload(payload): Payload<NewCourse>,
) -> Result<Response, AppError> {
    let course = catalog::create_course(&state, &caller, payload).await?;

    Ok(respond(StatusCode::CREATED, course))
}

pub async fn update_course_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(course_id): Path<String>,
    Payload(update): Payload<CourseUpdate>,
) -> Result<Response, AppError> {
    let course =
        catalog::update_course(&state, &caller, CourseId::parse(&course_id)?, update).await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn delete_course_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(course_id): Path<String>,
) -> Result<Response, AppError> {
    catalog::delete_course(&state, &caller, CourseId::parse(&course_id)?).await?;

    Ok(respond(StatusCode::OK, json!({})))
}

pub async fn add_section_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(course_id): Path<String>,
    Payload(input): Payload<SectionInput>,
) -> Result<Response, AppError> {
    let course =
        catalog::add_section(&state, &caller, CourseId::parse(&course_id)?, input).await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn update_section_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, section_id)): Path<(String, String)>,
    Payload(update): Payload<SectionUpdate>,
) -> Result<Response, AppError> {
    let course = catalog::update_section(
        &state,
        &caller,
        CourseId::parse(&course_id)?,
        SectionId::parse(&section_id)?,
        update,
    )
    .await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn delete_section_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, section_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let course = catalog::delete_section(
        &state,
        &caller,
        CourseId::parse(&course_id)?,
        SectionId::parse(&section_id)?,
    )
    .await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn add_section_video_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, section_id)): Path<(String, String)>,
    Payload(input): Payload<VideoInput>,
) -> Result<Response, AppError> {
    let section = Some(SectionId::parse(&section_id)?);
    let course =
        catalog::add_video(&state, &caller, CourseId::parse(&course_id)?, section, input).await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn update_section_video_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, section_id, video_id)): Path<(String, String, String)>,
    Payload(update): Payload<VideoUpdate>,
) -> Result<Response, AppError> {
    let course = catalog::update_video(
        &state,
        &caller,
        CourseId::parse(&course_id)?,
        Some(SectionId::parse(&section_id)?),
        VideoId::parse(&video_id)?,
        update,
    )
    .await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn delete_section_video_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, section_id, video_id)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let course = catalog::delete_video(
        &state,
        &caller,
        CourseId::parse(&course_id)?,
        Some(SectionId::parse(&section_id)?),
        VideoId::parse(&video_id)?,
    )
    .await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn add_video_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(course_id): Path<String>,
    Payload(input): Payload<VideoInput>,
) -> Result<Response, AppError> {
    let course =
        catalog::add_video(&state, &caller, CourseId::parse(&course_id)?, None, input).await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn update_video_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, video_id)): Path<(String, String)>,
    Payload(update): Payload<VideoUpdate>,
) -> Result<Response, AppError> {
    let course = catalog::update_video(
        &state,
        &caller,
        CourseId::parse(&course_id)?,
        None,
        VideoId::parse(&video_id)?,
        update,
    )
    .await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn delete_video_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path((course_id, video_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let course = catalog::delete_video(
        &state,
        &caller,
        CourseId::parse(&course_id)?,
        None,
        VideoId::parse(&video_id)?,
    )
    .await?;

    Ok(respond(StatusCode::OK, course))
}

pub async fn create_enrollment_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Payload(request): Payload<CreateEnrollment>,
) -> Result<Response, AppError> {
    let enrollment = enrollments::create_enrollment(&state, &caller, request).await?;

    Ok(respond(StatusCode::CREATED, enrollment))
}

pub async fn user_enrollments_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    let user = UserId::parse(&user_id)?;

    Ok(respond_list(
        enrollments::list_for_user(&state, &caller, user).await?,
    ))
}

pub async fn course_enrollments_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(course_id): Path<String>,
) -> Result<Response, AppError> {
    let course = CourseId::parse(&course_id)?;

    Ok(respond_list(
        enrollments::list_for_course(&state, &caller, course).await?,
    ))
}

pub async fn get_enrollment_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(enrollment_id): Path<String>,
) -> Result<Response, AppError> {
    let enrollment =
        enrollments::get_enrollment(&state, &caller, EnrollmentId::parse(&enrollment_id)?).await?;

    Ok(respond(StatusCode::OK, enrollment))
}

pub async fn certificate_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(enrollment_id): Path<String>,
) -> Result<Response, AppError> {
    let certificate =
        enrollments::certificate(&state, &caller, EnrollmentId::parse(&enrollment_id)?).await?;

    Ok(respond(StatusCode::OK, certificate))
}

pub async fn update_progress_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(enrollment_id): Path<String>,
    Payload(update): Payload<ProgressUpdate>,
) -> Result<Response, AppError> {
    let enrollment = enrollments::update_progress(
        &state,
        &caller,
        EnrollmentId::parse(&enrollment_id)?,
        update.progress,
    )
    .await?;

    Ok(respond(StatusCode::OK, enrollment))
}

pub async fn profile_stats_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
) -> Result<Response, AppError> {
    let stats = dashboard::student(&state, &caller, caller.id).await?;

    Ok(respond(StatusCode::OK, stats))
}

pub async fn student_stats_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    let stats = dashboard::student(&state, &caller, UserId::parse(&user_id)?).await?;

    Ok(respond(StatusCode::OK, stats))
}

pub async fn admin_stats_handler(
    Extract(state): Shared,
    Authenticated(caller): Authenticated,
) -> Result<Response, AppError> {
    let stats = dashboard::admin(&state, &caller).await?;

    Ok(respond(StatusCode::OK, stats))
}
