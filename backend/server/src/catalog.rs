use std::collections::HashMap;

use chrono::{DateTime, Utc};
use courses::{
    Caller, Course, CourseContent, CourseId, CourseUpdate, DomainError, NewCourse, SectionId,
    SectionInput, SectionUpdate, User, UserId, VideoId, VideoInput, VideoUpdate,
    total_video_count,
};
use serde::Serialize;
use tracing::info;

use crate::{error::AppError, state::State};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Instructor {
    fn resolve(id: UserId, user: Option<&User>) -> Self {
        Self {
            id,
            name: user.map(|u| u.name.clone()),
            email: user.map(|u| u.email.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub thumbnail: Option<String>,
    pub duration: f64,
    pub instructor: Instructor,
    pub created_at: DateTime<Utc>,
    pub total_videos: usize,
    pub content: CourseContent,
}

impl CourseView {
    pub fn new(course: Course, instructor: Option<&User>) -> Self {
        Self {
            total_videos: total_video_count(&course),
            instructor: Instructor::resolve(course.instructor, instructor),
            id: course.id,
            title: course.title,
            description: course.description,
            category: course.category,
            thumbnail: course.thumbnail,
            duration: course.duration,
            created_at: course.created_at,
            content: course.content,
        }
    }
}

pub async fn load_course(state: &State, id: CourseId) -> Result<Course, AppError> {
    state
        .store
        .get_course(id)
        .await?
        .ok_or_else(|| DomainError::not_found("course").into())
}

async fn view(state: &State, course: Course) -> Result<CourseView, AppError> {
    let instructor = state.store.get_user(course.instructor).await?;

    Ok(CourseView::new(course, instructor.as_ref()))
}

async fn views(state: &State, mut courses: Vec<Course>) -> Result<Vec<CourseView>, AppError> {
    courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

    let mut instructors: HashMap<UserId, Option<User>> = HashMap::new();
    for course in &courses {
        if !instructors.contains_key(&course.instructor) {
            let user = state.store.get_user(course.instructor).await?;
            instructors.insert(course.instructor, user);
        }
    }

    Ok(courses
        .into_iter()
        .map(|course| {
            let instructor = instructors.get(&course.instructor).and_then(Option::as_ref);
            CourseView::new(course, instructor)
        })
        .collect())
}

pub async fn list_courses(state: &State) -> Result<Vec<CourseView>, AppError> {
    let courses = state.store.list_courses().await?;

    views(state, courses).await
}

pub async fn list_courses_by_category(
    state: &State,
    category: &str,
) -> Result<Vec<CourseView>, AppError> {
    let courses = state
        .store
        .list_courses()
        .await?
        .into_iter()
        .filter(|course| course.in_category(category))
        .collect();

    views(state, courses).await
}

pub async fn get_course(state: &State, id: CourseId) -> Result<CourseView, AppError> {
    let course = load_course(state, id).await?;

    view(state, course).await
}

pub async fn create_course(
    state: &State,
    caller: &Caller,
    payload: NewCourse,
) -> Result<CourseView, AppError> {
    caller.require_author()?;

    let course = Course::create(caller.id, payload, Utc::now())?;
    state.store.put_course(&course).await?;
    info!(course_id = %course.id, user_id = %caller.id, "Course created");

    view(state, course).await
}

/// Load, authorize, mutate, persist.
async fn mutate<F>(
    state: &State,
    caller: &Caller,
    id: CourseId,
    apply: F,
) -> Result<CourseView, AppError>
where
    F: FnOnce(&mut Course) -> Result<(), DomainError>,
{
    let mut course = load_course(state, id).await?;
    course.authorize(caller)?;

    apply(&mut course)?;
    state.store.put_course(&course).await?;

    view(state, course).await
}

pub async fn update_course(
    state: &State,
    caller: &Caller,
    id: CourseId,
    update: CourseUpdate,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| course.apply_update(update)).await
}

pub async fn delete_course(state: &State, caller: &Caller, id: CourseId) -> Result<(), AppError> {
    let course = load_course(state, id).await?;
    course.authorize(caller)?;

    if !state.store.delete_course(id).await? {
        return Err(DomainError::not_found("course").into());
    }
    info!(course_id = %id, user_id = %caller.id, "Course deleted");

    Ok(())
}

pub async fn add_section(
    state: &State,
    caller: &Caller,
    id: CourseId,
    input: SectionInput,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| course.add_section(input).map(drop)).await
}

pub async fn update_section(
    state: &State,
    caller: &Caller,
    id: CourseId,
    section: SectionId,
    update: SectionUpdate,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| {
        course.update_section(section, update)
    })
    .await
}

pub async fn delete_section(
    state: &State,
    caller: &Caller,
    id: CourseId,
    section: SectionId,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| course.delete_section(section)).await
}

pub async fn add_video(
    state: &State,
    caller: &Caller,
    id: CourseId,
    section: Option<SectionId>,
    input: VideoInput,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| {
        course.add_video(section, input).map(drop)
    })
    .await
}

pub async fn update_video(
    state: &State,
    caller: &Caller,
    id: CourseId,
    section: Option<SectionId>,
    video: VideoId,
    update: VideoUpdate,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| {
        course.update_video(section, video, update)
    })
    .await
}

pub async fn delete_video(
    state: &State,
    caller: &Caller,
    id: CourseId,
    section: Option<SectionId>,
    video: VideoId,
) -> Result<CourseView, AppError> {
    mutate(state, caller, id, |course| course.delete_video(section, video)).await
}
