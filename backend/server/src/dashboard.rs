use chrono::Utc;
use courses::{AdminStats, Caller, StudentStats, UserId, admin_stats, student_stats};

use crate::{enrollments::with_courses, error::AppError, state::State};

pub async fn student(
    state: &State,
    caller: &Caller,
    user: UserId,
) -> Result<StudentStats, AppError> {
    caller.require_self_or_admin(user)?;

    let enrollments = state.store.list_enrollments_for_user(user).await?;
    let entries = with_courses(state, enrollments).await?;

    Ok(student_stats(&entries))
}

pub async fn admin(state: &State, caller: &Caller) -> Result<AdminStats, AppError> {
    caller.require_admin()?;

    let users = state.store.list_users().await?;
    let total_courses = state.store.list_courses().await?.len();
    let enrollments = state.store.list_enrollments().await?;

    Ok(admin_stats(&users, total_courses, &enrollments, Utc::now()))
}
