use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    course::Course,
    enrollment::Enrollment,
    progress::{percentage, progress_percentage},
    user::User,
};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub courses_completed: usize,
    pub study_hours: u64,
    pub enrolled_courses: usize,
    pub certificates: usize,
    pub average_progress: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub total_courses: usize,
    pub new_users_this_month: usize,
    pub total_enrollments: usize,
    pub active_enrollments: usize,
    pub completed_enrollments: usize,
    pub course_completion_rate: u8,
    pub distinct_students: usize,
}

/// `None` marks an enrollment whose course no longer exists.
pub fn student_stats(entries: &[(Enrollment, Option<Course>)]) -> StudentStats {
    let mut courses_completed = 0;
    let mut watched_seconds: u64 = 0;
    let mut percentage_sum: u64 = 0;

    for (enrollment, course) in entries {
        let done = enrollment.progress.is_completed;
        if done {
            courses_completed += 1;
        }

        match course {
            Some(course) => {
                let videos = course.content.videos();
                watched_seconds += enrollment
                    .progress
                    .completed_videos
                    .iter()
                    .filter_map(|&index| videos.get(index as usize))
                    .map(|video| u64::from(video.duration_seconds))
                    .sum::<u64>();
                percentage_sum += u64::from(progress_percentage(enrollment, course));
            }
            None if done => percentage_sum += 100,
            None => {}
        }
    }

    let enrolled_courses = entries.len();
    let average_progress = if enrolled_courses == 0 {
        0
    } else {
        (percentage_sum as f64 / enrolled_courses as f64)
            .round()
            .clamp(0.0, 100.0) as u8
    };

    StudentStats {
        courses_completed,
        study_hours: (watched_seconds as f64 / SECONDS_PER_HOUR).round() as u64,
        enrolled_courses,
        certificates: courses_completed,
        average_progress,
    }
}

/// First instant of `now`'s calendar month, UTC.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|start| start.and_utc())
        .unwrap_or(now)
}

pub fn admin_stats(
    users: &[User],
    total_courses: usize,
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
) -> AdminStats {
    let since = month_start(now);
    let members: Vec<&User> = users.iter().filter(|user| !user.is_admin()).collect();
    let completed_enrollments = enrollments
        .iter()
        .filter(|e| e.progress.is_completed)
        .count();
    let distinct_students = enrollments
        .iter()
        .map(|e| e.user)
        .collect::<HashSet<_>>()
        .len();

    AdminStats {
        total_users: members.len(),
        total_courses,
        new_users_this_month: members.iter().filter(|u| u.created_at >= since).count(),
        total_enrollments: enrollments.len(),
        active_enrollments: enrollments.len() - completed_enrollments,
        completed_enrollments,
        course_completion_rate: if enrollments.is_empty() {
            0
        } else {
            percentage(completed_enrollments, enrollments.len())
        },
        distinct_students,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{
        course::{NewCourse, VideoInput},
        ids::UserId,
        user::Role,
    };

    fn course(video_seconds: &[u32]) -> Course {
        let videos = video_seconds
            .iter()
            .enumerate()
            .map(|(i, &seconds)| VideoInput {
                title: format!("v{i}"),
                url: format!("https://cdn.example.com/{i}.mp4"),
                duration_seconds: seconds,
            })
            .collect();
        let payload = NewCourse {
            title: "Course".to_string(),
            description: "About".to_string(),
            category: String::new(),
            thumbnail: None,
            duration: 1.0,
            sections: None,
            videos: Some(videos),
        };
        Course::create(UserId::new(), payload, Utc::now()).unwrap()
    }

    fn enrolled(user: UserId, course: &Course, completed: &[u32], done: bool) -> Enrollment {
        let mut enrollment = Enrollment::new(user, course.id, Utc::now());
        enrollment.progress.completed_videos.extend(completed);
        enrollment.progress.is_completed = done;
        enrollment
    }

    fn user(role: Role, created_at: DateTime<Utc>) -> User {
        User {
            id: UserId::new(),
            name: "u".to_string(),
            email: "u@example.com".to_string(),
            role,
            created_at,
            subscription_expires_at: None,
            banned: false,
        }
    }

    #[test]
    fn test_student_stats_without_enrollments() {
        assert_eq!(student_stats(&[]), StudentStats::default());
    }

    #[test]
    fn test_student_stats_aggregates() {
        let me = UserId::new();
        let long = course(&[1800, 1800, 3600, 3600]);
        let short = course(&[900, 900]);
        let entries = vec![
            (enrolled(me, &long, &[0, 1, 2], false), Some(long.clone())),
            (enrolled(me, &short, &[0, 1], true), Some(short.clone())),
        ];

        let stats = student_stats(&entries);
        assert_eq!(stats.enrolled_courses, 2);
        assert_eq!(stats.courses_completed, 1);
        assert_eq!(stats.certificates, 1);
        // 7200s + 1800s = 2.5h
        assert_eq!(stats.study_hours, 3);
        assert_eq!(stats.average_progress, 88);
    }

    #[test]
    fn test_student_stats_with_missing_course() {
        let me = UserId::new();
        let gone = course(&[60]);
        let entries = vec![(enrolled(me, &gone, &[0], false), None)];

        let stats = student_stats(&entries);
        assert_eq!(stats.enrolled_courses, 1);
        assert_eq!(stats.study_hours, 0);
        assert_eq!(stats.average_progress, 0);
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 15, 4, 5).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_admin_stats_scenario() {
        let now = Utc::now();
        let old = month_start(now) - Duration::days(40);

        let mut users: Vec<User> = (0..8).map(|_| user(Role::Student, old)).collect();
        users.push(user(Role::Student, now));
        users.push(user(Role::Instructor, month_start(now)));
        users.push(user(Role::Admin, now));

        let catalog = course(&[60, 60]);
        let enrollments: Vec<Enrollment> = (0..8)
            .map(|i| enrolled(users[i % 4].id, &catalog, &[], i < 3))
            .collect();

        let stats = admin_stats(&users, 5, &enrollments, now);
        assert_eq!(stats.total_users, 10);
        assert_eq!(stats.new_users_this_month, 2);
        assert_eq!(stats.total_courses, 5);
        assert_eq!(stats.total_enrollments, 8);
        assert_eq!(stats.completed_enrollments, 3);
        assert_eq!(stats.active_enrollments, 5);
        assert_eq!(stats.course_completion_rate, 38);
        assert_eq!(stats.distinct_students, 4);
    }

    #[test]
    fn test_admin_stats_empty_system() {
        let stats = admin_stats(&[], 0, &[], Utc::now());
        assert_eq!(stats.course_completion_rate, 0);
        assert_eq!(stats.distinct_students, 0);
    }
}
