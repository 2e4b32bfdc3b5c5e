mod support;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use courses::{Role, User};
use serde_json::{Value, json};
use server::{notify::Template, store::Store};
use support::{Harness, RecordingNotifier};

async fn enroll(
    harness: &Harness,
    token: &str,
    user: &User,
    course: &str,
) -> (StatusCode, Value) {
    harness
        .post(
            "/enrollments/create",
            token,
            json!({"userId": user.id.to_string(), "courseId": course}),
        )
        .await
}

async fn report(
    harness: &Harness,
    token: &str,
    enrollment: &str,
    progress: Value,
) -> (StatusCode, Value) {
    harness
        .put(
            &format!("/enrollments/update/{enrollment}"),
            token,
            json!({"progress": progress}),
        )
        .await
}

#[tokio::test]
async fn progress_reaches_completion_on_last_video() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 4).await;

    let (status, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["data"]["progress"],
        json!({"currentVideoIndex": 0, "completedVideos": [], "isCompleted": false})
    );
    assert_eq!(body["data"]["state"], "not_started");
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, body) = report(
        &harness,
        &token,
        &id,
        json!({"currentVideoIndex": 2, "completedVideos": [0, 1, 2]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progressPercentage"], 75);
    assert_eq!(body["data"]["progress"]["isCompleted"], false);
    assert_eq!(body["data"]["state"], "in_progress");

    let (status, body) = report(&harness, &token, &id, json!({"completedVideos": [3]})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progressPercentage"], 100);
    assert_eq!(body["data"]["progress"]["isCompleted"], true);
    assert_eq!(body["data"]["progress"]["completedVideos"], json!([0, 1, 2, 3]));
    assert_eq!(body["data"]["progress"]["currentVideoIndex"], 2);
    assert_eq!(body["data"]["state"], "completed");

    assert_eq!(
        harness.notifier.templates(),
        [Template::EnrollmentCreated, Template::CourseCompleted]
    );
}

#[tokio::test]
async fn second_enrollment_is_a_conflict() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 2).await;

    let (status, _) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        json!({"success": false, "message": "Already enrolled in this course"})
    );

    let stored = harness
        .store
        .list_enrollments_for_user(student.id)
        .await
        .expect("list");
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn only_owner_or_admin_reports_progress() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student_b, token_b) = harness.user(Role::Student).await;
    let (_, token_a) = harness.user(Role::Student).await;
    let (_, admin) = harness.user(Role::Admin).await;
    let course = harness.seed_course(instructor.id, 3).await;

    let (_, body) = enroll(&harness, &token_b, &student_b, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, body) = report(&harness, &token_a, &id, json!({"completedVideos": [0]})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = report(&harness, &admin, &id, json!({"completedVideos": [0]})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress"]["completedVideos"], json!([0]));

    let (status, _) = harness
        .get(&format!("/enrollments/{id}"), Some(&token_a))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn enrollment_requires_both_ids() {
    let harness = Harness::new();
    let (student, token) = harness.user(Role::Student).await;

    let (status, body) = harness
        .post(
            "/enrollments/create",
            &token,
            json!({"userId": student.id.to_string()}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "courseId is required");

    let (status, _) = harness.post("/enrollments/create", &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = uuid::Uuid::new_v4().to_string();
    let (status, body) = enroll(&harness, &token, &student, &unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "course not found");
}

#[tokio::test]
async fn students_cannot_enroll_others() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, _) = harness.user(Role::Student).await;
    let (_, other) = harness.user(Role::Student).await;
    let (_, admin) = harness.user(Role::Admin).await;
    let course = harness.seed_course(instructor.id, 1).await;

    let (status, _) = enroll(&harness, &other, &student, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = enroll(&harness, &admin, &student, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"], student.id.to_string());
}

#[tokio::test]
async fn user_listing_is_private() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let (_, other) = harness.user(Role::Student).await;
    let first = harness.seed_course(instructor.id, 2).await;
    let second = harness.seed_course(instructor.id, 2).await;
    enroll(&harness, &token, &student, &first.id.to_string()).await;
    enroll(&harness, &token, &student, &second.id.to_string()).await;

    let uri = format!("/enrollments/user/{}", student.id);
    let (status, body) = harness.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["course"]["title"], "Seeded");
    assert_eq!(body["data"][0]["courseUnavailable"], false);

    let (status, _) = harness.get(&uri, Some(&other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = harness.get(&uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn course_roster_is_for_its_instructor() {
    let harness = Harness::new();
    let (instructor, owner) = harness.user(Role::Instructor).await;
    let (_, rival) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 2).await;
    enroll(&harness, &token, &student, &course.id.to_string()).await;

    let uri = format!("/enrollments/course/{}", course.id);
    let (status, body) = harness.get(&uri, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["user"], student.id.to_string());

    let (status, _) = harness.get(&uri, Some(&rival)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completion_never_reverts() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 2).await;
    let (_, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    report(&harness, &token, &id, json!({"completedVideos": [0, 1]})).await;

    let (status, body) = report(
        &harness,
        &token,
        &id,
        json!({"currentVideoIndex": 0, "completedVideos": [], "isCompleted": false}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress"]["isCompleted"], true);
    assert_eq!(body["data"]["progress"]["completedVideos"], json!([0, 1]));
    assert_eq!(body["data"]["progress"]["currentVideoIndex"], 0);

    assert_eq!(
        harness
            .notifier
            .templates()
            .iter()
            .filter(|t| **t == Template::CourseCompleted)
            .count(),
        1
    );
}

#[tokio::test]
async fn completion_flag_needs_the_last_video() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 4).await;
    let (_, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (_, body) = report(
        &harness,
        &token,
        &id,
        json!({"completedVideos": [0], "isCompleted": true}),
    )
    .await;
    assert_eq!(body["data"]["progress"]["isCompleted"], false);
    assert_eq!(body["data"]["progressPercentage"], 25);

    let (_, body) = report(
        &harness,
        &token,
        &id,
        json!({"completedVideos": [3], "isCompleted": true}),
    )
    .await;
    assert_eq!(body["data"]["progress"]["isCompleted"], true);
    assert_eq!(body["data"]["progressPercentage"], 50);
}

#[tokio::test]
async fn out_of_range_indices_are_rejected() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 3).await;
    let (_, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, _) = report(&harness, &token, &id, json!({"completedVideos": [3]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = report(&harness, &token, &id, json!({"completedVideos": [-1]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = report(&harness, &token, &id, json!({"currentVideoIndex": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = harness
        .get(&format!("/enrollments/{id}"), Some(&token))
        .await;
    assert_eq!(body["data"]["progress"]["completedVideos"], json!([]));
}

#[tokio::test]
async fn unknown_enrollment_is_not_found() {
    let harness = Harness::new();
    let (_, token) = harness.user(Role::Student).await;

    let (status, body) = report(
        &harness,
        &token,
        &uuid::Uuid::new_v4().to_string(),
        json!({"completedVideos": [0]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "enrollment not found");

    let (status, _) = report(&harness, &token, "garbage", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn certificate_after_completion() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 1).await;
    let (_, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();
    let uri = format!("/enrollments/{id}/certificate");

    let (status, body) = harness.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "course not completed");

    let (_, body) = report(&harness, &token, &id, json!({"completedVideos": [0]})).await;
    let completed_at = body["data"]["completedAt"].clone();
    assert!(completed_at.is_string());

    let (status, body) = harness.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enrollmentId"], id);
    assert_eq!(body["data"]["courseTitle"], "Seeded");
    assert_eq!(body["data"]["userId"], student.id.to_string());
    assert_eq!(body["data"]["issuedAt"], completed_at);

    let (_, body) = report(&harness, &token, &id, json!({"currentVideoIndex": 0})).await;
    assert_eq!(body["data"]["completedAt"], completed_at);

    let (_, body) = harness.get(&uri, Some(&token)).await;
    assert_eq!(body["data"]["issuedAt"], completed_at);
}

#[tokio::test]
async fn deleted_course_leaves_enrollment_readable() {
    let harness = Harness::new();
    let (instructor, owner) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 2).await;
    let (_, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, _) = harness
        .delete(&format!("/courses/{}", course.id), &owner)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness
        .get(&format!("/enrollments/{id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["course"], Value::Null);
    assert_eq!(body["data"]["courseUnavailable"], true);
    assert_eq!(body["data"]["progressPercentage"], 0);

    let (status, body) = report(&harness, &token, &id, json!({"completedVideos": [0]})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "course is no longer available");
}

#[tokio::test]
async fn failed_notification_keeps_enrollment() {
    let harness = Harness::with_notifier(RecordingNotifier {
        fail: true,
        ..Default::default()
    });
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 1).await;

    let (status, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(harness.notifier.templates().is_empty());
}

#[tokio::test]
async fn banned_and_lapsed_accounts_are_refused() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let course = harness.seed_course(instructor.id, 1).await;

    let (mut banned, banned_token) = harness.user(Role::Student).await;
    banned.banned = true;
    harness.store.put_user(&banned).await.expect("put user");
    let (status, body) = enroll(&harness, &banned_token, &banned, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "account is banned");

    let (mut lapsed, lapsed_token) = harness.user(Role::Student).await;
    lapsed.subscription_expires_at = Some(Utc::now() - Duration::days(1));
    harness.store.put_user(&lapsed).await.expect("put user");
    let (status, body) = enroll(&harness, &lapsed_token, &lapsed, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "subscription has expired");

    let (mut active, active_token) = harness.user(Role::Student).await;
    active.subscription_expires_at = Some(Utc::now() + Duration::days(30));
    harness.store.put_user(&active).await.expect("put user");
    let (status, _) = enroll(&harness, &active_token, &active, &course.id.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn concurrent_reports_keep_every_video() {
    let harness = Harness::new();
    let (instructor, _) = harness.user(Role::Instructor).await;
    let (student, token) = harness.user(Role::Student).await;
    let course = harness.seed_course(instructor.id, 4).await;
    let (_, body) = enroll(&harness, &token, &student, &course.id.to_string()).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (a, b, c, d) = tokio::join!(
        report(&harness, &token, &id, json!({"completedVideos": [0]})),
        report(&harness, &token, &id, json!({"completedVideos": [1]})),
        report(&harness, &token, &id, json!({"completedVideos": [2]})),
        report(&harness, &token, &id, json!({"completedVideos": [3]})),
    );
    for (status, _) in [a, b, c, d] {
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = harness
        .get(&format!("/enrollments/{id}"), Some(&token))
        .await;
    assert_eq!(body["data"]["progress"]["completedVideos"], json!([0, 1, 2, 3]));
    assert_eq!(body["data"]["progress"]["isCompleted"], true);
    assert_eq!(
        harness
            .notifier
            .templates()
            .iter()
            .filter(|t| **t == Template::CourseCompleted)
            .count(),
        1
    );
}
