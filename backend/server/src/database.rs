//! # Redis
//!
//! Document store for users, sessions, courses and enrollments.
//!
//! ## Layout
//!
//! - `user:{id}` JSON document, ids in the `users` set
//! - `session:{token}` user id, written by the auth service
//! - `course:{id}` JSON document, ids in the `courses` set
//! - `enrollment:{id}` hash: `user`, `course`, `current_video_index`, `is_completed`,
//!   `created_at`, `updated_at`, and `completed_at` once completed
//! - `enrollment:{id}:completed` set of completed video indices
//! - `enrollments` set of every enrollment id, `user:{id}:enrollments` per user
//! - `enrollment_pair:{user}:{course}` enrollment id, claimed with `SET NX` by the same script
//!   that writes the enrollment, so a pair is never claimed without its record
//!
//! ## Progress
//!
//! - Completed indices live in a Redis set so a report is an `SADD`, a union by construction
//! - Merge runs as one `MULTI/EXEC` block and reads the merged record back inside it
//! - Completion is only ever set to `1`, never cleared. `HSETNX completed_at` decides which
//!   report made the transition
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courses::{Course, CourseId, Enrollment, EnrollmentId, Progress, User, UserId};
use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::store::{ProgressMerge, Store, StoreError};

const USERS: &str = "users";
const COURSES: &str = "courses";
const ENROLLMENTS: &str = "enrollments";

/// KEYS: pair, enrollment hash, completed set, all enrollments, user enrollments.
/// ARGV: id, user, course, current index, completed flag, created, updated, completed at
/// (empty when unset), then the completed indices.
const INSERT_ENROLLMENT: &str = r#"
if not redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    return 0
end
redis.call('HSET', KEYS[2],
    'user', ARGV[2],
    'course', ARGV[3],
    'current_video_index', ARGV[4],
    'is_completed', ARGV[5],
    'created_at', ARGV[6],
    'updated_at', ARGV[7])
if ARGV[8] ~= '' then
    redis.call('HSET', KEYS[2], 'completed_at', ARGV[8])
end
if #ARGV > 8 then
    redis.call('SADD', KEYS[3], unpack(ARGV, 9))
end
redis.call('SADD', KEYS[4], ARGV[1])
redis.call('SADD', KEYS[5], ARGV[1])
return 1
"#;

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

fn user_key(id: UserId) -> String {
    format!("user:{id}")
}

fn user_enrollments_key(id: UserId) -> String {
    format!("user:{id}:enrollments")
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

fn course_key(id: CourseId) -> String {
    format!("course:{id}")
}

fn enrollment_key(id: EnrollmentId) -> String {
    format!("enrollment:{id}")
}

fn completed_key(id: EnrollmentId) -> String {
    format!("enrollment:{id}:completed")
}

fn pair_key(user: UserId, course: CourseId) -> String {
    format!("enrollment_pair:{user}:{course}")
}

fn corrupt(id: EnrollmentId, field: &str) -> StoreError {
    StoreError::Backend(format!("enrollment {id} has a corrupt {field} field"))
}

fn field<'a>(
    id: EnrollmentId,
    fields: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, StoreError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| corrupt(id, name))
}

fn parse_time(id: EnrollmentId, raw: &str, name: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| corrupt(id, name))
}

fn parse_ref<T: From<Uuid>>(id: EnrollmentId, raw: &str, name: &str) -> Result<T, StoreError> {
    Uuid::parse_str(raw)
        .map(T::from)
        .map_err(|_| corrupt(id, name))
}

fn decode_enrollment(
    id: EnrollmentId,
    fields: HashMap<String, String>,
    completed: Vec<u32>,
) -> Result<Option<Enrollment>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let current_video_index = field(id, &fields, "current_video_index")?
        .parse()
        .map_err(|_| corrupt(id, "current_video_index"))?;

    let completed_at = fields
        .get("completed_at")
        .map(|raw| parse_time(id, raw, "completed_at"))
        .transpose()?;

    Ok(Some(Enrollment {
        id,
        user: parse_ref(id, field(id, &fields, "user")?, "user")?,
        course: parse_ref(id, field(id, &fields, "course")?, "course")?,
        progress: Progress {
            current_video_index,
            completed_videos: completed.into_iter().collect(),
            is_completed: field(id, &fields, "is_completed")? == "1",
        },
        created_at: parse_time(id, field(id, &fields, "created_at")?, "created_at")?,
        updated_at: parse_time(id, field(id, &fields, "updated_at")?, "updated_at")?,
        completed_at,
    }))
}

fn insert_keys(enrollment: &Enrollment) -> [String; 5] {
    [
        pair_key(enrollment.user, enrollment.course),
        enrollment_key(enrollment.id),
        completed_key(enrollment.id),
        ENROLLMENTS.to_string(),
        user_enrollments_key(enrollment.user),
    ]
}

fn insert_args(enrollment: &Enrollment) -> Vec<String> {
    let mut args = vec![
        enrollment.id.to_string(),
        enrollment.user.to_string(),
        enrollment.course.to_string(),
        enrollment.progress.current_video_index.to_string(),
        u8::from(enrollment.progress.is_completed).to_string(),
        enrollment.created_at.to_rfc3339(),
        enrollment.updated_at.to_rfc3339(),
        enrollment
            .completed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default(),
    ];
    args.extend(
        enrollment
            .progress
            .completed_videos
            .iter()
            .map(u32::to_string),
    );

    args
}

pub struct RedisStore {
    connection: ConnectionManager,
    insert_enrollment: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            insert_enrollment: Script::new(INSERT_ENROLLMENT),
        }
    }

    async fn fetch_documents<T: DeserializeOwned>(
        &self,
        keys: Vec<String>,
    ) -> Result<Vec<T>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        let raw: Vec<Option<String>> = connection.mget(keys).await?;

        raw.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .collect()
    }

    async fn fetch_enrollments(&self, ids: Vec<String>) -> Result<Vec<Enrollment>, StoreError> {
        let mut enrollments = Vec::with_capacity(ids.len());
        for raw in ids {
            let Ok(uuid) = Uuid::parse_str(&raw) else {
                continue;
            };
            if let Some(enrollment) = self.get_enrollment(EnrollmentId::from(uuid)).await? {
                enrollments.push(enrollment);
            }
        }

        Ok(enrollments)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut connection)
            .await?;
        Ok(())
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        let json = serde_json::to_string(user)?;
        let mut connection = self.connection.clone();

        redis::pipe()
            .atomic()
            .set(user_key(user.id), json)
            .ignore()
            .sadd(USERS, user.id.to_string())
            .ignore()
            .query_async::<()>(&mut connection)
            .await?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(user_key(id)).await?;

        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.smembers(USERS).await?;

        self.fetch_documents(ids.iter().map(|id| format!("user:{id}")).collect())
            .await
    }

    async fn put_session(&self, token: &str, user: UserId) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .set::<_, _, ()>(session_key(token), user.to_string())
            .await?;
        Ok(())
    }

    async fn session_user(&self, token: &str) -> Result<Option<UserId>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(session_key(token)).await?;

        Ok(raw
            .and_then(|id| Uuid::parse_str(&id).ok())
            .map(UserId::from))
    }

    async fn put_course(&self, course: &Course) -> Result<(), StoreError> {
        let json = serde_json::to_string(course)?;
        let mut connection = self.connection.clone();

        redis::pipe()
            .atomic()
            .set(course_key(course.id), json)
            .ignore()
            .sadd(COURSES, course.id.to_string())
            .ignore()
            .query_async::<()>(&mut connection)
            .await?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(course_key(id)).await?;

        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.smembers(COURSES).await?;

        self.fetch_documents(ids.iter().map(|id| format!("course:{id}")).collect())
            .await
    }

    async fn delete_course(&self, id: CourseId) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let (removed,): (u32,) = redis::pipe()
            .atomic()
            .del(course_key(id))
            .srem(COURSES, id.to_string())
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(removed > 0)
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let mut invocation = self.insert_enrollment.prepare_invoke();
        for key in insert_keys(enrollment) {
            invocation.key(key);
        }
        for arg in insert_args(enrollment) {
            invocation.arg(arg);
        }

        let inserted: i64 = invocation.invoke_async(&mut connection).await?;
        if inserted == 0 {
            return Err(StoreError::Duplicate);
        }

        Ok(())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        let mut connection = self.connection.clone();
        let (fields, completed): (HashMap<String, String>, Vec<u32>) = redis::pipe()
            .hgetall(enrollment_key(id))
            .smembers(completed_key(id))
            .query_async(&mut connection)
            .await?;

        decode_enrollment(id, fields, completed)
    }

    async fn list_enrollments_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.smembers(user_enrollments_key(user)).await?;

        self.fetch_enrollments(ids).await
    }

    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, StoreError> {
        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.smembers(ENROLLMENTS).await?;

        self.fetch_enrollments(ids).await
    }

    async fn merge_progress(
        &self,
        id: EnrollmentId,
        merge: &ProgressMerge,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut connection = self.connection.clone();
        let key = enrollment_key(id);
        let exists: bool = connection.exists(&key).await?;
        if !exists {
            return Ok(None);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        if !merge.patch.completed_videos.is_empty() {
            pipe.sadd(completed_key(id), &merge.patch.completed_videos)
                .ignore();
        }
        if let Some(index) = merge.patch.current_video_index {
            pipe.hset(&key, "current_video_index", index).ignore();
        }
        pipe.hset(&key, "updated_at", merge.at.to_rfc3339())
            .ignore()
            .hgetall(&key)
            .smembers(completed_key(id));

        let (fields, completed): (HashMap<String, String>, Vec<u32>) =
            pipe.query_async(&mut connection).await?;

        decode_enrollment(id, fields, completed)
    }

    async fn mark_completed(
        &self,
        id: EnrollmentId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let key = enrollment_key(id);
        let exists: bool = connection.exists(&key).await?;
        if !exists {
            return Ok(false);
        }

        let (transitioned,): (bool,) = redis::pipe()
            .atomic()
            .hset_nx(&key, "completed_at", at.to_rfc3339())
            .hset(&key, "is_completed", 1)
            .ignore()
            .hset(&key, "updated_at", at.to_rfc3339())
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(transitioned)
    }
}
