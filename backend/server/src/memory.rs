use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courses::{Course, CourseId, Enrollment, EnrollmentId, User, UserId};
use tokio::sync::Mutex;

use crate::store::{ProgressMerge, Store, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sessions: HashMap<String, UserId>,
    courses: HashMap<CourseId, Course>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    pairs: HashMap<(UserId, CourseId), EnrollmentId>,
}

/// In-process store. One lock guards every table, so each call is atomic like its Redis counterpart.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables.lock().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.lock().await.users.values().cloned().collect())
    }

    async fn put_session(&self, token: &str, user: UserId) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .sessions
            .insert(token.to_string(), user);
        Ok(())
    }

    async fn session_user(&self, token: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(token).copied())
    }

    async fn put_course(&self, course: &Course) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .courses
            .insert(course.id, course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        Ok(self.tables.lock().await.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.tables.lock().await.courses.values().cloned().collect())
    }

    async fn delete_course(&self, id: CourseId) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.courses.remove(&id).is_some())
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let pair = (enrollment.user, enrollment.course);
        if tables.pairs.contains_key(&pair) {
            return Err(StoreError::Duplicate);
        }

        tables.pairs.insert(pair, enrollment.id);
        tables
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.tables.lock().await.enrollments.get(&id).cloned())
    }

    async fn list_enrollments_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .values()
            .filter(|e| e.user == user)
            .cloned()
            .collect())
    }

    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .values()
            .cloned()
            .collect())
    }

    async fn merge_progress(
        &self,
        id: EnrollmentId,
        merge: &ProgressMerge,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(enrollment) = tables.enrollments.get_mut(&id) else {
            return Ok(None);
        };

        enrollment.progress.merge(&merge.patch);
        enrollment.updated_at = merge.at;

        Ok(Some(enrollment.clone()))
    }

    async fn mark_completed(
        &self,
        id: EnrollmentId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .get_mut(&id)
            .is_some_and(|enrollment| enrollment.complete(at)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courses::ProgressPatch;

    use super::*;

    #[tokio::test]
    async fn test_duplicate_pair_is_rejected() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let course = CourseId::new();

        store
            .insert_enrollment(&Enrollment::new(user, course, Utc::now()))
            .await
            .unwrap();
        let second = store
            .insert_enrollment(&Enrollment::new(user, course, Utc::now()))
            .await;

        assert!(matches!(second, Err(StoreError::Duplicate)));
        assert_eq!(store.list_enrollments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_every_index() {
        let store = Arc::new(MemoryStore::new());
        let enrollment = Enrollment::new(UserId::new(), CourseId::new(), Utc::now());
        store.insert_enrollment(&enrollment).await.unwrap();

        let tasks: Vec<_> = (0..32u32)
            .map(|index| {
                let store = store.clone();
                let id = enrollment.id;
                tokio::spawn(async move {
                    let merge = ProgressMerge {
                        patch: ProgressPatch {
                            current_video_index: Some(index),
                            completed_videos: vec![index],
                            is_completed: None,
                        },
                        at: Utc::now(),
                    };
                    store.merge_progress(id, &merge).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let merged = store.get_enrollment(enrollment.id).await.unwrap().unwrap();
        assert_eq!(merged.progress.completed_videos.len(), 32);
    }

    #[tokio::test]
    async fn test_merge_unknown_enrollment() {
        let store = MemoryStore::new();
        let merge = ProgressMerge {
            patch: ProgressPatch {
                completed_videos: vec![0],
                ..ProgressPatch::default()
            },
            at: Utc::now(),
        };

        assert!(
            store
                .merge_progress(EnrollmentId::new(), &merge)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_mark_completed_reports_the_transition_once() {
        let store = MemoryStore::new();
        let enrollment = Enrollment::new(UserId::new(), CourseId::new(), Utc::now());
        store.insert_enrollment(&enrollment).await.unwrap();

        let first = Utc::now();
        assert!(store.mark_completed(enrollment.id, first).await.unwrap());
        assert!(!store.mark_completed(enrollment.id, Utc::now()).await.unwrap());
        assert!(!store.mark_completed(EnrollmentId::new(), Utc::now()).await.unwrap());

        let stored = store.get_enrollment(enrollment.id).await.unwrap().unwrap();
        assert!(stored.progress.is_completed);
        assert_eq!(stored.completed_at, Some(first));
    }
}
