#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use courses::{Course, NewCourse, Role, User, UserId, VideoInput};
use http_body_util::BodyExt;
use serde_json::Value;
use server::{
    app,
    config::Config,
    memory::MemoryStore,
    notify::{Mail, Notifier, NotifyError, Template},
    state::State,
    store::Store,
};
use tower::ServiceExt;

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Template, String)>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, mail: Mail<'_>) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Rejected(503));
        }
        self.sent
            .lock()
            .expect("notifier lock")
            .push((mail.template, mail.to.to_string()));
        Ok(())
    }
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<Template> {
        self.sent
            .lock()
            .expect("notifier lock")
            .iter()
            .map(|(template, _)| *template)
            .collect()
    }
}

pub struct Harness {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let state = State::with_parts(Config::default(), store.clone(), notifier.clone());

        Self {
            app: app(state),
            store,
            notifier,
        }
    }

    pub async fn user_at(&self, role: Role, created_at: DateTime<Utc>) -> (User, String) {
        let id = UserId::new();
        let user = User {
            id,
            name: format!("user-{id}"),
            email: format!("{id}@example.com"),
            role,
            created_at,
            subscription_expires_at: None,
            banned: false,
        };
        self.store.put_user(&user).await.expect("put user");

        let token = format!("token-{id}");
        self.store
            .put_session(&token, id)
            .await
            .expect("put session");

        (user, token)
    }

    pub async fn user(&self, role: Role) -> (User, String) {
        self.user_at(role, Utc::now()).await
    }

    /// Flat course with `videos` videos of ten minutes each, stored directly.
    pub async fn seed_course(&self, owner: UserId, videos: usize) -> Course {
        let payload = NewCourse {
            title: "Seeded".to_string(),
            description: "Seeded course".to_string(),
            category: "Testing".to_string(),
            thumbnail: None,
            duration: 2.0,
            sections: None,
            videos: Some(
                (0..videos)
                    .map(|i| VideoInput {
                        title: format!("video {i}"),
                        url: format!("https://cdn.example.com/{i}.mp4"),
                        duration_seconds: 600,
                    })
                    .collect(),
            ),
        };
        let course = Course::create(owner, payload, Utc::now()).expect("valid course");
        self.store.put_course(&course).await.expect("put course");

        course
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }
}
