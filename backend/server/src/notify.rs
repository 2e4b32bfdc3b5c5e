//! # Notifications
//!
//! Transactional mail goes through an external relay. Delivery is best effort, a failed
//! notification is logged and never fails the request that triggered it.
use std::time::Duration;

use async_trait::async_trait;
use courses::{Course, User};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Relay transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Relay rejected the message with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    EnrollmentCreated,
    CourseCompleted,
}

#[derive(Debug, Serialize)]
pub struct Mail<'a> {
    pub template: Template,
    pub to: &'a str,
    pub name: &'a str,
    pub course: &'a str,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: Mail<'_>) -> Result<(), NotifyError>;
}

pub async fn notify(notifier: &dyn Notifier, template: Template, user: &User, course: &Course) {
    let mail = Mail {
        template,
        to: &user.email,
        name: &user.name,
        course: &course.title,
    };

    if let Err(e) = notifier.send(mail).await {
        warn!(
            user_id = %user.id,
            course_id = %course.id,
            ?template,
            "Notification dropped: {e}"
        );
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, mail: Mail<'_>) -> Result<(), NotifyError> {
        info!(template = ?mail.template, to = mail.to, course = mail.course, "Notification");
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
    key: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: &str, key: Option<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            key,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, mail: Mail<'_>) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.url).json(&mail);
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}
