use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::DomainError, ids::UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

/// Account record owned by the external auth service. Only the fields consumed here are modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subscription_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub banned: bool,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// No expiry on record means the account is not subscription gated.
    pub fn subscription_active(&self, now: DateTime<Utc>) -> bool {
        self.subscription_expires_at
            .is_none_or(|expires_at| expires_at > now)
    }
}

/// Authenticated identity of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::forbidden("admin access required"))
        }
    }

    pub fn require_self_or_admin(&self, user: UserId) -> Result<(), DomainError> {
        if self.is_admin() || self.id == user {
            Ok(())
        } else {
            Err(DomainError::forbidden("not allowed to access another user's data"))
        }
    }

    pub fn require_author(&self) -> Result<(), DomainError> {
        match self.role {
            Role::Admin | Role::Instructor => Ok(()),
            Role::Student => Err(DomainError::forbidden(
                "only instructors and admins can create courses",
            )),
        }
    }
}
