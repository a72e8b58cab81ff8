// 👤 Reviewer - an identity that can approve trackers
//
// Superusers may also ship trackers to Exodus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anonymous,
    Reviewer,
    Superuser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_superuser: bool,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str) -> Self {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            is_superuser: false,
            created: Utc::now(),
        }
    }

    pub fn superuser(username: &str) -> Self {
        let mut user = Self::new(username);
        user.is_superuser = true;
        user
    }

    pub fn role(&self) -> Role {
        if self.is_superuser {
            Role::Superuser
        } else {
            Role::Reviewer
        }
    }
}

/// Role of an optional (possibly unauthenticated) actor
pub fn role_of(actor: Option<&User>) -> Role {
    actor.map(User::role).unwrap_or(Role::Anonymous)
}
