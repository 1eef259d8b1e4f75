use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::id::prefix;
use social_common::PrefixedId;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub badges: Vec<String>,
    pub titles: Vec<String>,
    pub is_banned: bool,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: display_name.into(),
            avatar_url: None,
            role: Role::User,
            badges: Vec::new(),
            titles: Vec::new(),
            is_banned: false,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The populated form embedded in posts, comments and notifications.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            role: self.role,
            badges: self.badges.clone(),
            titles: self.titles.clone(),
        }
    }
}

/// Author/sender fields embedded in other entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub badges: Vec<String>,
    pub titles: Vec<String>,
}

/// Partial update applied by an administrator.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct UserCosmetics {
    pub role: Option<Role>,
    pub badges: Option<Vec<String>>,
    pub titles: Option<Vec<String>>,
}

impl PrefixedId for User {
    const PREFIX: &'static str = prefix::USER;
}
