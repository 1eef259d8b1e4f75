use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::id::prefix;
use social_common::PrefixedId;
use utoipa::ToSchema;

use super::user::UserSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: UserSummary,
    pub content: String,
    /// Set when this comment is a reply.
    pub parent_id: Option<String>,
    pub likes: Vec<String>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }
}

impl PrefixedId for Comment {
    const PREFIX: &'static str = prefix::COMMENT;
}
