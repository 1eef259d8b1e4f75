use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::id::prefix;
use social_common::PrefixedId;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionKind {
    EditPost,
    DeletePost,
    EditComment,
    DeleteComment,
    BanUser,
    UnbanUser,
    UpdateUser,
}

/// Audit record of an administrator acting on someone else's account or
/// content. Written after the change it describes has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminAction {
    pub id: String,
    pub admin_id: String,
    pub action: AdminActionKind,
    /// The user whose account or content was acted on.
    pub target_user: String,
    pub target_post: Option<String>,
    pub target_comment: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdminAction {
    pub fn new(admin_id: &str, action: AdminActionKind, target_user: &str) -> Self {
        Self {
            id: Self::generate(),
            admin_id: admin_id.to_string(),
            action,
            target_user: target_user.to_string(),
            target_post: None,
            target_comment: None,
            old_value: None,
            new_value: None,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn on_post(mut self, post_id: &str) -> Self {
        self.target_post = Some(post_id.to_string());
        self
    }

    pub fn on_comment(mut self, post_id: &str, comment_id: &str) -> Self {
        self.target_post = Some(post_id.to_string());
        self.target_comment = Some(comment_id.to_string());
        self
    }

    pub fn change(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_value = Some(old.into());
        self.new_value = Some(new.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl PrefixedId for AdminAction {
    const PREFIX: &'static str = prefix::ADMIN_ACTION;
}
