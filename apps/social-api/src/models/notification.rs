use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::id::prefix;
use social_common::PrefixedId;
use utoipa::ToSchema;

use super::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LikePost,
    LikeComment,
    Comment,
    Reply,
    FriendRequest,
    FriendAccepted,
    FriendDeclined,
    NewFollower,
    /// A friend published a post.
    NewPost,
    /// An administrator removed one of the recipient's comments.
    CommentDeletedByAdmin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender: UserSummary,
    pub kind: NotificationKind,
    pub message: String,
    pub related_post: Option<String>,
    pub related_comment: Option<String>,
    pub related_user: Option<String>,
    pub related_friend_request: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// A fresh unread notification with no related entities set.
    pub fn new(
        id: String,
        recipient_id: &str,
        sender: UserSummary,
        kind: NotificationKind,
        message: String,
    ) -> Self {
        Self {
            id,
            recipient_id: recipient_id.to_string(),
            sender,
            kind,
            message,
            related_post: None,
            related_comment: None,
            related_user: None,
            related_friend_request: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

impl PrefixedId for Notification {
    const PREFIX: &'static str = prefix::NOTIFICATION;
}
