//! Persistence service boundary.
//!
//! The document store is an external collaborator. Handlers only see the
//! [`Store`] trait; [`memory::MemoryStore`] backs tests and local runs.

pub mod kv;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::models::admin_action::{AdminAction, AdminActionKind};
use crate::models::comment::Comment;
use crate::models::follow::Follow;
use crate::models::friend_request::{FriendRequest, FriendRequestStatus};
use crate::models::notification::Notification;
use crate::models::post::{Post, Visibility};
use crate::models::user::{User, UserCosmetics};

pub use memory::MemoryStore;

/// A document as it was before and after one in-place change.
#[derive(Debug, Clone)]
pub struct Revision<T> {
    pub before: T,
    pub after: T,
}

/// Field changes for a post edit. `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Create/read/change/soft-delete per entity.
///
/// Every change is applied to the stored document in place, never by
/// writing back a copy the caller read earlier. Soft-deleted posts and
/// comments are refused with `NOT_FOUND`. Implementations also enforce
/// username uniqueness and relationship integrity (one follow edge per
/// pair, one open friend request per pair).
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn create_user(&self, user: User) -> Result<User, ApiError>;
    async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError>;
    /// Apply the set fields and repaint the user's embedded author copies.
    async fn update_cosmetics(&self, id: &str, cosmetics: UserCosmetics) -> Result<Revision<User>, ApiError>;
    async fn set_banned(&self, id: &str, banned: bool) -> Result<User, ApiError>;
    async fn set_presence(&self, id: &str, online: bool, at: DateTime<Utc>) -> Result<(), ApiError>;

    // Posts
    async fn create_post(&self, post: Post) -> Result<Post, ApiError>;
    async fn get_post(&self, id: &str) -> Result<Option<Post>, ApiError>;
    /// Content changes mark the post edited; an unchanged content does not.
    async fn edit_post(&self, id: &str, edit: PostEdit) -> Result<Revision<Post>, ApiError>;
    /// Flip `user_id`'s like. Returns the post and whether it is now liked.
    async fn toggle_post_like(&self, id: &str, user_id: &str) -> Result<(Post, bool), ApiError>;
    async fn soft_delete_post(&self, id: &str) -> Result<Post, ApiError>;

    // Comments
    async fn create_comment(&self, comment: Comment) -> Result<Comment, ApiError>;
    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, ApiError>;
    async fn edit_comment(&self, id: &str, content: String) -> Result<Revision<Comment>, ApiError>;
    async fn toggle_comment_like(&self, id: &str, user_id: &str) -> Result<(Comment, bool), ApiError>;
    async fn soft_delete_comment(&self, id: &str) -> Result<Comment, ApiError>;

    // Follows
    async fn create_follow(&self, follow: Follow) -> Result<Follow, ApiError>;
    /// Returns `false` when no such edge existed.
    async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<bool, ApiError>;
    async fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool, ApiError>;

    // Friend requests
    async fn create_friend_request(&self, request: FriendRequest) -> Result<FriendRequest, ApiError>;
    async fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequest>, ApiError>;
    /// Move a pending request to `status`. Answered requests are refused.
    async fn answer_friend_request(&self, id: &str, status: FriendRequestStatus) -> Result<FriendRequest, ApiError>;
    /// The pending or accepted request between two users, in either direction.
    async fn find_open_friend_request(&self, a: &str, b: &str) -> Result<Option<FriendRequest>, ApiError>;
    /// Delete the request only while it is still in `expected` status.
    async fn delete_friend_request(&self, id: &str, expected: FriendRequestStatus) -> Result<FriendRequest, ApiError>;
    /// Ids of everyone with an accepted request to or from `user_id`.
    async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, ApiError>;

    // Notifications
    async fn create_notification(&self, notification: Notification) -> Result<Notification, ApiError>;
    /// Newest first.
    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>, ApiError>;
    async fn unread_notification_count(&self, recipient_id: &str) -> Result<usize, ApiError>;
    /// Mark the given notifications read, or all of the recipient's when
    /// `ids` is `None`. Returns how many changed.
    async fn mark_notifications_read(&self, recipient_id: &str, ids: Option<&[String]>) -> Result<usize, ApiError>;

    // Admin audit trail
    async fn record_admin_action(&self, action: AdminAction) -> Result<AdminAction, ApiError>;
    /// Newest first, optionally narrowed by kind and target user.
    async fn list_admin_actions(
        &self,
        kind: Option<AdminActionKind>,
        target_user: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AdminAction>, ApiError>;
}
