//! A [`Store`] that yields before every call, so concurrent handlers
//! interleave at each await point. It can also hold the next offline
//! presence write until the test releases it.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, Semaphore};

use social_api::error::ApiError;
use social_api::models::admin_action::{AdminAction, AdminActionKind};
use social_api::models::comment::Comment;
use social_api::models::follow::Follow;
use social_api::models::friend_request::{FriendRequest, FriendRequestStatus};
use social_api::models::notification::Notification;
use social_api::models::post::Post;
use social_api::models::user::{User, UserCosmetics};
use social_api::store::memory::MemoryStore;
use social_api::store::{PostEdit, Revision, Store};

pub struct SlowStore {
    inner: MemoryStore,
    hold_offline: AtomicBool,
    entered: Notify,
    release: Semaphore,
}

impl SlowStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            hold_offline: AtomicBool::new(false),
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    /// Park the next `set_presence(.., false, ..)` until [`Self::release_offline`].
    pub fn hold_next_offline(&self) {
        self.hold_offline.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held offline write is parked.
    pub async fn offline_held(&self) {
        self.entered.notified().await;
    }

    pub fn release_offline(&self) {
        self.release.add_permits(1);
    }
}

#[async_trait]
impl Store for SlowStore {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        tokio::task::yield_now().await;
        self.inner.create_user(user).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.get_user(id).await
    }

    async fn update_cosmetics(&self, id: &str, cosmetics: UserCosmetics) -> Result<Revision<User>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.update_cosmetics(id, cosmetics).await
    }

    async fn set_banned(&self, id: &str, banned: bool) -> Result<User, ApiError> {
        tokio::task::yield_now().await;
        self.inner.set_banned(id, banned).await
    }

    async fn set_presence(&self, id: &str, online: bool, at: DateTime<Utc>) -> Result<(), ApiError> {
        if !online && self.hold_offline.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        tokio::task::yield_now().await;
        self.inner.set_presence(id, online, at).await
    }

    async fn create_post(&self, post: Post) -> Result<Post, ApiError> {
        tokio::task::yield_now().await;
        self.inner.create_post(post).await
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.get_post(id).await
    }

    async fn edit_post(&self, id: &str, edit: PostEdit) -> Result<Revision<Post>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.edit_post(id, edit).await
    }

    async fn toggle_post_like(&self, id: &str, user_id: &str) -> Result<(Post, bool), ApiError> {
        tokio::task::yield_now().await;
        self.inner.toggle_post_like(id, user_id).await
    }

    async fn soft_delete_post(&self, id: &str) -> Result<Post, ApiError> {
        tokio::task::yield_now().await;
        self.inner.soft_delete_post(id).await
    }

    async fn create_comment(&self, comment: Comment) -> Result<Comment, ApiError> {
        tokio::task::yield_now().await;
        self.inner.create_comment(comment).await
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.get_comment(id).await
    }

    async fn edit_comment(&self, id: &str, content: String) -> Result<Revision<Comment>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.edit_comment(id, content).await
    }

    async fn toggle_comment_like(&self, id: &str, user_id: &str) -> Result<(Comment, bool), ApiError> {
        tokio::task::yield_now().await;
        self.inner.toggle_comment_like(id, user_id).await
    }

    async fn soft_delete_comment(&self, id: &str) -> Result<Comment, ApiError> {
        tokio::task::yield_now().await;
        self.inner.soft_delete_comment(id).await
    }

    async fn create_follow(&self, follow: Follow) -> Result<Follow, ApiError> {
        tokio::task::yield_now().await;
        self.inner.create_follow(follow).await
    }

    async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<bool, ApiError> {
        tokio::task::yield_now().await;
        self.inner.delete_follow(follower_id, following_id).await
    }

    async fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool, ApiError> {
        tokio::task::yield_now().await;
        self.inner.is_following(follower_id, following_id).await
    }

    async fn create_friend_request(&self, request: FriendRequest) -> Result<FriendRequest, ApiError> {
        tokio::task::yield_now().await;
        self.inner.create_friend_request(request).await
    }

    async fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequest>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.get_friend_request(id).await
    }

    async fn answer_friend_request(&self, id: &str, status: FriendRequestStatus) -> Result<FriendRequest, ApiError> {
        tokio::task::yield_now().await;
        self.inner.answer_friend_request(id, status).await
    }

    async fn find_open_friend_request(&self, a: &str, b: &str) -> Result<Option<FriendRequest>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.find_open_friend_request(a, b).await
    }

    async fn delete_friend_request(&self, id: &str, expected: FriendRequestStatus) -> Result<FriendRequest, ApiError> {
        tokio::task::yield_now().await;
        self.inner.delete_friend_request(id, expected).await
    }

    async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.list_friend_ids(user_id).await
    }

    async fn create_notification(&self, notification: Notification) -> Result<Notification, ApiError> {
        tokio::task::yield_now().await;
        self.inner.create_notification(notification).await
    }

    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.list_notifications(recipient_id, limit).await
    }

    async fn unread_notification_count(&self, recipient_id: &str) -> Result<usize, ApiError> {
        tokio::task::yield_now().await;
        self.inner.unread_notification_count(recipient_id).await
    }

    async fn mark_notifications_read(&self, recipient_id: &str, ids: Option<&[String]>) -> Result<usize, ApiError> {
        tokio::task::yield_now().await;
        self.inner.mark_notifications_read(recipient_id, ids).await
    }

    async fn record_admin_action(&self, action: AdminAction) -> Result<AdminAction, ApiError> {
        tokio::task::yield_now().await;
        self.inner.record_admin_action(action).await
    }

    async fn list_admin_actions(
        &self,
        kind: Option<AdminActionKind>,
        target_user: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AdminAction>, ApiError> {
        tokio::task::yield_now().await;
        self.inner.list_admin_actions(kind, target_user, limit).await
    }
}
