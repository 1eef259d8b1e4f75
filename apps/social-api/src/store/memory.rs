use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{PostEdit, Revision, Store};
use crate::error::ApiError;
use crate::models::admin_action::{AdminAction, AdminActionKind};
use crate::models::comment::Comment;
use crate::models::follow::Follow;
use crate::models::friend_request::{FriendRequest, FriendRequestStatus};
use crate::models::notification::Notification;
use crate::models::post::Post;
use crate::models::user::{User, UserCosmetics};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    posts: HashMap<String, Post>,
    comments: HashMap<String, Comment>,
    follows: Vec<Follow>,
    friend_requests: HashMap<String, FriendRequest>,
    notifications: Vec<Notification>,
    admin_actions: Vec<AdminAction>,
}

impl Tables {
    fn live_post(&mut self, id: &str) -> Result<&mut Post, ApiError> {
        self.posts
            .get_mut(id)
            .filter(|p| !p.is_deleted)
            .ok_or_else(|| ApiError::not_found("Post not found"))
    }

    fn live_comment(&mut self, id: &str) -> Result<&mut Comment, ApiError> {
        self.comments
            .get_mut(id)
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| ApiError::not_found("Comment not found"))
    }

    fn user(&mut self, id: &str) -> Result<&mut User, ApiError> {
        self.users
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}

/// Flip `user_id` in a likes list. Returns the new liked state.
fn toggle(likes: &mut Vec<String>, user_id: &str) -> bool {
    if likes.iter().any(|id| id == user_id) {
        likes.retain(|id| id != user_id);
        false
    } else {
        likes.push(user_id.to_string());
        true
    }
}

/// Single-lock in-memory document store.
///
/// Each operation reads and writes under one lock acquisition, so
/// concurrent changes to the same document compose instead of clobbering.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.username.eq_ignore_ascii_case(&user.username)) {
            return Err(ApiError::conflict("Username already taken"));
        }
        if t.users.contains_key(&user.id) {
            return Err(ApiError::conflict("User already exists"));
        }
        t.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError> {
        Ok(self.tables.lock().users.get(id).cloned())
    }

    async fn update_cosmetics(&self, id: &str, cosmetics: UserCosmetics) -> Result<Revision<User>, ApiError> {
        let mut t = self.tables.lock();
        let user = t.user(id)?;
        let before = user.clone();
        if let Some(role) = cosmetics.role {
            user.role = role;
        }
        if let Some(badges) = cosmetics.badges {
            user.badges = badges;
        }
        if let Some(titles) = cosmetics.titles {
            user.titles = titles;
        }
        let after = user.clone();

        // Embedded author summaries are populated views of the user record.
        let summary = after.summary();
        for post in t.posts.values_mut().filter(|p| p.author.id == id) {
            post.author = summary.clone();
        }
        for comment in t.comments.values_mut().filter(|c| c.author.id == id) {
            comment.author = summary.clone();
        }
        Ok(Revision { before, after })
    }

    async fn set_banned(&self, id: &str, banned: bool) -> Result<User, ApiError> {
        let mut t = self.tables.lock();
        let user = t.user(id)?;
        user.is_banned = banned;
        Ok(user.clone())
    }

    async fn set_presence(&self, id: &str, online: bool, at: DateTime<Utc>) -> Result<(), ApiError> {
        let mut t = self.tables.lock();
        let user = t.user(id)?;
        user.is_online = online;
        user.last_seen = Some(at);
        Ok(())
    }

    async fn create_post(&self, post: Post) -> Result<Post, ApiError> {
        let mut t = self.tables.lock();
        if t.posts.contains_key(&post.id) {
            return Err(ApiError::conflict("Post already exists"));
        }
        t.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, ApiError> {
        Ok(self.tables.lock().posts.get(id).cloned())
    }

    async fn edit_post(&self, id: &str, edit: PostEdit) -> Result<Revision<Post>, ApiError> {
        let mut t = self.tables.lock();
        let post = t.live_post(id)?;
        let before = post.clone();
        if let Some(content) = edit.content {
            if content != post.content {
                post.content = content;
                post.is_edited = true;
            }
        }
        if let Some(visibility) = edit.visibility {
            post.visibility = visibility;
        }
        post.updated_at = Utc::now();
        Ok(Revision {
            before,
            after: post.clone(),
        })
    }

    async fn toggle_post_like(&self, id: &str, user_id: &str) -> Result<(Post, bool), ApiError> {
        let mut t = self.tables.lock();
        let post = t.live_post(id)?;
        let liked = toggle(&mut post.likes, user_id);
        Ok((post.clone(), liked))
    }

    async fn soft_delete_post(&self, id: &str) -> Result<Post, ApiError> {
        let mut t = self.tables.lock();
        let post = t.live_post(id)?;
        post.is_deleted = true;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn create_comment(&self, comment: Comment) -> Result<Comment, ApiError> {
        let mut t = self.tables.lock();
        if !t.posts.get(&comment.post_id).is_some_and(|p| !p.is_deleted) {
            return Err(ApiError::not_found("Post not found"));
        }
        if let Some(parent_id) = &comment.parent_id {
            match t.comments.get(parent_id) {
                Some(parent) if parent.post_id == comment.post_id && !parent.is_deleted => {}
                _ => return Err(ApiError::not_found("Parent comment not found")),
            }
        }
        t.comments.insert(comment.id.clone(), comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, ApiError> {
        Ok(self.tables.lock().comments.get(id).cloned())
    }

    async fn edit_comment(&self, id: &str, content: String) -> Result<Revision<Comment>, ApiError> {
        let mut t = self.tables.lock();
        let comment = t.live_comment(id)?;
        let before = comment.clone();
        if content != comment.content {
            comment.content = content;
            comment.is_edited = true;
        }
        Ok(Revision {
            before,
            after: comment.clone(),
        })
    }

    async fn toggle_comment_like(&self, id: &str, user_id: &str) -> Result<(Comment, bool), ApiError> {
        let mut t = self.tables.lock();
        let comment = t.live_comment(id)?;
        let liked = toggle(&mut comment.likes, user_id);
        Ok((comment.clone(), liked))
    }

    async fn soft_delete_comment(&self, id: &str) -> Result<Comment, ApiError> {
        let mut t = self.tables.lock();
        let comment = t.live_comment(id)?;
        comment.is_deleted = true;
        Ok(comment.clone())
    }

    async fn create_follow(&self, follow: Follow) -> Result<Follow, ApiError> {
        let mut t = self.tables.lock();
        let exists = t
            .follows
            .iter()
            .any(|f| f.follower_id == follow.follower_id && f.following_id == follow.following_id);
        if exists {
            return Err(ApiError::conflict("Already following this user"));
        }
        t.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<bool, ApiError> {
        let mut t = self.tables.lock();
        let before = t.follows.len();
        t.follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(t.follows.len() != before)
    }

    async fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool, ApiError> {
        let t = self.tables.lock();
        Ok(t.follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn create_friend_request(&self, request: FriendRequest) -> Result<FriendRequest, ApiError> {
        let mut t = self.tables.lock();
        let open = t.friend_requests.values().any(|r| {
            r.involves(&request.sender_id, &request.receiver_id)
                && r.status != FriendRequestStatus::Declined
        });
        if open {
            return Err(ApiError::conflict("A friend request already exists between these users"));
        }
        t.friend_requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    async fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequest>, ApiError> {
        Ok(self.tables.lock().friend_requests.get(id).cloned())
    }

    async fn answer_friend_request(&self, id: &str, status: FriendRequestStatus) -> Result<FriendRequest, ApiError> {
        let mut t = self.tables.lock();
        let request = t
            .friend_requests
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found("Friend request not found"))?;
        if request.status != FriendRequestStatus::Pending {
            return Err(ApiError::bad_request("Friend request already processed"));
        }
        request.status = status;
        Ok(request.clone())
    }

    async fn find_open_friend_request(&self, a: &str, b: &str) -> Result<Option<FriendRequest>, ApiError> {
        let t = self.tables.lock();
        Ok(t
            .friend_requests
            .values()
            .find(|r| r.involves(a, b) && r.status != FriendRequestStatus::Declined)
            .cloned())
    }

    async fn delete_friend_request(&self, id: &str, expected: FriendRequestStatus) -> Result<FriendRequest, ApiError> {
        let mut t = self.tables.lock();
        let status = t
            .friend_requests
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| ApiError::not_found("Friend request not found"))?;
        if status != expected {
            return Err(match expected {
                FriendRequestStatus::Accepted => ApiError::bad_request("Not friends"),
                _ => ApiError::bad_request("Friend request is no longer pending"),
            });
        }
        t.friend_requests
            .remove(id)
            .ok_or_else(|| ApiError::not_found("Friend request not found"))
    }

    async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, ApiError> {
        let t = self.tables.lock();
        Ok(t.friend_requests
            .values()
            .filter(|r| r.status == FriendRequestStatus::Accepted)
            .filter_map(|r| {
                if r.sender_id == user_id {
                    Some(r.receiver_id.clone())
                } else if r.receiver_id == user_id {
                    Some(r.sender_id.clone())
                } else {
                    None
                }
            })
            .collect())
    }

    async fn create_notification(&self, notification: Notification) -> Result<Notification, ApiError> {
        self.tables.lock().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>, ApiError> {
        let t = self.tables.lock();
        Ok(t.notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn unread_notification_count(&self, recipient_id: &str) -> Result<usize, ApiError> {
        let t = self.tables.lock();
        Ok(t.notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count())
    }

    async fn mark_notifications_read(&self, recipient_id: &str, ids: Option<&[String]>) -> Result<usize, ApiError> {
        let mut t = self.tables.lock();
        let mut changed = 0;
        for n in t.notifications.iter_mut() {
            if n.recipient_id != recipient_id || n.is_read {
                continue;
            }
            if ids.is_some_and(|ids| !ids.contains(&n.id)) {
                continue;
            }
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn record_admin_action(&self, action: AdminAction) -> Result<AdminAction, ApiError> {
        self.tables.lock().admin_actions.push(action.clone());
        Ok(action)
    }

    async fn list_admin_actions(
        &self,
        kind: Option<AdminActionKind>,
        target_user: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AdminAction>, ApiError> {
        let t = self.tables.lock();
        Ok(t.admin_actions
            .iter()
            .rev()
            .filter(|a| kind.map_or(true, |k| a.action == k))
            .filter(|a| target_user.map_or(true, |u| a.target_user == u))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::post::Visibility;

    fn post_by(author: &User, id: &str) -> Post {
        let now = Utc::now();
        Post {
            id: id.to_string(),
            author: author.summary(),
            content: "hello".to_string(),
            visibility: Visibility::Public,
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn comment_on(post_id: &str, id: &str, author: &User) -> Comment {
        Comment {
            id: id.to_string(),
            post_id: post_id.to_string(),
            author: author.summary(),
            content: "nice".to_string(),
            parent_id: None,
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    fn request(id: &str, sender: &str, receiver: &str) -> FriendRequest {
        FriendRequest {
            id: id.to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            status: FriendRequestStatus::Pending,
            message: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn usernames_are_unique_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user(User::new("u1", "Alice", "Alice")).await.unwrap();
        let err = store.create_user(User::new("u2", "alice", "Other")).await.unwrap_err();
        assert_eq!(err.code, "CONFLICT");
    }

    #[tokio::test]
    async fn cosmetics_repopulate_embedded_authors() {
        let store = MemoryStore::new();
        let user = store.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        store.create_post(post_by(&user, "p1")).await.unwrap();

        let revision = store
            .update_cosmetics(
                "u1",
                UserCosmetics {
                    badges: Some(vec!["verified".to_string()]),
                    ..UserCosmetics::default()
                },
            )
            .await
            .unwrap();
        assert!(revision.before.badges.is_empty());
        assert_eq!(revision.after.badges, vec!["verified".to_string()]);

        let post = store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(post.author.badges, vec!["verified".to_string()]);
    }

    #[tokio::test]
    async fn ban_leaves_presence_untouched() {
        let store = MemoryStore::new();
        store.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        store.set_presence("u1", true, Utc::now()).await.unwrap();

        let user = store.set_banned("u1", true).await.unwrap();
        assert!(user.is_banned);
        assert!(user.is_online);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_likes_are_all_kept() {
        let store = Arc::new(MemoryStore::new());
        let author = User::new("u0", "author", "Author");
        store.create_post(post_by(&author, "p1")).await.unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.toggle_post_like("p1", &format!("u{i}")).await })
            })
            .collect();
        for task in tasks {
            let (_, liked) = task.await.unwrap().unwrap();
            assert!(liked);
        }

        assert_eq!(store.get_post("p1").await.unwrap().unwrap().like_count(), 32);
    }

    #[tokio::test]
    async fn deleted_documents_refuse_changes() {
        let store = MemoryStore::new();
        let author = User::new("u0", "author", "Author");
        store.create_post(post_by(&author, "p1")).await.unwrap();
        store.create_comment(comment_on("p1", "c1", &author)).await.unwrap();

        store.soft_delete_comment("c1").await.unwrap();
        assert_eq!(store.toggle_comment_like("c1", "u1").await.unwrap_err().code, "NOT_FOUND");
        assert!(store.edit_comment("c1", "again".to_string()).await.is_err());
        assert!(store.soft_delete_comment("c1").await.is_err());
        assert!(store.get_comment("c1").await.unwrap().unwrap().is_deleted);

        store.soft_delete_post("p1").await.unwrap();
        assert!(store.toggle_post_like("p1", "u1").await.is_err());
        assert!(store.edit_post("p1", PostEdit::default()).await.is_err());
        assert!(store.create_comment(comment_on("p1", "c2", &author)).await.is_err());
    }

    #[tokio::test]
    async fn edit_reports_before_and_after() {
        let store = MemoryStore::new();
        let author = User::new("u0", "author", "Author");
        store.create_post(post_by(&author, "p1")).await.unwrap();

        let same = store
            .edit_post(
                "p1",
                PostEdit {
                    content: Some("hello".to_string()),
                    visibility: Some(Visibility::Private),
                },
            )
            .await
            .unwrap();
        assert_eq!(same.before.visibility, Visibility::Public);
        assert_eq!(same.after.visibility, Visibility::Private);
        assert!(!same.after.is_edited);

        let changed = store
            .edit_post(
                "p1",
                PostEdit {
                    content: Some("bye".to_string()),
                    visibility: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(changed.before.content, "hello");
        assert!(changed.after.is_edited);
        assert_eq!(changed.after.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn follow_edge_is_unique() {
        let store = MemoryStore::new();
        let follow = Follow {
            follower_id: "a".to_string(),
            following_id: "b".to_string(),
            created_at: Utc::now(),
        };
        store.create_follow(follow.clone()).await.unwrap();
        assert!(store.create_follow(follow).await.is_err());
        assert!(store.is_following("a", "b").await.unwrap());
        assert!(!store.is_following("b", "a").await.unwrap());
        assert!(store.delete_follow("a", "b").await.unwrap());
        assert!(!store.delete_follow("a", "b").await.unwrap());
    }

    #[tokio::test]
    async fn declined_request_does_not_block_a_new_one() {
        let store = MemoryStore::new();
        let request = FriendRequest {
            id: "r1".to_string(),
            sender_id: "a".to_string(),
            receiver_id: "b".to_string(),
            status: FriendRequestStatus::Pending,
            message: String::new(),
            created_at: Utc::now(),
        };
        store.create_friend_request(request.clone()).await.unwrap();

        let mut reverse = request.clone();
        reverse.id = "r2".to_string();
        std::mem::swap(&mut reverse.sender_id, &mut reverse.receiver_id);
        assert!(store.create_friend_request(reverse.clone()).await.is_err());

        store
            .answer_friend_request(&request.id, FriendRequestStatus::Declined)
            .await
            .unwrap();
        store.create_friend_request(reverse).await.unwrap();
        assert_eq!(
            store.find_open_friend_request("a", "b").await.unwrap().unwrap().id,
            "r2"
        );
    }

    #[tokio::test]
    async fn answered_requests_cannot_be_answered_or_cancelled() {
        let store = MemoryStore::new();
        store.create_friend_request(request("r1", "a", "b")).await.unwrap();
        store
            .answer_friend_request("r1", FriendRequestStatus::Accepted)
            .await
            .unwrap();

        let err = store
            .answer_friend_request("r1", FriendRequestStatus::Declined)
            .await
            .unwrap_err();
        assert_eq!(err.code, "BAD_REQUEST");
        assert!(store
            .delete_friend_request("r1", FriendRequestStatus::Pending)
            .await
            .is_err());

        assert_eq!(store.list_friend_ids("a").await.unwrap(), vec!["b".to_string()]);
        assert_eq!(store.list_friend_ids("b").await.unwrap(), vec!["a".to_string()]);

        store
            .delete_friend_request("r1", FriendRequestStatus::Accepted)
            .await
            .unwrap();
        assert!(store.list_friend_ids("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_requests_are_not_friends() {
        let store = MemoryStore::new();
        store.create_friend_request(request("r1", "a", "b")).await.unwrap();
        assert!(store.list_friend_ids("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_actions_filter_newest_first() {
        let store = MemoryStore::new();
        let actions = [
            AdminAction::new("adm", AdminActionKind::BanUser, "u1"),
            AdminAction::new("adm", AdminActionKind::DeletePost, "u2").on_post("p1"),
            AdminAction::new("adm", AdminActionKind::UnbanUser, "u1"),
        ];
        for action in actions.iter().cloned() {
            store.record_admin_action(action).await.unwrap();
        }

        let all = store.list_admin_actions(None, None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, AdminActionKind::UnbanUser);

        let for_u1 = store.list_admin_actions(None, Some("u1"), 10).await.unwrap();
        assert_eq!(for_u1.len(), 2);

        let bans = store
            .list_admin_actions(Some(AdminActionKind::BanUser), None, 10)
            .await
            .unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].target_user, "u1");

        assert_eq!(store.list_admin_actions(None, None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notifications_list_newest_first_per_recipient() {
        let store = MemoryStore::new();
        let sender = User::new("s", "sender", "Sender").summary();
        for (i, recipient) in ["r", "x", "r"].iter().enumerate() {
            store
                .create_notification(Notification::new(
                    format!("n{i}"),
                    recipient,
                    sender.clone(),
                    crate::models::notification::NotificationKind::NewFollower,
                    "followed you".to_string(),
                ))
                .await
                .unwrap();
        }
        let listed = store.list_notifications("r", 10).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n0"]);
        assert_eq!(store.unread_notification_count("r").await.unwrap(), 2);

        let only = vec!["n0".to_string()];
        assert_eq!(store.mark_notifications_read("r", Some(only.as_slice())).await.unwrap(), 1);
        assert_eq!(store.unread_notification_count("r").await.unwrap(), 1);
        assert_eq!(store.mark_notifications_read("r", None).await.unwrap(), 1);
        assert_eq!(store.unread_notification_count("x").await.unwrap(), 1);
    }
}
