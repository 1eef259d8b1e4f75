use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;

use super::optimistic::{OptimisticList, Order, Reconciled};
use super::ApplyEvent;
use crate::hub::events::{FollowAction, PostLiked, UserUpdated, VisibilityChange};
use crate::hub::Event;
use crate::models::post::{Post, Visibility};
use crate::models::user::UserSummary;

/// The home feed of one signed-in viewer, newest first.
#[derive(Debug, Clone)]
pub struct FeedState {
    viewer: UserSummary,
    following: HashSet<String>,
    posts: OptimisticList<Post>,
    composer: String,
}

impl FeedState {
    pub fn new(viewer: UserSummary, following: impl IntoIterator<Item = String>) -> Self {
        Self {
            viewer,
            following: following.into_iter().collect(),
            posts: OptimisticList::new(Order::NewestFirst),
            composer: String::new(),
        }
    }

    /// Replace the list with a freshly fetched page, newest first.
    pub fn load(&mut self, posts: Vec<Post>) {
        let visible: Vec<Post> = posts.into_iter().filter(|p| self.can_see(p)).collect();
        self.posts = OptimisticList::with_items(Order::NewestFirst, visible);
    }

    fn visible(&self, author_id: &str, visibility: Visibility) -> bool {
        match visibility {
            Visibility::Public => true,
            _ if author_id == self.viewer.id => true,
            Visibility::Followers => self.following.contains(author_id),
            Visibility::Private => false,
        }
    }

    pub fn can_see(&self, post: &Post) -> bool {
        !post.is_deleted && self.visible(&post.author.id, post.visibility)
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.following.contains(user_id)
    }

    pub fn composer(&self) -> &str {
        &self.composer
    }

    pub fn set_composer(&mut self, text: impl Into<String>) {
        self.composer = text.into();
    }

    /// Show the composer's text as a pending post and clear the composer.
    pub fn submit_post(&mut self, visibility: Visibility) -> Option<String> {
        let content = self.composer.trim().to_string();
        if content.is_empty() {
            return None;
        }
        let now = Utc::now();
        let candidate = Post {
            id: String::new(),
            author: self.viewer.clone(),
            content,
            visibility,
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.composer.clear();
        Some(self.posts.submit(candidate))
    }

    pub fn post_succeeded(&mut self, temp_id: &str, post: Post) -> Reconciled {
        self.posts.confirm(temp_id, post)
    }

    /// Remove the pending post and put its text back in the composer.
    pub fn post_failed(&mut self, temp_id: &str) -> bool {
        match self.posts.rollback(temp_id) {
            Some(draft) => {
                self.composer = draft.content;
                true
            }
            None => false,
        }
    }

    /// Roll back posts whose confirmation never arrived. The oldest draft
    /// returns to an empty composer.
    pub fn expire_pending(&mut self, max_age: Duration) -> usize {
        let expired = self.posts.rollback_expired(max_age);
        if self.composer.is_empty() {
            if let Some(first) = expired.first() {
                self.composer = first.content.clone();
            }
        }
        expired.len()
    }

    /// Flip the viewer's like locally. Returns the new liked state.
    pub fn toggle_like(&mut self, post_id: &str) -> Option<bool> {
        let viewer = self.viewer.id.clone();
        let mut liked = None;
        self.posts.update(post_id, |post| {
            let like = !post.is_liked_by(&viewer);
            liked = Some(set_membership(&mut post.likes, &viewer, like));
        });
        liked
    }

    /// Undo [`FeedState::toggle_like`] after the request failed.
    pub fn like_failed(&mut self, post_id: &str) -> Option<bool> {
        self.toggle_like(post_id)
    }

    /// Delete locally. Keep the returned post to restore on failure.
    pub fn delete_post(&mut self, post_id: &str) -> Option<Post> {
        self.posts.remove(post_id)
    }

    pub fn delete_failed(&mut self, post: Post) {
        self.posts.restore(post);
    }

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.posts.get(post_id)
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.items()
    }

    pub fn list(&self) -> &OptimisticList<Post> {
        &self.posts
    }

    fn apply_visibility_hidden(&mut self, change: &VisibilityChange) -> bool {
        if self.visible(&change.author_id, change.visibility) {
            return false;
        }
        self.posts.discard(&change.post_id).is_some()
    }

    fn apply_visibility_shown(&mut self, change: &VisibilityChange) -> bool {
        let Some(post) = change.post.clone() else {
            return false;
        };
        if !self.can_see(&post) {
            return false;
        }
        if self.posts.replace(post.clone()) {
            return true;
        }
        matches!(self.posts.apply(post), Reconciled::Inserted | Reconciled::Confirmed)
    }

    fn apply_like(&mut self, liked: &PostLiked) -> bool {
        self.posts.update(&liked.post_id, |post| {
            set_membership(&mut post.likes, &liked.user_id, liked.is_liked);
        })
    }

    fn follow(&mut self, user_id: &str) -> bool {
        self.following.insert(user_id.to_string())
    }

    fn unfollow(&mut self, user_id: &str) -> bool {
        if !self.following.remove(user_id) {
            return false;
        }
        self.posts
            .discard_where(|p| p.author.id == user_id && p.visibility == Visibility::Followers);
        true
    }

    fn repaint_author(&mut self, update: &UserUpdated) -> bool {
        let mut changed = false;
        self.posts.update_all(|post| {
            if post.author.id == update.user_id {
                repaint(&mut post.author, update);
                changed = true;
            }
        });
        if self.viewer.id == update.user_id {
            repaint(&mut self.viewer, update);
        }
        changed
    }
}

impl ApplyEvent for FeedState {
    fn apply_event(&mut self, event: &Event) -> bool {
        match event {
            Event::PostCreated(post) => {
                self.can_see(post)
                    && matches!(
                        self.posts.apply(post.clone()),
                        Reconciled::Confirmed | Reconciled::Inserted
                    )
            }
            Event::PostUpdated(update) => {
                if self.can_see(&update.post) {
                    self.posts.replace(update.post.clone())
                } else {
                    self.posts.discard(&update.post_id).is_some()
                }
            }
            Event::PostDeleted(deleted) => self.posts.remove(&deleted.post_id).is_some(),
            Event::PostHidden(change) => self.apply_visibility_hidden(change),
            Event::PostShown(change) => self.apply_visibility_shown(change),
            Event::PostLiked(liked) => self.apply_like(liked),
            Event::UserFollowed(target) => self.follow(&target.user_id),
            Event::UserUnfollowed(target) => self.unfollow(&target.user_id),
            Event::FollowUpdated(update) if update.follower_id == self.viewer.id => {
                match update.action {
                    FollowAction::Follow => self.follow(&update.following_id),
                    FollowAction::Unfollow => self.unfollow(&update.following_id),
                }
            }
            Event::UserUpdated(update) => self.repaint_author(update),
            _ => false,
        }
    }
}

/// Add or remove `user_id`. Returns the resulting membership.
pub(crate) fn set_membership(likes: &mut Vec<String>, user_id: &str, member: bool) -> bool {
    let present = likes.iter().any(|id| id == user_id);
    if member && !present {
        likes.push(user_id.to_string());
    } else if !member && present {
        likes.retain(|id| id != user_id);
    }
    member
}

pub(crate) fn repaint(author: &mut UserSummary, update: &UserUpdated) {
    author.role = update.role;
    author.badges = update.badges.clone();
    author.titles = update.titles.clone();
}
