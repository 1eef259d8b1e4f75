use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;

use super::feed::{repaint, set_membership};
use super::optimistic::{OptimisticList, Order, Reconciled};
use super::ApplyEvent;
use crate::hub::events::CommentLiked;
use crate::hub::Event;
use crate::models::comment::Comment;
use crate::models::user::UserSummary;

/// Comments under one post, oldest first, with per-parent reply drafts.
#[derive(Debug, Clone)]
pub struct CommentThread {
    post_id: String,
    viewer: UserSummary,
    comments: OptimisticList<Comment>,
    /// Input text keyed by parent comment. `None` is the top-level box.
    drafts: HashMap<Option<String>, String>,
}

impl CommentThread {
    pub fn new(post_id: impl Into<String>, viewer: UserSummary, comments: Vec<Comment>) -> Self {
        let comments = comments.into_iter().filter(|c| !c.is_deleted);
        Self {
            post_id: post_id.into(),
            viewer,
            comments: OptimisticList::with_items(Order::OldestFirst, comments),
            drafts: HashMap::new(),
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn draft(&self, parent_id: Option<&str>) -> &str {
        self.drafts
            .get(&parent_id.map(str::to_string))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_draft(&mut self, parent_id: Option<&str>, text: impl Into<String>) {
        self.drafts.insert(parent_id.map(str::to_string), text.into());
    }

    /// Show the draft for `parent_id` as a pending comment and clear it.
    pub fn submit(&mut self, parent_id: Option<&str>) -> Option<String> {
        let key = parent_id.map(str::to_string);
        let content = self.drafts.get(&key)?.trim().to_string();
        if content.is_empty() {
            return None;
        }
        self.drafts.remove(&key);

        let candidate = Comment {
            id: String::new(),
            post_id: self.post_id.clone(),
            author: self.viewer.clone(),
            content,
            parent_id: key,
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: Utc::now(),
        };
        Some(self.comments.submit(candidate))
    }

    pub fn succeeded(&mut self, temp_id: &str, comment: Comment) -> Reconciled {
        self.comments.confirm(temp_id, comment)
    }

    /// Remove the pending comment and restore its text to the right input.
    pub fn failed(&mut self, temp_id: &str) -> bool {
        match self.comments.rollback(temp_id) {
            Some(draft) => {
                self.drafts.insert(draft.parent_id, draft.content);
                true
            }
            None => false,
        }
    }

    pub fn expire_pending(&mut self, max_age: Duration) -> usize {
        let expired = self.comments.rollback_expired(max_age);
        for draft in &expired {
            self.drafts
                .entry(draft.parent_id.clone())
                .or_insert_with(|| draft.content.clone());
        }
        expired.len()
    }

    /// Flip the viewer's like locally. Returns the new liked state.
    pub fn toggle_like(&mut self, comment_id: &str) -> Option<bool> {
        let viewer = self.viewer.id.clone();
        let mut liked = None;
        self.comments.update(comment_id, |comment| {
            let like = !comment.is_liked_by(&viewer);
            liked = Some(set_membership(&mut comment.likes, &viewer, like));
        });
        liked
    }

    pub fn like_failed(&mut self, comment_id: &str) -> Option<bool> {
        self.toggle_like(comment_id)
    }

    pub fn delete(&mut self, comment_id: &str) -> Option<Comment> {
        self.comments.remove(comment_id)
    }

    pub fn delete_failed(&mut self, comment: Comment) {
        self.comments.restore(comment);
    }

    pub fn get(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.get(comment_id)
    }

    /// Whether the viewer likes the comment, derived from its likes list.
    pub fn is_liked(&self, comment_id: &str) -> bool {
        self.get(comment_id)
            .is_some_and(|c| c.is_liked_by(&self.viewer.id))
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Comment> {
        self.comments.items().filter(|c| c.parent_id.is_none())
    }

    pub fn replies_to<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Comment> + 'a {
        self.comments
            .items()
            .filter(move |c| c.parent_id.as_deref() == Some(parent_id))
    }

    pub fn list(&self) -> &OptimisticList<Comment> {
        &self.comments
    }

    fn apply_like(&mut self, liked: &CommentLiked) -> bool {
        // The likes list is authoritative; the actor's is_liked is not ours.
        self.comments.update(&liked.comment_id, |comment| {
            comment.likes = liked.likes.clone();
        })
    }
}

impl ApplyEvent for CommentThread {
    fn apply_event(&mut self, event: &Event) -> bool {
        match event {
            Event::CommentAdded(added) if added.post_id == self.post_id => matches!(
                self.comments.apply(added.comment.clone()),
                Reconciled::Confirmed | Reconciled::Inserted
            ),
            Event::CommentUpdated(updated) if updated.post_id == self.post_id => {
                self.comments.replace(updated.comment.clone())
            }
            Event::CommentDeleted(deleted) if deleted.post_id == self.post_id => {
                self.comments.remove(&deleted.comment_id).is_some()
            }
            Event::CommentLiked(liked) if liked.post_id == self.post_id => self.apply_like(liked),
            Event::UserUpdated(update) => {
                let mut changed = false;
                self.comments.update_all(|comment| {
                    if comment.author.id == update.user_id {
                        repaint(&mut comment.author, update);
                        changed = true;
                    }
                });
                if self.viewer.id == update.user_id {
                    repaint(&mut self.viewer, update);
                }
                changed
            }
            _ => false,
        }
    }
}
