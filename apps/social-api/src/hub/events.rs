//! Topic catalog, recipient scopes, and wire-format messages.
//!
//! Frames are JSON text in both directions: `{"event": <name>, "data": <body>}`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::comment::Comment;
use crate::models::notification::Notification;
use crate::models::post::{Post, Visibility};
use crate::models::user::Role;

// ---------------------------------------------------------------------------
// Rooms and scopes
// ---------------------------------------------------------------------------

/// A named multicast group. Exists only while it has members.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    User(String),
    Feed,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{id}"),
            Room::Feed => f.write_str("feed"),
        }
    }
}

/// Which publish path a topic is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    User,
    Feed,
    All,
}

// ---------------------------------------------------------------------------
// Server → Client events
// ---------------------------------------------------------------------------

/// One variant per topic. The variant name in kebab-case is the topic name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Event {
    PostCreated(Post),
    PostUpdated(PostUpdated),
    PostDeleted(PostRef),
    PostHidden(VisibilityChange),
    PostShown(VisibilityChange),
    PostLiked(PostLiked),
    CommentAdded(CommentAdded),
    CommentLiked(CommentLiked),
    CommentUpdated(CommentUpdated),
    CommentDeleted(CommentRef),
    UserUpdated(UserUpdated),
    UserFollowed(FollowTarget),
    UserUnfollowed(FollowTarget),
    FollowUpdated(FollowUpdated),
    FriendStatusUpdate(FriendStatusUpdate),
    NewNotification(Notification),
    PresenceChanged(PresenceChanged),
}

impl Event {
    pub fn topic(&self) -> &'static str {
        match self {
            Event::PostCreated(_) => "post-created",
            Event::PostUpdated(_) => "post-updated",
            Event::PostDeleted(_) => "post-deleted",
            Event::PostHidden(_) => "post-hidden",
            Event::PostShown(_) => "post-shown",
            Event::PostLiked(_) => "post-liked",
            Event::CommentAdded(_) => "comment-added",
            Event::CommentLiked(_) => "comment-liked",
            Event::CommentUpdated(_) => "comment-updated",
            Event::CommentDeleted(_) => "comment-deleted",
            Event::UserUpdated(_) => "user-updated",
            Event::UserFollowed(_) => "user-followed",
            Event::UserUnfollowed(_) => "user-unfollowed",
            Event::FollowUpdated(_) => "follow-updated",
            Event::FriendStatusUpdate(_) => "friend-status-update",
            Event::NewNotification(_) => "new-notification",
            Event::PresenceChanged(_) => "presence-changed",
        }
    }

    /// The catalog scope of this topic.
    ///
    /// Visibility transitions go to everyone: non-feed views that render the
    /// post must also add or drop it.
    pub fn scope(&self) -> Scope {
        match self {
            Event::PostCreated(_)
            | Event::PostUpdated(_)
            | Event::PostDeleted(_)
            | Event::PostLiked(_)
            | Event::CommentAdded(_)
            | Event::CommentLiked(_)
            | Event::CommentUpdated(_)
            | Event::CommentDeleted(_)
            | Event::FollowUpdated(_) => Scope::Feed,
            Event::PostHidden(_)
            | Event::PostShown(_)
            | Event::UserUpdated(_)
            | Event::PresenceChanged(_) => Scope::All,
            Event::UserFollowed(_)
            | Event::UserUnfollowed(_)
            | Event::FriendStatusUpdate(_)
            | Event::NewNotification(_) => Scope::User,
        }
    }
}

/// An event bound to the publish path it was handed to.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub scope: Scope,
    pub event: Event,
}

impl Envelope {
    pub fn new(scope: Scope, event: Event) -> Self {
        Self { scope, event }
    }

    /// Whether the event travels the path its topic is catalogued for.
    pub fn is_well_scoped(&self) -> bool {
        self.scope == self.event.scope()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostUpdated {
    pub post_id: String,
    pub post: Post,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRef {
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub post_id: String,
    pub author_id: String,
    pub old_visibility: Visibility,
    pub visibility: Visibility,
    /// Present when the post became public so viewers can insert it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostLiked {
    pub post_id: String,
    pub like_count: usize,
    /// Whether the acting user now likes the post.
    pub is_liked: bool,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAdded {
    pub post_id: String,
    pub comment: Comment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentLiked {
    pub post_id: String,
    pub comment_id: String,
    pub like_count: usize,
    pub likes: Vec<String>,
    pub is_liked: bool,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentUpdated {
    pub post_id: String,
    pub comment_id: String,
    pub comment: Comment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRef {
    pub post_id: String,
    pub comment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub user_id: String,
    pub role: Role,
    pub badges: Vec<String>,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowTarget {
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpdated {
    pub follower_id: String,
    pub following_id: String,
    pub action: FollowAction,
}

/// Friend-graph edge as seen by the recipient of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FriendStatus {
    None,
    PendingSent,
    PendingReceived,
    Friends,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendStatusUpdate {
    /// The other party of the edge.
    pub user_id: String,
    pub status: FriendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceChanged {
    pub user_id: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Client → Server control messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// The client asserts which user it belongs to.
    JoinUserRoom(String),
    JoinFeed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_matches_wire_tag() {
        let event = Event::PostDeleted(PostRef {
            post_id: "post_1".to_string(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.topic());
        assert_eq!(value["data"]["post_id"], "post_1");
    }

    #[test]
    fn friend_status_update_uses_kebab_case_topic() {
        let event = Event::FriendStatusUpdate(FriendStatusUpdate {
            user_id: "usr_b".to_string(),
            status: FriendStatus::PendingReceived,
            request_id: None,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "friend-status-update");
        assert_eq!(value["data"]["status"], "pending_received");
        assert!(value["data"].get("request_id").is_none());
    }

    #[test]
    fn control_messages_parse() {
        let join: ClientMessage =
            serde_json::from_value(json!({ "event": "join-user-room", "data": "usr_1" })).unwrap();
        assert_eq!(join, ClientMessage::JoinUserRoom("usr_1".to_string()));

        let feed: ClientMessage = serde_json::from_value(json!({ "event": "join-feed" })).unwrap();
        assert_eq!(feed, ClientMessage::JoinFeed);

        assert!(serde_json::from_value::<ClientMessage>(json!({ "event": "leave-everything" })).is_err());
    }

    #[test]
    fn room_names() {
        assert_eq!(Room::User("usr_1".to_string()).to_string(), "user:usr_1");
        assert_eq!(Room::Feed.to_string(), "feed");
    }

    #[test]
    fn visibility_transitions_are_broadcast_to_all() {
        let change = VisibilityChange {
            post_id: "p".to_string(),
            author_id: "a".to_string(),
            old_visibility: Visibility::Public,
            visibility: Visibility::Private,
            post: None,
        };
        assert_eq!(Event::PostHidden(change.clone()).scope(), Scope::All);
        assert_eq!(Event::PostShown(change).scope(), Scope::All);
    }

    #[test]
    fn envelope_scope_check() {
        let event = Event::UserFollowed(FollowTarget {
            user_id: "usr_b".to_string(),
        });
        assert!(Envelope::new(Scope::User, event.clone()).is_well_scoped());
        assert!(!Envelope::new(Scope::Feed, event).is_well_scoped());
    }
}
