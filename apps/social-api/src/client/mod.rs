//! Client-side view state that consumes hub frames.
//!
//! Each view owns the entities it renders, applies its own mutations
//! optimistically, and reconciles against HTTP responses and hub events.
//! Views never assume the event and the response arrive in any order.

pub mod comments;
pub mod feed;
pub mod friend;
pub mod optimistic;

use crate::hub::events::ClientMessage;
use crate::hub::Event;

pub use comments::CommentThread;
pub use feed::FeedState;
pub use friend::FriendButton;
pub use optimistic::{
    CorrelationKey, OptimisticList, Order, Reconcilable, Reconciled, DEFAULT_PENDING_TIMEOUT,
};

/// A view that reacts to hub events.
pub trait ApplyEvent {
    /// Returns `true` when the event changed what the view renders.
    fn apply_event(&mut self, event: &Event) -> bool;
}

/// Decode one server frame.
pub fn decode_frame(text: &str) -> Result<Event, serde_json::Error> {
    serde_json::from_str(text)
}

/// Frames a client sends right after connecting.
pub fn join_frames(user_id: &str) -> Result<[String; 2], serde_json::Error> {
    Ok([
        serde_json::to_string(&ClientMessage::JoinUserRoom(user_id.to_string()))?,
        serde_json::to_string(&ClientMessage::JoinFeed)?,
    ])
}

/// Fan one frame out to every mounted view.
pub fn dispatch(views: &mut [&mut dyn ApplyEvent], event: &Event) -> bool {
    let mut changed = false;
    for view in views.iter_mut() {
        changed |= view.apply_event(event);
    }
    changed
}
