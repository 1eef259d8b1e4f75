//! Real-time event hub.
//!
//! Connections join per-user rooms and the singleton `feed` room over the
//! `/socket` WebSocket. Mutation handlers publish through [`HubHandle`].

pub mod events;
pub mod fanout;
pub mod presence;
pub mod registry;
pub mod server;

pub use events::{Event, Room, Scope};
pub use fanout::{EventHub, HubHandle};
