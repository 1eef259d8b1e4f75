//! The event hub: room-targeted fan-out of catalog events to live connections.
//!
//! Publishing never fails the caller. Missing rooms, offline recipients and
//! full outbound queues are normal states; they are logged and skipped.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use social_common::id::{prefix, prefixed_ulid};
use tokio::sync::mpsc;

use crate::store::Store;

use super::events::{ClientMessage, Envelope, Event, PresenceChanged, Room, Scope};
use super::presence::{PresenceTracker, Transition};
use super::registry::{ConnectionRegistry, Frame, SendOutcome};

/// Process-wide publish/subscribe broker.
pub struct EventHub {
    registry: ConnectionRegistry,
    presence: PresenceTracker,
    store: Arc<dyn Store>,
    queue_depth: usize,
}

impl EventHub {
    pub fn new(store: Arc<dyn Store>, queue_depth: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            presence: PresenceTracker::new(),
            store,
            queue_depth: queue_depth.max(1),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Register a new transport session and hand back its outbound queue.
    pub fn connect(&self) -> (String, mpsc::Receiver<Frame>) {
        let conn_id = prefixed_ulid(prefix::CONNECTION);
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.registry.register(conn_id.clone(), tx);
        tracing::debug!(%conn_id, "connection registered");
        (conn_id, rx)
    }

    /// Dispatch one inbound control message.
    pub async fn handle_client_message(&self, conn_id: &str, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinUserRoom(user_id) => self.join_user_room(conn_id, &user_id).await,
            ClientMessage::JoinFeed => {
                self.join(conn_id, Room::Feed);
            }
        }
    }

    /// Idempotent room join. Unknown connections are ignored.
    pub fn join(&self, conn_id: &str, room: Room) -> bool {
        let joined = self.registry.join(conn_id, room.clone());
        if joined {
            tracing::debug!(%conn_id, %room, "joined room");
        }
        joined
    }

    /// The client asserts which user it belongs to.
    ///
    /// Re-announcing the same user is a no-op for presence. Announcing a
    /// different user moves the connection out of the previous user's room.
    pub async fn join_user_room(&self, conn_id: &str, user_id: &str) {
        let Some(previous) = self.registry.set_user(conn_id, user_id) else {
            tracing::debug!(%conn_id, %user_id, "join-user-room on unknown connection");
            return;
        };

        match previous.as_deref() {
            Some(prev) if prev == user_id => {
                self.join(conn_id, Room::User(user_id.to_string()));
                return;
            }
            Some(prev) => {
                self.registry.leave(conn_id, &Room::User(prev.to_string()));
                if self.presence.disconnect(prev) == Some(Transition::Offline) {
                    self.publish_presence(prev).await;
                }
            }
            None => {}
        }

        self.join(conn_id, Room::User(user_id.to_string()));
        if self.presence.connect(user_id) == Some(Transition::Online) {
            self.publish_presence(user_id).await;
        }
    }

    /// Tear down a connection: leave every room and settle presence.
    pub async fn disconnect(&self, conn_id: &str) {
        let Some(removed) = self.registry.remove(conn_id) else {
            return;
        };
        tracing::debug!(%conn_id, rooms = removed.rooms.len(), "connection removed");

        if let Some(user_id) = removed.user_id {
            if self.presence.disconnect(&user_id) == Some(Transition::Offline) {
                self.publish_presence(&user_id).await;
            }
        }
    }

    /// Persist the user's presence, then announce it to everyone.
    ///
    /// Flips for one user are published one at a time, and each publisher
    /// reads the live count under the user's lock. A flip that was overtaken
    /// by a later one is settled to the current state instead of replayed,
    /// so the last write and the last broadcast always match the sockets.
    async fn publish_presence(&self, user_id: &str) {
        let mut announced = self.presence.announce_lock(user_id).await;
        let is_online = self.presence.is_online(user_id);
        if *announced == Some(is_online) {
            tracing::debug!(%user_id, is_online, "presence already announced");
            return;
        }

        let at = Utc::now();
        if let Err(e) = self.store.set_presence(user_id, is_online, at).await {
            tracing::warn!(%user_id, error = %e, "failed to persist presence");
        }
        tracing::info!(%user_id, is_online, "presence changed");
        self.emit_to_all(Event::PresenceChanged(PresenceChanged {
            user_id: user_id.to_string(),
            is_online,
            last_seen: at,
        }));
        *announced = Some(is_online);
    }

    // -----------------------------------------------------------------------
    // Publish API
    // -----------------------------------------------------------------------

    /// Deliver to every connection in `user:<user_id>`. Returns how many
    /// connections had the frame queued.
    pub fn emit_to_user(&self, user_id: &str, event: Event) -> usize {
        let targets = self.registry.members(&Room::User(user_id.to_string()));
        self.publish(Envelope::new(Scope::User, event), targets)
    }

    /// Deliver to every connection in `feed`.
    pub fn emit_to_feed(&self, event: Event) -> usize {
        let targets = self.registry.members(&Room::Feed);
        self.publish(Envelope::new(Scope::Feed, event), targets)
    }

    /// Deliver to every registered connection regardless of rooms.
    pub fn emit_to_all(&self, event: Event) -> usize {
        let targets = self.registry.all();
        self.publish(Envelope::new(Scope::All, event), targets)
    }

    fn publish(&self, envelope: Envelope, targets: Vec<String>) -> usize {
        let topic = envelope.event.topic();
        if !envelope.is_well_scoped() {
            tracing::error!(
                topic,
                path = ?envelope.scope,
                expected = ?envelope.event.scope(),
                "event published on the wrong path, dropped"
            );
            return 0;
        }

        if targets.is_empty() {
            tracing::debug!(topic, "no recipients");
            return 0;
        }

        let frame: Frame = match serde_json::to_string(&envelope.event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::warn!(topic, error = %e, "failed to serialize event, dropped");
                return 0;
            }
        };

        let mut delivered = 0;
        for conn_id in &targets {
            match self.registry.send(conn_id, &frame) {
                SendOutcome::Queued => delivered += 1,
                SendOutcome::Full => {
                    tracing::warn!(%conn_id, topic, "outbound queue full, event dropped");
                }
                SendOutcome::Gone => {
                    tracing::debug!(%conn_id, topic, "connection gone mid-publish");
                }
            }
        }

        tracing::debug!(topic, targets = targets.len(), delivered, "event published");
        delivered
    }
}

/// Late-bound handle to the process hub, carried in `AppState`.
///
/// Handlers may run before the transport layer installs the hub; emits made
/// then are dropped with a debug log and report zero deliveries.
#[derive(Clone, Default)]
pub struct HubHandle {
    inner: Arc<OnceLock<Arc<EventHub>>>,
}

impl HubHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hub. Returns `false` if one was already installed.
    pub fn install(&self, hub: Arc<EventHub>) -> bool {
        self.inner.set(hub).is_ok()
    }

    pub fn get(&self) -> Option<Arc<EventHub>> {
        self.inner.get().cloned()
    }

    pub fn emit_to_user(&self, user_id: &str, event: Event) -> usize {
        match self.inner.get() {
            Some(hub) => hub.emit_to_user(user_id, event),
            None => Self::not_ready(&event),
        }
    }

    pub fn emit_to_feed(&self, event: Event) -> usize {
        match self.inner.get() {
            Some(hub) => hub.emit_to_feed(event),
            None => Self::not_ready(&event),
        }
    }

    pub fn emit_to_all(&self, event: Event) -> usize {
        match self.inner.get() {
            Some(hub) => hub.emit_to_all(event),
            None => Self::not_ready(&event),
        }
    }

    fn not_ready(event: &Event) -> usize {
        tracing::debug!(topic = event.topic(), "event hub not installed, event dropped");
        0
    }
}
