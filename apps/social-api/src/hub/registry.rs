//! Connection registry and room membership.
//!
//! Rooms are not stored on their own: a room is the set of connections that
//! joined it, and it disappears when the last member leaves.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::Room;

/// A serialized event, shared by every recipient of one publish.
pub type Frame = Arc<str>;

/// Per-connection state.
pub struct ConnectionEntry {
    pub conn_id: String,
    /// Set once the client announces itself with `join-user-room`.
    pub user_id: Option<String>,
    pub rooms: HashSet<Room>,
    sender: mpsc::Sender<Frame>,
}

/// Outcome of handing a frame to one connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Queue full. The frame is dropped for this connection only.
    Full,
    /// The connection is gone or its socket task has exited.
    Gone,
}

/// What `remove` hands back so the caller can run disconnect side effects.
#[derive(Debug)]
pub struct RemovedConnection {
    pub conn_id: String,
    pub user_id: Option<String>,
    pub rooms: HashSet<Room>,
}

/// Shared registry of live connections.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// entry. Lock order is always connection entry, then room shard.
pub struct ConnectionRegistry {
    connections: DashMap<String, Mutex<ConnectionEntry>>,
    rooms: DashMap<Room, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register a freshly connected transport session.
    pub fn register(&self, conn_id: String, sender: mpsc::Sender<Frame>) {
        let entry = ConnectionEntry {
            conn_id: conn_id.clone(),
            user_id: None,
            rooms: HashSet::new(),
            sender,
        };
        self.connections.insert(conn_id, Mutex::new(entry));
    }

    /// Add a connection to a room. Returns `true` only if membership changed;
    /// repeated joins and unknown connections are no-ops.
    pub fn join(&self, conn_id: &str, room: Room) -> bool {
        let Some(entry) = self.connections.get(conn_id) else {
            return false;
        };
        let mut e = entry.lock();
        if !e.rooms.insert(room.clone()) {
            return false;
        }
        self.rooms.entry(room).or_default().insert(conn_id.to_string());
        true
    }

    /// Drop a single room membership, discarding the room if it empties.
    pub fn leave(&self, conn_id: &str, room: &Room) -> bool {
        let Some(entry) = self.connections.get(conn_id) else {
            return false;
        };
        let mut e = entry.lock();
        if !e.rooms.remove(room) {
            return false;
        }
        self.detach(conn_id, room);
        true
    }

    /// Associate a user with the connection, returning the previous one.
    pub fn set_user(&self, conn_id: &str, user_id: &str) -> Option<Option<String>> {
        let entry = self.connections.get(conn_id)?;
        let mut e = entry.lock();
        Some(e.user_id.replace(user_id.to_string()))
    }

    pub fn user_of(&self, conn_id: &str) -> Option<String> {
        let entry = self.connections.get(conn_id)?;
        let e = entry.lock();
        e.user_id.clone()
    }

    /// Remove a connection from the registry and from every room it was in.
    pub fn remove(&self, conn_id: &str) -> Option<RemovedConnection> {
        let (_, entry) = self.connections.remove(conn_id)?;
        let e = entry.into_inner();
        for room in &e.rooms {
            self.detach(conn_id, room);
        }
        Some(RemovedConnection {
            conn_id: e.conn_id,
            user_id: e.user_id,
            rooms: e.rooms,
        })
    }

    fn detach(&self, conn_id: &str, room: &Room) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(conn_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    /// Snapshot of a room's members. Safe to iterate while connections leave.
    pub fn members(&self, room: &Room) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every registered connection id.
    pub fn all(&self) -> Vec<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn room_exists(&self, room: &Room) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Non-blocking hand-off of a frame to one connection.
    pub fn send(&self, conn_id: &str, frame: &Frame) -> SendOutcome {
        let Some(entry) = self.connections.get(conn_id) else {
            return SendOutcome::Gone;
        };
        let e = entry.lock();
        match e.sender.try_send(frame.clone()) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Gone,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
