//! In-memory per-user presence derived from live-connection counts.
//!
//! Presence is per-**user**, not per-connection. A user goes online when
//! their count moves 0→1 and offline when it moves 1→0; intermediate
//! connects and disconnects (extra tabs, devices) change nothing visible.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A 0↔1 transition the caller must persist and broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

/// Thread-safe, DashMap-backed presence counter.
///
/// Counts and transitions are decided under the entry's shard lock, so a
/// disconnect racing a reconnect yields exactly one transition each way.
pub struct PresenceTracker {
    connections: DashMap<String, usize>,
    /// Last presence value announced per user. Holding a user's lock
    /// serializes the persist-then-broadcast of their flips.
    announced: DashMap<String, Arc<Mutex<Option<bool>>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            announced: DashMap::new(),
        }
    }

    /// Count one more connection for the user.
    ///
    /// Returns `Some(Transition::Online)` only on the first connection.
    pub fn connect(&self, user_id: &str) -> Option<Transition> {
        let mut count = self.connections.entry(user_id.to_string()).or_insert(0);
        *count += 1;
        (*count == 1).then_some(Transition::Online)
    }

    /// Count one fewer connection for the user.
    ///
    /// Returns `Some(Transition::Offline)` only when the last connection goes.
    /// Unknown users are ignored.
    pub fn disconnect(&self, user_id: &str) -> Option<Transition> {
        self.connections
            .remove_if_mut(user_id, |_, count| {
                *count = count.saturating_sub(1);
                *count == 0
            })
            .map(|_| Transition::Offline)
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.connections.get(user_id).map(|c| *c).unwrap_or(0)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.connection_count(user_id) > 0
    }

    /// Wait for the right to announce this user's presence.
    ///
    /// The guard holds the last announced value. Whoever holds it should
    /// announce the *current* state, and only when it differs.
    pub async fn announce_lock(&self, user_id: &str) -> OwnedMutexGuard<Option<bool>> {
        let lock = self
            .announced
            .entry(user_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
