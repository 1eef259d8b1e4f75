use super::ApplyEvent;
use crate::hub::events::FriendStatus;
use crate::hub::Event;

/// Friend button on another user's profile.
///
/// Actions flip the status immediately and remember the previous state
/// until the request settles. A `friend-status-update` for this pair always
/// wins, since it reflects what the server committed.
#[derive(Debug, Clone)]
pub struct FriendButton {
    other_id: String,
    status: FriendStatus,
    request_id: Option<String>,
    pending: Option<(FriendStatus, Option<String>)>,
}

impl FriendButton {
    pub fn new(other_id: impl Into<String>, status: FriendStatus, request_id: Option<String>) -> Self {
        Self {
            other_id: other_id.into(),
            status,
            request_id,
            pending: None,
        }
    }

    pub fn status(&self) -> FriendStatus {
        self.status
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn begin(&mut self, next: FriendStatus) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some((self.status, self.request_id.clone()));
        self.status = next;
        if next == FriendStatus::None {
            self.request_id = None;
        }
        true
    }

    /// The action the button offers in its current state, applied locally.
    pub fn send(&mut self) -> bool {
        self.status == FriendStatus::None && self.begin(FriendStatus::PendingSent)
    }

    pub fn accept(&mut self) -> bool {
        self.status == FriendStatus::PendingReceived && self.begin(FriendStatus::Friends)
    }

    pub fn decline(&mut self) -> bool {
        self.status == FriendStatus::PendingReceived && self.begin(FriendStatus::None)
    }

    pub fn cancel(&mut self) -> bool {
        self.status == FriendStatus::PendingSent && self.begin(FriendStatus::None)
    }

    pub fn unfriend(&mut self) -> bool {
        self.status == FriendStatus::Friends && self.begin(FriendStatus::None)
    }

    /// The request succeeded; keep the optimistic state, adopting the id.
    pub fn succeeded(&mut self, request_id: Option<String>) {
        if self.pending.take().is_some() && self.status != FriendStatus::None {
            self.request_id = request_id.or(self.request_id.take());
        }
    }

    /// The request failed; restore the state from before the action.
    pub fn failed(&mut self) -> bool {
        match self.pending.take() {
            Some((status, request_id)) => {
                self.status = status;
                self.request_id = request_id;
                true
            }
            None => false,
        }
    }
}

impl ApplyEvent for FriendButton {
    fn apply_event(&mut self, event: &Event) -> bool {
        let Event::FriendStatusUpdate(update) = event else {
            return false;
        };
        if update.user_id != self.other_id {
            return false;
        }
        self.pending = None;
        let changed = self.status != update.status || self.request_id != update.request_id;
        self.status = update.status;
        self.request_id = update.request_id.clone();
        changed
    }
}
