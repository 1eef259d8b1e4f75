use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::id::prefix;
use social_common::PrefixedId;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: FriendRequestStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl FriendRequest {
    /// Whether `a` and `b` are the two parties of this request, in either direction.
    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b) || (self.sender_id == b && self.receiver_id == a)
    }
}

impl PrefixedId for FriendRequest {
    const PREFIX: &'static str = prefix::FRIEND_REQUEST;
}
