//! Friend requests and friendships.
//!
//! A friendship is an accepted request. Every edge change is announced to
//! both parties with `friend-status-update`, each seeing the other as the
//! counterpart.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use social_common::PrefixedId;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::events::{FriendStatus, FriendStatusUpdate};
use crate::hub::Event;
use crate::models::friend_request::{FriendRequest, FriendRequestStatus};
use crate::models::notification::{Notification, NotificationKind};
use crate::routes::notifications::notify;
use crate::routes::optional_text;
use crate::AppState;

/// Maximum friend request message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/friends/requests", post(send_friend_request))
        .route(
            "/friends/requests/{request_id}",
            post(respond_to_friend_request).delete(cancel_friend_request),
        )
        .route("/friends/status/{user_id}", get(friend_status))
        .route("/friends/{user_id}", delete(remove_friend))
}

/// How `viewer` sees the edge described by `request`.
pub fn status_seen_by(request: Option<&FriendRequest>, viewer: &str) -> FriendStatus {
    match request {
        Some(r) if r.status == FriendRequestStatus::Accepted => FriendStatus::Friends,
        Some(r) if r.status == FriendRequestStatus::Pending && r.sender_id == viewer => {
            FriendStatus::PendingSent
        }
        Some(r) if r.status == FriendRequestStatus::Pending => FriendStatus::PendingReceived,
        _ => FriendStatus::None,
    }
}

/// Tell both parties how the edge now looks from their side.
fn announce(state: &AppState, request: Option<&FriendRequest>, a: &str, b: &str) {
    let request_id = request
        .filter(|r| r.status == FriendRequestStatus::Pending)
        .map(|r| r.id.clone());
    for (viewer, other) in [(a, b), (b, a)] {
        state.hub.emit_to_user(
            viewer,
            Event::FriendStatusUpdate(FriendStatusUpdate {
                user_id: other.to_string(),
                status: status_seen_by(request, viewer),
                request_id: request_id.clone(),
            }),
        );
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/friends/requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendFriendRequestRequest {
    pub receiver_id: String,
    pub message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/friends/requests",
    tag = "Friends",
    security(("bearer" = [])),
    request_body = SendFriendRequestRequest,
    responses(
        (status = 201, description = "Request sent", body = FriendRequest),
        (status = 400, description = "Cannot befriend yourself", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
        (status = 409, description = "Already friends or request pending", body = ApiErrorBody),
    ),
)]
pub async fn send_friend_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SendFriendRequestRequest>,
) -> Result<(StatusCode, Json<FriendRequest>), ApiError> {
    if body.receiver_id == auth.id() {
        return Err(ApiError::bad_request("Cannot send friend request to yourself"));
    }
    let message = optional_text("message", body.message.as_deref(), MAX_MESSAGE_CHARS)?;
    let receiver = state
        .store
        .get_user(&body.receiver_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(existing) = state.store.find_open_friend_request(auth.id(), &receiver.id).await? {
        return Err(match existing.status {
            FriendRequestStatus::Accepted => ApiError::conflict("Already friends"),
            _ => ApiError::conflict("Friend request already exists"),
        });
    }

    let request = state
        .store
        .create_friend_request(FriendRequest {
            id: FriendRequest::generate(),
            sender_id: auth.id().to_string(),
            receiver_id: receiver.id.clone(),
            status: FriendRequestStatus::Pending,
            message,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(request_id = %request.id, sender_id = %auth.id(), receiver_id = %receiver.id, "friend request sent");

    let mut notification = Notification::new(
        Notification::generate(),
        &receiver.id,
        auth.summary(),
        NotificationKind::FriendRequest,
        format!("{} sent you a friend request", auth.user.display_name),
    );
    notification.related_friend_request = Some(request.id.clone());
    notify(&state, notification).await;
    announce(&state, Some(&request), auth.id(), &receiver.id);

    Ok((StatusCode::CREATED, Json(request)))
}

// ---------------------------------------------------------------------------
// POST /api/v1/friends/requests/:request_id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FriendAction {
    Accept,
    Decline,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondFriendRequestRequest {
    pub action: FriendAction,
}

#[utoipa::path(
    post,
    path = "/api/v1/friends/requests/{request_id}",
    tag = "Friends",
    security(("bearer" = [])),
    params(("request_id" = String, Path, description = "Friend request ID")),
    request_body = RespondFriendRequestRequest,
    responses(
        (status = 200, description = "Request accepted or declined", body = FriendRequest),
        (status = 400, description = "Request already processed", body = ApiErrorBody),
        (status = 403, description = "Not the receiver", body = ApiErrorBody),
        (status = 404, description = "Request not found", body = ApiErrorBody),
    ),
)]
pub async fn respond_to_friend_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(body): Json<RespondFriendRequestRequest>,
) -> Result<Json<FriendRequest>, ApiError> {
    let request = state
        .store
        .get_friend_request(&request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request not found"))?;
    if request.receiver_id != auth.id() {
        return Err(ApiError::forbidden("Only the receiver can respond to a friend request"));
    }
    if request.status != FriendRequestStatus::Pending {
        return Err(ApiError::bad_request("Friend request already processed"));
    }

    let (status, kind, verb) = match body.action {
        FriendAction::Accept => (
            FriendRequestStatus::Accepted,
            NotificationKind::FriendAccepted,
            "accepted",
        ),
        FriendAction::Decline => (
            FriendRequestStatus::Declined,
            NotificationKind::FriendDeclined,
            "declined",
        ),
    };
    let request = state.store.answer_friend_request(&request.id, status).await?;

    tracing::info!(request_id = %request.id, status = ?request.status, "friend request answered");

    let mut notification = Notification::new(
        Notification::generate(),
        &request.sender_id,
        auth.summary(),
        kind,
        format!("{} {verb} your friend request", auth.user.display_name),
    );
    notification.related_friend_request = Some(request.id.clone());
    notify(&state, notification).await;
    announce(&state, Some(&request), &request.sender_id, &request.receiver_id);

    Ok(Json(request))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/friends/requests/:request_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/friends/requests/{request_id}",
    tag = "Friends",
    security(("bearer" = [])),
    params(("request_id" = String, Path, description = "Friend request ID")),
    responses(
        (status = 204, description = "Request cancelled"),
        (status = 400, description = "Request no longer pending", body = ApiErrorBody),
        (status = 403, description = "Not the sender", body = ApiErrorBody),
        (status = 404, description = "Request not found", body = ApiErrorBody),
    ),
)]
pub async fn cancel_friend_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let request = state
        .store
        .get_friend_request(&request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request not found"))?;
    if request.sender_id != auth.id() {
        return Err(ApiError::forbidden("Only the sender can cancel a friend request"));
    }
    if request.status != FriendRequestStatus::Pending {
        return Err(ApiError::bad_request("Friend request is no longer pending"));
    }

    state
        .store
        .delete_friend_request(&request.id, FriendRequestStatus::Pending)
        .await?;
    tracing::info!(request_id = %request.id, "friend request cancelled");
    announce(&state, None, &request.sender_id, &request.receiver_id);

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/friends/:user_id
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct FriendStatusResponse {
    pub user_id: String,
    pub status: FriendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[utoipa::path(
    delete,
    path = "/api/v1/friends/{user_id}",
    tag = "Friends",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "Friend to remove")),
    responses(
        (status = 200, description = "Friendship removed", body = FriendStatusResponse),
        (status = 400, description = "Not friends", body = ApiErrorBody),
    ),
)]
pub async fn remove_friend(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FriendStatusResponse>, ApiError> {
    if user_id == auth.id() {
        return Err(ApiError::bad_request("Cannot remove yourself"));
    }
    let friendship = state
        .store
        .find_open_friend_request(auth.id(), &user_id)
        .await?
        .filter(|r| r.status == FriendRequestStatus::Accepted)
        .ok_or_else(|| ApiError::bad_request("Not friends"))?;

    state
        .store
        .delete_friend_request(&friendship.id, FriendRequestStatus::Accepted)
        .await?;
    tracing::info!(user_id = %auth.id(), friend_id = %user_id, "friendship removed");
    announce(&state, None, auth.id(), &user_id);

    Ok(Json(FriendStatusResponse {
        user_id,
        status: FriendStatus::None,
        request_id: None,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/friends/status/:user_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/friends/status/{user_id}",
    tag = "Friends",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "Other user")),
    responses(
        (status = 200, description = "Edge as seen by the caller", body = FriendStatusResponse),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn friend_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FriendStatusResponse>, ApiError> {
    if state.store.get_user(&user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    let request = state.store.find_open_friend_request(auth.id(), &user_id).await?;
    let status = status_seen_by(request.as_ref(), auth.id());

    Ok(Json(FriendStatusResponse {
        user_id,
        status,
        request_id: request
            .filter(|r| r.status == FriendRequestStatus::Pending)
            .map(|r| r.id),
    }))
}
