use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use social_common::PrefixedId;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::events::{FollowAction, FollowTarget, FollowUpdated};
use crate::hub::Event;
use crate::models::follow::Follow;
use crate::models::notification::{Notification, NotificationKind};
use crate::routes::notifications::notify;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follows/{user_id}", post(follow_user).delete(unfollow_user))
        .route("/follows/status/{user_id}", get(follow_status))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowStatusResponse {
    pub user_id: String,
    /// The caller follows `user_id`.
    pub is_following: bool,
    /// `user_id` follows the caller.
    pub followed_by: bool,
}

fn announce(state: &AppState, follower_id: &str, following_id: &str, action: FollowAction) {
    let target = FollowTarget {
        user_id: following_id.to_string(),
    };
    let event = match action {
        FollowAction::Follow => Event::UserFollowed(target),
        FollowAction::Unfollow => Event::UserUnfollowed(target),
    };
    state.hub.emit_to_user(follower_id, event);
    state.hub.emit_to_feed(Event::FollowUpdated(FollowUpdated {
        follower_id: follower_id.to_string(),
        following_id: following_id.to_string(),
        action,
    }));
}

// ---------------------------------------------------------------------------
// POST /api/v1/follows/:user_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/follows/{user_id}",
    tag = "Follows",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User to follow")),
    responses(
        (status = 201, description = "Now following", body = Follow),
        (status = 400, description = "Cannot follow yourself", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
        (status = 409, description = "Already following", body = ApiErrorBody),
    ),
)]
pub async fn follow_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Follow>), ApiError> {
    if user_id == auth.id() {
        return Err(ApiError::bad_request("Cannot follow yourself"));
    }
    let target = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let follow = state
        .store
        .create_follow(Follow {
            follower_id: auth.id().to_string(),
            following_id: target.id.clone(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(follower_id = %auth.id(), following_id = %target.id, "followed");
    announce(&state, auth.id(), &target.id, FollowAction::Follow);

    let mut notification = Notification::new(
        Notification::generate(),
        &target.id,
        auth.summary(),
        NotificationKind::NewFollower,
        format!("{} started following you", auth.user.display_name),
    );
    notification.related_user = Some(auth.id().to_string());
    notify(&state, notification).await;

    Ok((StatusCode::CREATED, Json(follow)))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/follows/:user_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/follows/{user_id}",
    tag = "Follows",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User to unfollow")),
    responses(
        (status = 200, description = "Unfollowed", body = FollowStatusResponse),
        (status = 400, description = "Not following this user", body = ApiErrorBody),
    ),
)]
pub async fn unfollow_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FollowStatusResponse>, ApiError> {
    if !state.store.delete_follow(auth.id(), &user_id).await? {
        return Err(ApiError::bad_request("Not following this user"));
    }

    tracing::info!(follower_id = %auth.id(), following_id = %user_id, "unfollowed");
    announce(&state, auth.id(), &user_id, FollowAction::Unfollow);

    let followed_by = state.store.is_following(&user_id, auth.id()).await?;
    Ok(Json(FollowStatusResponse {
        user_id,
        is_following: false,
        followed_by,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/follows/status/:user_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/follows/status/{user_id}",
    tag = "Follows",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "Other user")),
    responses(
        (status = 200, description = "Follow edges between caller and user", body = FollowStatusResponse),
    ),
)]
pub async fn follow_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FollowStatusResponse>, ApiError> {
    let is_following = state.store.is_following(auth.id(), &user_id).await?;
    let followed_by = state.store.is_following(&user_id, auth.id()).await?;
    Ok(Json(FollowStatusResponse {
        user_id,
        is_following,
        followed_by,
    }))
}
