//! Comment and reply endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use social_common::PrefixedId;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::events::{CommentAdded, CommentLiked, CommentRef, CommentUpdated};
use crate::hub::Event;
use crate::models::admin_action::{AdminAction, AdminActionKind};
use crate::models::comment::Comment;
use crate::models::notification::{Notification, NotificationKind};
use crate::routes::notifications::notify;
use crate::routes::{audit_log, required_text};
use crate::store::Revision;
use crate::AppState;

/// Maximum comment length in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

const DEFAULT_REMOVAL_REASON: &str = "Inappropriate comment";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create_comment))
        .route(
            "/comments/{comment_id}",
            patch(update_comment).delete(delete_comment),
        )
        .route("/comments/{comment_id}/like", post(toggle_comment_like))
}

async fn load_live_comment(state: &AppState, comment_id: &str) -> Result<Comment, ApiError> {
    state
        .store
        .get_comment(comment_id)
        .await?
        .filter(|c| !c.is_deleted)
        .ok_or_else(|| ApiError::not_found("Comment not found"))
}

// ---------------------------------------------------------------------------
// POST /api/v1/comments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub content: Option<String>,
    /// Set when replying to another comment on the same post.
    pub parent_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/comments",
    tag = "Comments",
    security(("bearer" = [])),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Post or parent comment not found", body = ApiErrorBody),
    ),
)]
pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let content = required_text("content", body.content.as_deref(), MAX_COMMENT_CHARS)?;

    let post = state
        .store
        .get_post(&body.post_id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let parent = match body.parent_id.as_deref() {
        Some(parent_id) => {
            let parent = load_live_comment(&state, parent_id)
                .await
                .map_err(|_| ApiError::not_found("Parent comment not found"))?;
            if parent.post_id != post.id {
                return Err(ApiError::bad_request("Parent comment belongs to another post"));
            }
            Some(parent)
        }
        None => None,
    };

    let comment = state
        .store
        .create_comment(Comment {
            id: Comment::generate(),
            post_id: post.id.clone(),
            author: auth.summary(),
            content,
            parent_id: parent.as_ref().map(|p| p.id.clone()),
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(
        comment_id = %comment.id,
        post_id = %post.id,
        reply = parent.is_some(),
        "comment created"
    );
    state.hub.emit_to_feed(Event::CommentAdded(CommentAdded {
        post_id: post.id.clone(),
        comment: comment.clone(),
    }));

    // A reply notifies the parent's author; a top-level comment the post's.
    let (recipient, kind, message) = match &parent {
        Some(parent) => (
            parent.author.id.as_str(),
            NotificationKind::Reply,
            format!("{} replied to your comment", auth.user.display_name),
        ),
        None => (
            post.author.id.as_str(),
            NotificationKind::Comment,
            format!("{} commented on your post", auth.user.display_name),
        ),
    };
    let mut notification = Notification::new(
        Notification::generate(),
        recipient,
        auth.summary(),
        kind,
        message,
    );
    notification.related_post = Some(post.id.clone());
    notification.related_comment = Some(comment.id.clone());
    notify(&state, notification).await;

    Ok((StatusCode::CREATED, Json(comment)))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/comments/:comment_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

#[utoipa::path(
    patch,
    path = "/api/v1/comments/{comment_id}",
    tag = "Comments",
    security(("bearer" = [])),
    params(("comment_id" = String, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn update_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let content = required_text("content", body.content.as_deref(), MAX_COMMENT_CHARS)?;

    let comment = load_live_comment(&state, &comment_id).await?;
    if !auth.can_modify(&comment.author.id) {
        return Err(ApiError::forbidden("You can only edit your own comments"));
    }

    let Revision { before, after: comment } =
        state.store.edit_comment(&comment.id, content).await?;

    state.hub.emit_to_feed(Event::CommentUpdated(CommentUpdated {
        post_id: comment.post_id.clone(),
        comment_id: comment.id.clone(),
        comment: comment.clone(),
    }));

    if auth.acts_as_admin(&comment.author.id) {
        tracing::info!(comment_id = %comment.id, admin_id = %auth.id(), "admin edited comment");
        let action = AdminAction::new(auth.id(), AdminActionKind::EditComment, &comment.author.id)
            .on_comment(&comment.post_id, &comment.id)
            .change(before.content, comment.content.as_str());
        audit_log::record(&state, action).await;
    }

    Ok(Json(comment))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/comments/:comment_id
// ---------------------------------------------------------------------------

/// Optional body for `DELETE /comments/{id}`. Only admins removing someone
/// else's comment use it.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteCommentRequest {
    /// Shown to the author in their removal notification.
    pub reason: Option<String>,
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{comment_id}",
    tag = "Comments",
    security(("bearer" = [])),
    params(("comment_id" = String, Path, description = "Comment ID")),
    request_body = DeleteCommentRequest,
    responses(
        (status = 200, description = "Comment soft-deleted", body = Comment),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    body: Option<Json<DeleteCommentRequest>>,
) -> Result<Json<Comment>, ApiError> {
    let comment = load_live_comment(&state, &comment_id).await?;
    if !auth.can_modify(&comment.author.id) {
        return Err(ApiError::forbidden("You can only delete your own comments"));
    }

    let comment = state.store.soft_delete_comment(&comment.id).await?;
    tracing::info!(comment_id = %comment.id, by = %auth.id(), "comment deleted");
    state.hub.emit_to_feed(Event::CommentDeleted(CommentRef {
        post_id: comment.post_id.clone(),
        comment_id: comment.id.clone(),
    }));

    if auth.acts_as_admin(&comment.author.id) {
        let reason = body
            .and_then(|Json(b)| b.reason)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOVAL_REASON.to_string());

        let mut notification = Notification::new(
            Notification::generate(),
            &comment.author.id,
            auth.summary(),
            NotificationKind::CommentDeletedByAdmin,
            format!("Your comment was removed by an admin: {reason}"),
        );
        notification.related_post = Some(comment.post_id.clone());
        notification.related_comment = Some(comment.id.clone());
        notify(&state, notification).await;

        let action = AdminAction::new(auth.id(), AdminActionKind::DeleteComment, &comment.author.id)
            .on_comment(&comment.post_id, &comment.id)
            .change(comment.content.as_str(), "")
            .reason(reason);
        audit_log::record(&state, action).await;
    }

    Ok(Json(comment))
}

// ---------------------------------------------------------------------------
// POST /api/v1/comments/:comment_id/like
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/comments/{comment_id}/like",
    tag = "Comments",
    security(("bearer" = [])),
    params(("comment_id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Like toggled", body = Comment),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn toggle_comment_like(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<Json<Comment>, ApiError> {
    let (comment, is_liked) = state
        .store
        .toggle_comment_like(&comment_id, auth.id())
        .await?;

    state.hub.emit_to_feed(Event::CommentLiked(CommentLiked {
        post_id: comment.post_id.clone(),
        comment_id: comment.id.clone(),
        like_count: comment.like_count(),
        likes: comment.likes.clone(),
        is_liked,
        user_id: auth.id().to_string(),
    }));

    if is_liked {
        let mut notification = Notification::new(
            Notification::generate(),
            &comment.author.id,
            auth.summary(),
            NotificationKind::LikeComment,
            format!("{} liked your comment", auth.user.display_name),
        );
        notification.related_post = Some(comment.post_id.clone());
        notification.related_comment = Some(comment.id.clone());
        notify(&state, notification).await;
    }

    Ok(Json(comment))
}
