//! Post create/edit/delete/like endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use social_common::PrefixedId;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::events::{PostLiked, PostRef, PostUpdated, VisibilityChange};
use crate::hub::Event;
use crate::models::admin_action::{AdminAction, AdminActionKind};
use crate::models::notification::{Notification, NotificationKind};
use crate::models::post::{Post, Visibility};
use crate::routes::notifications::notify;
use crate::routes::{audit_log, required_text};
use crate::store::{PostEdit, Revision};
use crate::AppState;

/// Maximum post length in characters.
pub const MAX_POST_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route(
            "/posts/{post_id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/{post_id}/like", post(toggle_post_like))
}

async fn load_live_post(state: &AppState, post_id: &str) -> Result<Post, ApiError> {
    state
        .store
        .get_post(post_id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// The extra event a visibility change produces, if it crosses the public
/// boundary. Equal visibilities never produce one.
pub fn visibility_transition(old: Visibility, post: &Post) -> Option<Event> {
    let new = post.visibility;
    if old.is_public() == new.is_public() {
        return None;
    }

    let became_public = new.is_public();
    let change = VisibilityChange {
        post_id: post.id.clone(),
        author_id: post.author.id.clone(),
        old_visibility: old,
        visibility: new,
        post: became_public.then(|| post.clone()),
    };
    Some(if became_public {
        Event::PostShown(change)
    } else {
        Event::PostHidden(change)
    })
}

// ---------------------------------------------------------------------------
// POST /api/v1/posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    /// Defaults to `public`.
    pub visibility: Option<Visibility>,
}

#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "Posts",
    security(("bearer" = [])),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Banned", body = ApiErrorBody),
    ),
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let content = required_text("content", body.content.as_deref(), MAX_POST_CHARS)?;

    let now = Utc::now();
    let post = state
        .store
        .create_post(Post {
            id: Post::generate(),
            author: auth.summary(),
            content,
            visibility: body.visibility.unwrap_or(Visibility::Public),
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(post_id = %post.id, author_id = %auth.id(), "post created");
    state.hub.emit_to_feed(Event::PostCreated(post.clone()));
    notify_friends(&state, &auth, &post).await;

    Ok((StatusCode::CREATED, Json(post)))
}

/// Tell the author's friends about a new post they are allowed to see.
async fn notify_friends(state: &AppState, auth: &AuthUser, post: &Post) {
    if post.visibility == Visibility::Private {
        return;
    }
    let friends = match state.store.list_friend_ids(auth.id()).await {
        Ok(friends) => friends,
        Err(e) => {
            tracing::warn!(post_id = %post.id, error = %e, "failed to load friends for notification");
            return;
        }
    };

    for friend_id in friends {
        if post.visibility == Visibility::Followers {
            match state.store.is_following(&friend_id, auth.id()).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(%friend_id, error = %e, "failed to check follow edge");
                    continue;
                }
            }
        }
        let mut notification = Notification::new(
            Notification::generate(),
            &friend_id,
            auth.summary(),
            NotificationKind::NewPost,
            format!("{} shared a new post", auth.user.display_name),
        );
        notification.related_post = Some(post.id.clone());
        notify(state, notification).await;
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/posts/:post_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/posts/{post_id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Post not found or not visible", body = ApiErrorBody),
    ),
)]
pub async fn get_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let post = load_live_post(&state, &post_id).await?;

    let visible = match post.visibility {
        Visibility::Public => true,
        _ if auth.can_modify(&post.author.id) => true,
        Visibility::Followers => state.store.is_following(auth.id(), &post.author.id).await?,
        Visibility::Private => false,
    };
    if !visible {
        return Err(ApiError::not_found("Post not found"));
    }

    Ok(Json(post))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/posts/:post_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
}

#[utoipa::path(
    patch,
    path = "/api/v1/posts/{post_id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = Post),
        (status = 400, description = "No changes provided or validation error", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    if body.content.is_none() && body.visibility.is_none() {
        return Err(ApiError::bad_request("No changes provided"));
    }
    let content = body
        .content
        .as_deref()
        .map(|c| required_text("content", Some(c), MAX_POST_CHARS))
        .transpose()?;

    let post = load_live_post(&state, &post_id).await?;
    if !auth.can_modify(&post.author.id) {
        return Err(ApiError::forbidden("You can only edit your own posts"));
    }

    let Revision { before, after: post } = state
        .store
        .edit_post(
            &post.id,
            PostEdit {
                content,
                visibility: body.visibility,
            },
        )
        .await?;
    let old_visibility = before.visibility;
    tracing::info!(
        post_id = %post.id,
        old_visibility = ?old_visibility,
        visibility = ?post.visibility,
        "post updated"
    );

    state.hub.emit_to_feed(Event::PostUpdated(PostUpdated {
        post_id: post.id.clone(),
        post: post.clone(),
    }));
    if let Some(transition) = visibility_transition(old_visibility, &post) {
        state.hub.emit_to_all(transition);
    }

    if auth.acts_as_admin(&post.author.id) {
        if before.content != post.content {
            let action = AdminAction::new(auth.id(), AdminActionKind::EditPost, &post.author.id)
                .on_post(&post.id)
                .change(before.content.as_str(), post.content.as_str())
                .reason("Admin edit content");
            audit_log::record(&state, action).await;
        }
        if old_visibility != post.visibility {
            let action = AdminAction::new(auth.id(), AdminActionKind::EditPost, &post.author.id)
                .on_post(&post.id)
                .change(old_visibility.as_str(), post.visibility.as_str())
                .reason("Admin edit visibility");
            audit_log::record(&state, action).await;
        }
    }

    Ok(Json(post))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/posts/:post_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{post_id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post soft-deleted", body = Post),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let post = load_live_post(&state, &post_id).await?;
    if !auth.can_modify(&post.author.id) {
        return Err(ApiError::forbidden("You can only delete your own posts"));
    }

    let post = state.store.soft_delete_post(&post.id).await?;
    tracing::info!(post_id = %post.id, by = %auth.id(), "post deleted");
    state.hub.emit_to_feed(Event::PostDeleted(PostRef {
        post_id: post.id.clone(),
    }));

    if auth.acts_as_admin(&post.author.id) {
        let action = AdminAction::new(auth.id(), AdminActionKind::DeletePost, &post.author.id)
            .on_post(&post.id)
            .reason("Admin deletion");
        audit_log::record(&state, action).await;
    }

    Ok(Json(post))
}

// ---------------------------------------------------------------------------
// POST /api/v1/posts/:post_id/like
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/posts/{post_id}/like",
    tag = "Posts",
    security(("bearer" = [])),
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Like toggled", body = Post),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn toggle_post_like(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let (post, is_liked) = state.store.toggle_post_like(&post_id, auth.id()).await?;

    state.hub.emit_to_feed(Event::PostLiked(PostLiked {
        post_id: post.id.clone(),
        like_count: post.like_count(),
        is_liked,
        user_id: auth.id().to_string(),
    }));

    if is_liked {
        let mut notification = Notification::new(
            Notification::generate(),
            &post.author.id,
            auth.summary(),
            NotificationKind::LikePost,
            format!("{} liked your post", auth.user.display_name),
        );
        notification.related_post = Some(post.id.clone());
        notify(&state, notification).await;
    }

    Ok(Json(post))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;

    fn post_with(visibility: Visibility) -> Post {
        let now = Utc::now();
        Post {
            id: "post_1".to_string(),
            author: User::new("usr_a", "a", "A").summary(),
            content: "hello".to_string(),
            visibility,
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unchanged_visibility_has_no_transition() {
        let post = post_with(Visibility::Private);
        assert!(visibility_transition(Visibility::Private, &post).is_none());
    }

    #[test]
    fn followers_to_private_stays_hidden() {
        let post = post_with(Visibility::Private);
        assert!(visibility_transition(Visibility::Followers, &post).is_none());
    }

    #[test]
    fn becoming_public_is_shown_with_the_post() {
        let post = post_with(Visibility::Public);
        match visibility_transition(Visibility::Followers, &post) {
            Some(Event::PostShown(change)) => {
                assert_eq!(change.old_visibility, Visibility::Followers);
                assert_eq!(change.author_id, "usr_a");
                assert!(change.post.is_some());
            }
            other => panic!("expected post-shown, got {other:?}"),
        }
    }

    #[test]
    fn leaving_public_is_hidden() {
        let post = post_with(Visibility::Followers);
        match visibility_transition(Visibility::Public, &post) {
            Some(Event::PostHidden(change)) => assert!(change.post.is_none()),
            other => panic!("expected post-hidden, got {other:?}"),
        }
    }
}
