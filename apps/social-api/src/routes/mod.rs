pub mod admin;
pub mod audit_log;
pub mod comments;
pub mod follows;
pub mod friends;
pub mod health;
pub mod notifications;
pub mod posts;
pub mod users;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, FieldError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::hub::server::router())
        .nest(
            "/api/v1",
            users::router()
                .merge(posts::router())
                .merge(comments::router())
                .merge(follows::router())
                .merge(friends::router())
                .merge(notifications::router())
                .merge(admin::router())
                .merge(audit_log::router()),
        )
}

/// Trim a required text field and enforce its length in characters.
pub(crate) fn required_text(field: &str, value: Option<&str>, max_chars: usize) -> Result<String, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Err(ApiError::validation(vec![FieldError::new(
            field,
            format!("{field} is required"),
        )])),
        Some(text) if text.chars().count() > max_chars => Err(ApiError::validation(vec![
            FieldError::new(field, format!("{field} must be {max_chars} characters or fewer")),
        ])),
        Some(text) => Ok(text.to_string()),
    }
}

/// Like [`required_text`] but an absent or blank value becomes empty.
pub(crate) fn optional_text(field: &str, value: Option<&str>, max_chars: usize) -> Result<String, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(String::new()),
        other => required_text(field, other, max_chars),
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Users
        users::register,
        users::get_user,
        // Posts
        posts::create_post,
        posts::get_post,
        posts::update_post,
        posts::delete_post,
        posts::toggle_post_like,
        // Comments
        comments::create_comment,
        comments::update_comment,
        comments::delete_comment,
        comments::toggle_comment_like,
        // Follows
        follows::follow_user,
        follows::unfollow_user,
        follows::follow_status,
        // Friends
        friends::send_friend_request,
        friends::respond_to_friend_request,
        friends::cancel_friend_request,
        friends::remove_friend,
        friends::friend_status,
        // Notifications
        notifications::list_notifications,
        notifications::mark_notifications_read,
        // Admin
        admin::update_user_cosmetics,
        admin::set_user_ban,
        audit_log::list_admin_actions,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::Role,
            crate::models::user::UserCosmetics,
            crate::models::post::Post,
            crate::models::post::Visibility,
            crate::models::comment::Comment,
            crate::models::follow::Follow,
            crate::models::friend_request::FriendRequest,
            crate::models::friend_request::FriendRequestStatus,
            crate::models::notification::Notification,
            crate::models::notification::NotificationKind,
            crate::models::admin_action::AdminAction,
            crate::models::admin_action::AdminActionKind,
            // Route request/response types
            health::HealthResponse,
            users::RegisterRequest,
            users::RegisterResponse,
            posts::CreatePostRequest,
            posts::UpdatePostRequest,
            comments::CreateCommentRequest,
            comments::UpdateCommentRequest,
            follows::FollowStatusResponse,
            friends::SendFriendRequestRequest,
            friends::RespondFriendRequestRequest,
            friends::FriendAction,
            friends::FriendStatusResponse,
            notifications::ListNotificationsResponse,
            notifications::MarkReadRequest,
            notifications::MarkReadResponse,
            admin::BanRequest,
            comments::DeleteCommentRequest,
            audit_log::AdminActionsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Users", description = "Accounts and profiles"),
        (name = "Posts", description = "Posts and likes"),
        (name = "Comments", description = "Comments, replies and likes"),
        (name = "Follows", description = "Follow graph"),
        (name = "Friends", description = "Friend requests and friendships"),
        (name = "Notifications", description = "Notifications"),
        (name = "Admin", description = "Moderation"),
    )
)]
pub struct ApiDoc;
