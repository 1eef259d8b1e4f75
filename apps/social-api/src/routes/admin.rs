//! Admin moderation: cosmetic metadata and bans.

use axum::extract::{Path, State};
use axum::routing::{patch, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::hub::events::UserUpdated;
use crate::hub::Event;
use crate::models::admin_action::{AdminAction, AdminActionKind};
use crate::models::user::{Role, User, UserCosmetics};
use crate::routes::audit_log;
use crate::store::Revision;
use crate::AppState;

const MAX_BADGE_CHARS: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users/{user_id}", patch(update_user_cosmetics))
        .route("/admin/users/{user_id}/ban", put(set_user_ban))
}

/// Load the target user, refusing non-admin callers and other admins.
async fn load_target(auth: &AuthUser, state: &AppState, user_id: &str) -> Result<User, ApiError> {
    if !auth.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }
    let target = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if target.is_admin() && target.id != auth.id() {
        return Err(ApiError::forbidden("Cannot modify other admins"));
    }
    Ok(target)
}

fn clean_labels(field: &str, labels: Vec<String>) -> Result<Vec<String>, ApiError> {
    let mut cleaned: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim().to_string();
        if label.is_empty() {
            continue;
        }
        if label.chars().count() > MAX_BADGE_CHARS {
            return Err(ApiError::validation(vec![FieldError::new(
                field,
                format!("Each entry must be {MAX_BADGE_CHARS} characters or fewer"),
            )]));
        }
        if !cleaned.contains(&label) {
            cleaned.push(label);
        }
    }
    Ok(cleaned)
}

/// Flat rendering of a user's cosmetics for the audit trail.
fn describe_cosmetics(user: &User) -> String {
    let role = match user.role {
        Role::User => "user",
        Role::Admin => "admin",
    };
    format!(
        "role={role} badges=[{}] titles=[{}]",
        user.badges.join(","),
        user.titles.join(",")
    )
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/admin/users/:user_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{user_id}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UserCosmetics,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Not an admin, or target is another admin", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn update_user_cosmetics(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UserCosmetics>,
) -> Result<Json<User>, ApiError> {
    let user = load_target(&auth, &state, &user_id).await?;
    if body.role.is_none() && body.badges.is_none() && body.titles.is_none() {
        return Err(ApiError::bad_request("No changes provided"));
    }

    let cosmetics = UserCosmetics {
        role: body.role,
        badges: body.badges.map(|b| clean_labels("badges", b)).transpose()?,
        titles: body.titles.map(|t| clean_labels("titles", t)).transpose()?,
    };
    let Revision { before, after: user } = state.store.update_cosmetics(&user.id, cosmetics).await?;
    tracing::info!(user_id = %user.id, admin_id = %auth.id(), "user cosmetics updated");

    state.hub.emit_to_all(Event::UserUpdated(UserUpdated {
        user_id: user.id.clone(),
        role: user.role,
        badges: user.badges.clone(),
        titles: user.titles.clone(),
    }));

    let action = AdminAction::new(auth.id(), AdminActionKind::UpdateUser, &user.id)
        .change(describe_cosmetics(&before), describe_cosmetics(&user));
    audit_log::record(&state, action).await;

    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/admin/users/:user_id/ban
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct BanRequest {
    pub banned: bool,
    /// Kept in the audit trail.
    pub reason: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{user_id}/ban",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    request_body = BanRequest,
    responses(
        (status = 200, description = "Ban state set", body = User),
        (status = 400, description = "Cannot ban yourself", body = ApiErrorBody),
        (status = 403, description = "Not an admin, or target is another admin", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn set_user_ban(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<BanRequest>,
) -> Result<Json<User>, ApiError> {
    let user = load_target(&auth, &state, &user_id).await?;
    if user.id == auth.id() {
        return Err(ApiError::bad_request("Cannot ban yourself"));
    }

    let user = state.store.set_banned(&user.id, body.banned).await?;
    tracing::info!(user_id = %user.id, admin_id = %auth.id(), banned = user.is_banned, "ban state changed");

    let kind = if body.banned {
        AdminActionKind::BanUser
    } else {
        AdminActionKind::UnbanUser
    };
    let mut action = AdminAction::new(auth.id(), kind, &user.id);
    if let Some(reason) = body.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) {
        action = action.reason(reason);
    }
    audit_log::record(&state, action).await;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_trimmed_and_deduplicated() {
        let cleaned = clean_labels(
            "badges",
            vec![" vip ".to_string(), "vip".to_string(), "".to_string(), "og".to_string()],
        )
        .unwrap();
        assert_eq!(cleaned, vec!["vip", "og"]);
    }

    #[test]
    fn cosmetics_render_flat() {
        let mut user = User::new("usr_1", "alice", "Alice");
        user.badges = vec!["vip".to_string(), "og".to_string()];
        assert_eq!(describe_cosmetics(&user), "role=user badges=[vip,og] titles=[]");
    }

    #[test]
    fn overlong_label_is_rejected() {
        assert!(clean_labels("titles", vec!["x".repeat(21)]).is_err());
    }
}
