//! Account registration and profile lookup.
//!
//! Registration stands in for the external session service in local runs:
//! it creates the user and mints a bearer session in the key-value store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use social_common::PrefixedId;
use utoipa::ToSchema;

use crate::auth::tokens;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::User;
use crate::routes::required_text;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/{user_id}", get(get_user))
}

// ---------------------------------------------------------------------------
// POST /api/v1/users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: User,
    /// Bearer session token.
    pub token: String,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !(3..=30).contains(&len) || !valid_chars {
        return Err(ApiError::validation(vec![FieldError::new(
            "username",
            "Username must be 3-30 letters, digits or underscores",
        )]));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Username taken", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = required_text("username", body.username.as_deref(), 30)?;
    validate_username(&username)?;
    let display_name = match body.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => required_text("display_name", Some(name), 50)?,
        _ => username.clone(),
    };

    let user = state
        .store
        .create_user(User::new(User::generate(), username, display_name))
        .await?;
    let token = tokens::issue_session(state.kv.as_ref(), &user.id).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/:user_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}
