//! Bearer session extraction.
//!
//! Resolves `Authorization: Bearer <token>` to the acting user and refuses
//! banned accounts before any handler logic runs.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::tokens;
use crate::error::ApiError;
use crate::models::user::{User, UserSummary};
use crate::AppState;

/// Authenticated, non-banned user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn summary(&self) -> UserSummary {
        self.user.summary()
    }

    /// Owners and admins may modify a resource.
    pub fn can_modify(&self, owner_id: &str) -> bool {
        self.user.id == owner_id || self.is_admin()
    }

    /// An admin touching someone else's resource. Such changes are audited.
    pub fn acts_as_admin(&self, owner_id: &str) -> bool {
        self.is_admin() && self.user.id != owner_id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let session = tokens::lookup_session(state.kv.as_ref(), token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        let user = state
            .store
            .get_user(&session.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Session user no longer exists"))?;

        if user.is_banned {
            tracing::debug!(user_id = %user.id, "rejected banned user");
            return Err(ApiError::banned());
        }

        Ok(AuthUser { user })
    }
}
