//! Admin audit trail: the shared writer and the query endpoint.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::admin_action::{AdminAction, AdminActionKind};
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/actions", get(list_admin_actions))
}

/// Persist an audit record for an admin change that already succeeded.
///
/// A failure is logged; the change it describes stands.
pub async fn record(state: &AppState, action: AdminAction) {
    let kind = action.action;
    let admin_id = action.admin_id.clone();
    match state.store.record_admin_action(action).await {
        Ok(saved) => {
            tracing::info!(
                action_id = %saved.id,
                %admin_id,
                ?kind,
                target_user = %saved.target_user,
                "admin action recorded"
            );
        }
        Err(e) => {
            tracing::warn!(%admin_id, ?kind, error = %e, "failed to record admin action");
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/admin/actions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminActionParams {
    /// Only this kind of action.
    pub action: Option<AdminActionKind>,
    /// Only actions on this user or their content.
    pub target_user: Option<String>,
    /// Number of entries (1-100, default 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminActionsResponse {
    pub data: Vec<AdminAction>,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/actions",
    tag = "Admin",
    security(("bearer" = [])),
    params(AdminActionParams),
    responses(
        (status = 200, description = "Audit entries, newest first", body = AdminActionsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not an admin", body = ApiErrorBody),
    ),
)]
pub async fn list_admin_actions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<AdminActionParams>,
) -> Result<Json<AdminActionsResponse>, ApiError> {
    if !auth.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut data = state
        .store
        .list_admin_actions(params.action, params.target_user.as_deref(), limit + 1)
        .await?;
    let has_more = data.len() > limit;
    data.truncate(limit);

    Ok(Json(AdminActionsResponse { data, has_more }))
}
